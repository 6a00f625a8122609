//! AML names and objects.
//!
//! [`path`] holds the packed 4-byte [`NameSeg`] and the [`AmlPath`] built
//! from it; [`value`] holds the operand objects attached to namespace nodes.

pub mod path;
pub mod value;

pub use path::{AmlPath, NameSeg, PathPrefix};
pub use value::{
    DeviceObject, MethodFlags, MethodObject, NotifyHandler, Object, ObjectRef, ObjectType,
    RegionObject,
};
