//! AML object types and the operand objects attached to namespace nodes.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::namespace::NodeId;

/// Type of a namespace node or operand object.
///
/// The first seventeen variants are the ACPI-defined object types; the
/// rest are internal types that only exist inside the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Wildcard used by searches: matches any type.
    Any,
    /// An integer.
    Integer,
    /// A string.
    String,
    /// A buffer.
    Buffer,
    /// A package.
    Package,
    /// A field unit.
    FieldUnit,
    /// A DefDevice.
    Device,
    /// A DefEvent.
    Event,
    /// A DefMethod.
    Method,
    /// A DefMutex.
    Mutex,
    /// A DefOpRegion.
    Region,
    /// A DefPowerRes.
    Power,
    /// A DefProcessor.
    Processor,
    /// A DefThermalZone.
    Thermal,
    /// A buffer field.
    BufferField,
    /// A DDB handle (loaded table).
    DdbHandle,
    /// The debug object.
    DebugObject,
    /// A field inside an operation region.
    RegionField,
    /// A bank field.
    BankField,
    /// An index field.
    IndexField,
    /// An object reference.
    Reference,
    /// A DefAlias to a non-method object.
    Alias,
    /// A DefAlias whose target is a method.
    MethodAlias,
    /// Notify handler record.
    Notify,
    /// Address space handler record.
    AddressHandler,
    /// A resource template (only visible inside its own scope).
    Resource,
    /// A field of a resource template (only visible inside its own scope).
    ResourceField,
    /// A DefScope.
    Scope,
}

impl ObjectType {
    /// Returns `true` for types that must never be found by walking up
    /// into ancestor scopes.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Resource | Self::ResourceField)
    }

    /// Returns `true` for types whose nodes open a new name scope.
    #[must_use]
    pub const fn opens_scope(self) -> bool {
        matches!(
            self,
            Self::Device
                | Self::Method
                | Self::Power
                | Self::Processor
                | Self::Thermal
                | Self::Resource
                | Self::ResourceField
                | Self::Scope
        )
    }

    /// Returns `true` for types that can be evaluated for a value.
    ///
    /// Devices, events, mutexes, regions, thermal zones and plain scopes
    /// are accessed through other interfaces.
    #[must_use]
    pub const fn is_evaluable(self) -> bool {
        !matches!(
            self,
            Self::Device | Self::Event | Self::Mutex | Self::Region | Self::Thermal | Self::Scope
        )
    }

    /// Returns the ACPI display name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "Untyped",
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Buffer => "Buffer",
            Self::Package => "Package",
            Self::FieldUnit => "FieldUnit",
            Self::Device => "Device",
            Self::Event => "Event",
            Self::Method => "Method",
            Self::Mutex => "Mutex",
            Self::Region => "Region",
            Self::Power => "Power",
            Self::Processor => "Processor",
            Self::Thermal => "Thermal",
            Self::BufferField => "BufferField",
            Self::DdbHandle => "DdbHandle",
            Self::DebugObject => "DebugObject",
            Self::RegionField => "RegionField",
            Self::BankField => "BankField",
            Self::IndexField => "IndexField",
            Self::Reference => "Reference",
            Self::Alias => "Alias",
            Self::MethodAlias => "MethodAlias",
            Self::Notify => "Notify",
            Self::AddressHandler => "AddressHandler",
            Self::Resource => "ResourceDesc",
            Self::ResourceField => "ResourceField",
            Self::Scope => "Scope",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback invoked for `Notify(node, value)` on a device.
#[derive(Debug, Clone, Copy)]
pub struct NotifyHandler {
    /// Function called with the notified node, the notify value and `context`.
    pub handler: fn(NodeId, u32, usize),
    /// Opaque value passed back to `handler`.
    pub context: usize,
}

impl NotifyHandler {
    /// Invokes the handler.
    pub fn call(&self, node: NodeId, value: u32) {
        (self.handler)(node, value, self.context);
    }
}

impl PartialEq for NotifyHandler {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::fn_addr_eq(self.handler, other.handler) && self.context == other.context
    }
}

/// Object attached to a Device or Thermal Zone node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceObject {
    /// Installed notify handler, if any.
    pub notify: Option<NotifyHandler>,
}

bitflags! {
    /// Control method flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodFlags: u8 {
        /// The method is declared Serialized.
        const SERIALIZED = 1 << 0;
        /// The "method" wraps module-level code executed once at load.
        const MODULE_LEVEL = 1 << 1;
    }
}

/// Object attached to a Method node.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodObject {
    /// AML bytecode of the method body.
    pub aml: Arc<[u8]>,
    /// Number of declared arguments (0..=7).
    pub arg_count: u8,
    /// Method flags.
    pub flags: MethodFlags,
    /// Sync level for serialized methods.
    pub sync_level: u8,
    /// Notify handler inherited from the device that scopes module-level code.
    pub notify: Option<NotifyHandler>,
}

impl MethodObject {
    /// Creates a non-serialized method over `aml` taking `arg_count` arguments.
    #[must_use]
    pub fn new(aml: impl Into<Arc<[u8]>>, arg_count: u8) -> Self {
        Self {
            aml: aml.into(),
            arg_count,
            flags: MethodFlags::empty(),
            sync_level: 0,
            notify: None,
        }
    }
}

/// Object attached to an operation region node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionObject {
    /// Address space identifier (0 = SystemMemory, 1 = SystemIO, ...).
    pub space_id: u8,
    /// Base address of the region.
    pub address: u64,
    /// Length of the region in bytes.
    pub length: u64,
}

/// An operand object: a value, or the internal object attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// An integer.
    Integer(u64),
    /// A string.
    String(String),
    /// A buffer.
    Buffer(Vec<u8>),
    /// A package of objects.
    Package(Vec<Object>),
    /// Device-specific state.
    Device(DeviceObject),
    /// Thermal-zone state (notify target like a device).
    ThermalZone(DeviceObject),
    /// A control method.
    Method(MethodObject),
    /// An AML mutex.
    Mutex {
        /// Sync level of the mutex.
        sync_level: u8,
    },
    /// An AML event.
    Event,
    /// An operation region.
    Region(RegionObject),
    /// A processor declaration.
    Processor {
        /// Processor id.
        id: u8,
        /// Processor block address.
        pblk_address: u32,
        /// Processor block length.
        pblk_length: u8,
    },
    /// A power resource.
    PowerResource {
        /// Deepest system level the resource supports.
        system_level: u8,
        /// Resource order.
        resource_order: u16,
    },
    /// Target of an alias node; followed exactly once during lookup.
    Alias(NodeId),
    /// A reference to a namespace node.
    Reference(NodeId),
}

/// Shared handle to an attached object.
pub type ObjectRef = Arc<Object>;

impl Object {
    /// Returns the type of this object.
    ///
    /// An [`Object::Alias`] reports [`ObjectType::Alias`]; callers that know
    /// the target is a method track that on the node type instead.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Integer(_) => ObjectType::Integer,
            Self::String(_) => ObjectType::String,
            Self::Buffer(_) => ObjectType::Buffer,
            Self::Package(_) => ObjectType::Package,
            Self::Device(_) => ObjectType::Device,
            Self::ThermalZone(_) => ObjectType::Thermal,
            Self::Method(_) => ObjectType::Method,
            Self::Mutex { .. } => ObjectType::Mutex,
            Self::Event => ObjectType::Event,
            Self::Region(_) => ObjectType::Region,
            Self::Processor { .. } => ObjectType::Processor,
            Self::PowerResource { .. } => ObjectType::Power,
            Self::Alias(_) => ObjectType::Alias,
            Self::Reference(_) => ObjectType::Reference,
        }
    }

    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` for plain data objects (integer, string, buffer, package).
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            Self::Integer(_) | Self::String(_) | Self::Buffer(_) | Self::Package(_)
        )
    }

    /// Returns the notify handler installed on a device-like object or
    /// inherited by a method.
    #[must_use]
    pub fn notify_handler(&self) -> Option<NotifyHandler> {
        match self {
            Self::Device(dev) | Self::ThermalZone(dev) => dev.notify,
            Self::Method(method) => method.notify,
            _ => None,
        }
    }
}
