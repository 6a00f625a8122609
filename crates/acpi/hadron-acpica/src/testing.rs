//! Test doubles: a register-file platform and a scripted AML interpreter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use core::fmt;

use hadron_core::log::{self, LogLevel};

use crate::aml::path::AmlPath;
use crate::aml::value::{MethodFlags, MethodObject, Object, ObjectType};
use crate::config::AcpiConfig;
use crate::fadt::{Fadt, GenericAddress};
use crate::hw::{Register, RegisterAccess};
use crate::interp::{AmlInterpreter, MethodCall};
use crate::namespace::{NodeId, OwnerId};
use crate::{Acpi, AcpiError, AcpiOs, PrepareSleep};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Something the platform was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Register, u32),
    WriteAddress(u64, u64),
    ClearStatus,
    DisableGpes,
    EnableWakeupGpes,
    EnableRuntimeGpes,
    Flush,
    Stall(u32),
    PrepareSleep { state: u8, pm1a: u32, pm1b: u32 },
    PrepareExtendedSleep(u8, u8),
    Method(String),
}

#[derive(Default)]
struct PlatformState {
    registers: HashMap<Register, u32>,
    addresses: HashMap<u64, u64>,
    failures: HashMap<Register, AcpiError>,
    address_failures: HashMap<u64, AcpiError>,
    sleep_control: u64,
    sleep_status: u64,
    verdict: Option<PrepareSleep>,
    journal: Vec<Event>,
}

/// Fixed registers backed by a map. Writing SLP_EN to PM1 control (or to
/// the sleep control register) wakes the "machine" immediately.
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<PlatformState>,
}

const WAK_STS: u32 = 0x8000;
const SLP_EN: u32 = 0x2000;

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wire_sleep_registers(&self, control: u64, status: u64) {
        let mut state = locked(&self.state);
        state.sleep_control = control;
        state.sleep_status = status;
    }

    pub fn set_register(&self, register: Register, value: u32) {
        let mut state = locked(&self.state);
        if register == Register::Pm1Control {
            state.registers.insert(Register::Pm1aControl, value);
            state.registers.insert(Register::Pm1bControl, 0);
        } else {
            state.registers.insert(register, value);
        }
    }

    pub fn register(&self, register: Register) -> u32 {
        Self::load(&locked(&self.state), register)
    }

    pub fn fail_register(&self, register: Register, error: AcpiError) {
        locked(&self.state).failures.insert(register, error);
    }

    pub fn fail_address(&self, address: u64, error: AcpiError) {
        locked(&self.state).address_failures.insert(address, error);
    }

    pub fn set_prepare_verdict(&self, verdict: PrepareSleep) {
        locked(&self.state).verdict = Some(verdict);
    }

    pub fn journal(&self) -> Vec<Event> {
        locked(&self.state).journal.clone()
    }

    pub fn clear_journal(&self) {
        locked(&self.state).journal.clear();
    }

    /// PM1 control writes, in order.
    pub fn control_writes(&self) -> Vec<(Register, u32)> {
        locked(&self.state)
            .journal
            .iter()
            .filter_map(|e| match e {
                Event::Write(
                    r @ (Register::Pm1Control | Register::Pm1aControl | Register::Pm1bControl),
                    v,
                ) => Some((*r, *v)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        locked(&self.state).journal.push(event);
    }

    fn load(state: &PlatformState, register: Register) -> u32 {
        let get = |r| state.registers.get(&r).copied().unwrap_or(0);
        match register {
            Register::Pm1Control => get(Register::Pm1aControl) | get(Register::Pm1bControl),
            other => get(other),
        }
    }
}

impl RegisterAccess for MockPlatform {
    fn read_register(&self, register: Register) -> Result<u32, AcpiError> {
        let state = locked(&self.state);
        if let Some(&e) = state.failures.get(&register) {
            return Err(e);
        }
        Ok(Self::load(&state, register))
    }

    fn write_register(&self, register: Register, value: u32) -> Result<(), AcpiError> {
        let mut state = locked(&self.state);
        if let Some(&e) = state.failures.get(&register) {
            return Err(e);
        }
        state.journal.push(Event::Write(register, value));
        match register {
            Register::Pm1Status => {
                *state.registers.entry(register).or_insert(0) &= !value;
            }
            Register::Pm1Control => {
                state.registers.insert(Register::Pm1aControl, value);
                state.registers.insert(Register::Pm1bControl, value);
            }
            other => {
                state.registers.insert(other, value);
            }
        }
        if matches!(register, Register::Pm1Control | Register::Pm1aControl) && value & SLP_EN != 0 {
            *state.registers.entry(Register::Pm1Status).or_insert(0) |= WAK_STS;
        }
        Ok(())
    }

    fn read_address(&self, address: &GenericAddress) -> Result<u64, AcpiError> {
        let state = locked(&self.state);
        if let Some(&e) = state.address_failures.get(&address.address) {
            return Err(e);
        }
        Ok(state.addresses.get(&address.address).copied().unwrap_or(0))
    }

    fn write_address(&self, address: &GenericAddress, value: u64) -> Result<(), AcpiError> {
        let mut state = locked(&self.state);
        if let Some(&e) = state.address_failures.get(&address.address) {
            return Err(e);
        }
        state.journal.push(Event::WriteAddress(address.address, value));
        let status = state.sleep_status;
        if address.address == status {
            *state.addresses.entry(status).or_insert(0) &= !value;
        } else {
            state.addresses.insert(address.address, value);
            if address.address == state.sleep_control && value & 0x20 != 0 {
                *state.addresses.entry(status).or_insert(0) |= 0x80;
            }
        }
        Ok(())
    }

    fn clear_acpi_status(&self) -> Result<(), AcpiError> {
        self.record(Event::ClearStatus);
        Ok(())
    }

    fn disable_all_gpes(&self) -> Result<(), AcpiError> {
        self.record(Event::DisableGpes);
        Ok(())
    }

    fn enable_all_wakeup_gpes(&self) -> Result<(), AcpiError> {
        self.record(Event::EnableWakeupGpes);
        Ok(())
    }

    fn enable_all_runtime_gpes(&self) -> Result<(), AcpiError> {
        self.record(Event::EnableRuntimeGpes);
        Ok(())
    }
}

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD.fetch_add(1, Ordering::Relaxed);
}

impl AcpiOs for MockPlatform {
    fn thread_id(&self) -> u64 {
        THREAD_ID.with(|id| *id)
    }

    fn stall(&self, microseconds: u32) {
        self.record(Event::Stall(microseconds));
    }

    fn flush_cpu_cache(&self) {
        self.record(Event::Flush);
    }

    fn prepare_sleep(&self, state: u8, pm1a: u32, pm1b: u32) -> Result<PrepareSleep, AcpiError> {
        self.record(Event::PrepareSleep { state, pm1a, pm1b });
        Ok(locked(&self.state).verdict.unwrap_or(PrepareSleep::Proceed))
    }

    fn prepare_extended_sleep(&self, state: u8, sleep_control: u8) -> Result<PrepareSleep, AcpiError> {
        self.record(Event::PrepareExtendedSleep(state, sleep_control));
        Ok(locked(&self.state).verdict.unwrap_or(PrepareSleep::Proceed))
    }
}

/// What a scripted method does when run.
#[derive(Debug, Clone)]
pub enum Behavior {
    Return(Object),
    Nothing,
    Fail(AcpiError),
    /// Evaluates another absolute pathname and returns its result.
    Call(String),
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub path: String,
    pub node: NodeId,
    pub node_type: ObjectType,
    pub module_level: bool,
    pub has_notify: bool,
    pub args: Vec<Object>,
}

/// Interpreter whose methods do whatever their script says.
#[derive(Default)]
pub struct ScriptedInterpreter {
    scripts: Mutex<HashMap<String, Behavior>>,
    records: Mutex<Vec<CallRecord>>,
    resolves: AtomicUsize,
    max_lock_depth: AtomicUsize,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the method at `pathname` (written in ASL form).
    pub fn script(&self, pathname: &str, behavior: Behavior) {
        let key = AmlPath::parse(pathname)
            .map(|p| p.to_string())
            .unwrap_or_else(|_| String::from(pathname));
        locked(&self.scripts).insert(key, behavior);
    }

    pub fn records(&self) -> Vec<CallRecord> {
        locked(&self.records).clone()
    }

    pub fn calls(&self) -> Vec<String> {
        locked(&self.records).iter().map(|r| r.path.clone()).collect()
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn max_lock_depth(&self) -> usize {
        self.max_lock_depth.load(Ordering::SeqCst)
    }
}

impl AmlInterpreter<MockPlatform> for ScriptedInterpreter {
    fn execute_method(
        &self,
        acpi: &Acpi<MockPlatform, Self>,
        call: MethodCall<'_>,
    ) -> Result<Option<Object>, AcpiError> {
        let (path, node_type) = {
            let ns = acpi.namespace();
            (ns.pathname(call.node), ns.node_type(call.node))
        };
        self.max_lock_depth
            .fetch_max(acpi.interpreter_lock().depth(), Ordering::SeqCst);
        locked(&self.records).push(CallRecord {
            path: path.clone(),
            node: call.node,
            node_type,
            module_level: call.method.flags.contains(MethodFlags::MODULE_LEVEL),
            has_notify: call.method.notify.is_some(),
            args: call.args.to_vec(),
        });
        acpi.handler().record(Event::Method(path.clone()));

        let behavior = locked(&self.scripts)
            .get(&path)
            .cloned()
            .unwrap_or(Behavior::Nothing);
        match behavior {
            Behavior::Return(object) => Ok(Some(object)),
            Behavior::Nothing => Ok(None),
            Behavior::Fail(e) => Err(e),
            Behavior::Call(target) => acpi.evaluate_object(None, Some(&target), Vec::new()),
        }
    }

    fn resolve_node_to_value(
        &self,
        acpi: &Acpi<MockPlatform, Self>,
        node: NodeId,
    ) -> Result<Object, AcpiError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let object = acpi
            .namespace()
            .attached_object(node)
            .ok_or(AcpiError::AmlUninitialized)?;
        Ok(Object::clone(&object))
    }
}

pub type TestAcpi = Acpi<MockPlatform, ScriptedInterpreter>;

pub fn acpi() -> TestAcpi {
    acpi_with_fadt(Fadt::default())
}

pub fn acpi_with_fadt(fadt: Fadt) -> TestAcpi {
    build(fadt, AcpiConfig::default())
}

pub fn acpi_with_config(config: AcpiConfig) -> TestAcpi {
    build(Fadt::default(), config)
}

fn build(fadt: Fadt, config: AcpiConfig) -> TestAcpi {
    let platform = MockPlatform::new();
    platform.wire_sleep_registers(fadt.sleep_control.address, fadt.sleep_status.address);
    Acpi::new(platform, ScriptedInterpreter::new(), fadt, config)
}

impl TestAcpi {
    /// Defines a named object the way the table loader would.
    pub fn define(&self, pathname: &str, object: Object) -> NodeId {
        self.namespace()
            .define(None, pathname, object, OwnerId(1))
            .unwrap()
    }

    /// Defines a control method and scripts what it does.
    pub fn define_method(&self, pathname: &str, arg_count: u8, behavior: Behavior) -> NodeId {
        let node = self.define(pathname, Object::Method(MethodObject::new(Vec::new(), arg_count)));
        let path = self.namespace().pathname(node);
        locked(&self.interpreter().scripts).insert(path, behavior);
        node
    }
}

static LOG_LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn record_log(level: LogLevel, args: fmt::Arguments<'_>) {
    locked(&LOG_LINES).push(std::format!("[{level}] {args}"));
}

/// Handle to the captured log. The sink is global, so lines from tests
/// running in parallel are interleaved.
pub struct LogCapture;

impl LogCapture {
    pub fn contains(&self, needle: &str) -> bool {
        locked(&LOG_LINES).iter().any(|line| line.contains(needle))
    }
}

pub fn capture_log() -> LogCapture {
    // SAFETY: `record_log` only takes a std mutex that no caller holds.
    unsafe { log::set_log_fn(record_log) };
    LogCapture
}
