//! Simulated lasers
//!
//! [`SimulatedLaser`] models a laser speaking the classic command set so the
//! driver can run without hardware. [`SimulatedBus`] is a [`PortProvider`]
//! holding simulated devices, empty ports and ports that refuse to open. It
//! counts open handles so tests can check that a scan never holds more than
//! one port open.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::laser::units::format_value;
use crate::protocol::serial::take_line;
use crate::protocol::{PortInfo, PortProvider, ProtocolError, Transport};

/// Reply to commands the simulated firmware does not know
const SYNTAX_ERROR: &str = "Syntax error: illegal command";

/// Observable device state
#[derive(Debug, Clone)]
struct DeviceState {
    firmware: String,
    serial_number: String,
    model_number: String,
    on: bool,
    interlock_open: bool,
    fault: i32,
    mode: i32,
    current_setpoint: f64,
    power_setpoint: f64,
    hours: f64,
    digital_modulation: bool,
    analog_modulation: bool,
    on_off_modulation: bool,
    modulation_power: f64,
    analog_50ohm: bool,
    modulation_current_high: f64,
    modulation_current_low: f64,
    tec_setpoint: f64,
    silent: bool,
    fail_writes: bool,
    received: Vec<String>,
}

/// Simulated laser shared by every handle opened on it
#[derive(Debug, Clone)]
pub struct SimulatedLaser {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedLaser {
    /// Laser with versioned firmware reporting a serial and model number
    pub fn new(serial_number: &str, model_number: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                firmware: "9.001".to_string(),
                serial_number: serial_number.to_string(),
                model_number: model_number.to_string(),
                on: false,
                interlock_open: false,
                fault: 0,
                mode: 1,
                current_setpoint: 0.0,
                power_setpoint: 0.0,
                hours: 1234.5,
                digital_modulation: false,
                analog_modulation: false,
                on_off_modulation: false,
                modulation_power: 0.0,
                analog_50ohm: false,
                modulation_current_high: 0.0,
                modulation_current_low: 0.0,
                tec_setpoint: 25.0,
                silent: false,
                fail_writes: false,
                received: Vec::new(),
            })),
        }
    }

    /// Laser with legacy firmware: no `.` in the version, no `glm?`
    pub fn legacy(serial_number: &str, firmware: &str) -> Self {
        let laser = Self::new(serial_number, "");
        laser.lock().firmware = firmware.to_string();
        laser
    }

    /// Replace the firmware descriptor
    pub fn with_firmware(self, firmware: &str) -> Self {
        self.lock().firmware = firmware.to_string();
        self
    }

    /// Never answer anything
    pub fn silent(self) -> Self {
        self.set_silent(true);
        self
    }

    /// Reject every write
    pub fn failing_writes(self) -> Self {
        self.lock().fail_writes = true;
        self
    }

    /// Toggle answering
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }

    /// Open or close the interlock
    pub fn set_interlock_open(&self, open: bool) {
        self.lock().interlock_open = open;
    }

    /// Commands received so far, without terminators
    pub fn received(&self) -> Vec<String> {
        self.lock().received.clone()
    }

    /// Whether the simulated laser is on
    pub fn is_on(&self) -> bool {
        self.lock().on
    }

    /// Open a fresh handle to this laser
    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(SimulatedPort::new(
            Some(self.clone()),
            Arc::new(AtomicUsize::new(1)),
        ))
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle one command; `None` when the device stays quiet
    fn handle(&self, command: &str) -> Option<String> {
        let mut state = self.lock();
        state.received.push(command.to_string());
        if state.silent {
            return None;
        }
        Some(state.reply(command))
    }
}

impl DeviceState {
    fn reply(&mut self, command: &str) -> String {
        let (name, arg) = match command.split_once(' ') {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (command, None),
        };
        let value = arg
            .and_then(|a| a.parse::<f64>().ok())
            .filter(|v| v.is_finite());
        let flag = arg.and_then(|a| match a {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        });

        let ok = || "OK".to_string();
        let number = |v: f64| format_value(v).unwrap_or_else(|_| SYNTAX_ERROR.to_string());
        let bit = |b: bool| if b { "1" } else { "0" }.to_string();

        match (name, value, flag) {
            ("?", None, _) => ok(),
            ("gfv?", None, _) => self.firmware.clone(),
            ("sn?", None, _) => self.serial_number.clone(),
            ("glm?", None, _) if self.firmware.contains('.') => self.model_number.clone(),
            ("@cob1", None, _) | ("l1", None, _) => {
                if self.interlock_open {
                    self.fault = 3;
                    self.on = false;
                } else if self.fault == 0 {
                    self.on = true;
                }
                ok()
            }
            ("l0", None, _) => {
                self.on = false;
                ok()
            }
            ("l?", None, _) => bit(self.on),
            ("ilk?", None, _) => bit(self.interlock_open),
            ("f?", None, _) => self.fault.to_string(),
            ("cf", None, _) => {
                self.fault = 0;
                ok()
            }
            ("gam?", None, _) => self.mode.to_string(),
            ("gom?", None, _) => self.autostart_state().to_string(),
            ("ci", None, _) => {
                self.mode = 0;
                ok()
            }
            ("cp", None, _) => {
                self.mode = 1;
                ok()
            }
            ("em", None, _) => {
                self.mode = 2;
                ok()
            }
            ("slc", Some(v), _) => {
                self.current_setpoint = v;
                ok()
            }
            ("glc?", None, _) => number(self.current_setpoint),
            ("i?", None, _) => number(if self.on { self.current_setpoint } else { 0.0 }),
            ("p", Some(v), _) => {
                self.power_setpoint = v;
                ok()
            }
            ("p?", None, _) => number(self.power_setpoint),
            ("pa?", None, _) => number(if self.on { self.power_setpoint } else { 0.0 }),
            ("hrs?", None, _) => number(self.hours),
            ("sdmes", _, Some(b)) => {
                self.digital_modulation = b;
                ok()
            }
            ("gdmes?", None, _) => bit(self.digital_modulation),
            ("sames", _, Some(b)) => {
                self.analog_modulation = b;
                ok()
            }
            ("games?", None, _) => bit(self.analog_modulation),
            ("eoom", None, _) => {
                self.mode = 2;
                self.on_off_modulation = true;
                ok()
            }
            ("xoom", None, _) => {
                self.on_off_modulation = false;
                ok()
            }
            ("slmp", Some(v), _) => {
                self.modulation_power = v;
                ok()
            }
            ("glmp?", None, _) => number(self.modulation_power),
            ("salis", _, Some(b)) => {
                self.analog_50ohm = b;
                ok()
            }
            ("galis?", None, _) => bit(self.analog_50ohm),
            ("smc", Some(v), _) => {
                self.modulation_current_high = v;
                ok()
            }
            ("gmc?", None, _) => number(self.modulation_current_high),
            ("slth", Some(v), _) => {
                self.modulation_current_low = v;
                ok()
            }
            ("glth?", None, _) => number(self.modulation_current_low),
            ("stec4t", Some(v), _) => {
                self.tec_setpoint = v;
                ok()
            }
            ("gtec4t?", None, _) | ("rtec4t?", None, _) => number(self.tec_setpoint),
            _ => SYNTAX_ERROR.to_string(),
        }
    }

    fn autostart_state(&self) -> i32 {
        if self.fault != 0 {
            5
        } else if !self.on {
            0
        } else if self.mode == 2 && self.on_off_modulation {
            3
        } else if self.mode == 2 {
            4
        } else {
            2
        }
    }
}

/// One open handle on a simulated port
struct SimulatedPort {
    device: Option<SimulatedLaser>,
    pending: Vec<u8>,
    handles: Arc<AtomicUsize>,
    open: bool,
}

impl SimulatedPort {
    fn new(device: Option<SimulatedLaser>, handles: Arc<AtomicUsize>) -> Self {
        Self {
            device,
            pending: Vec::new(),
            handles,
            open: true,
        }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.handles.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Transport for SimulatedPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        let Some(device) = &self.device else {
            return Ok(());
        };
        if device.lock().fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write refused"));
        }

        let text = String::from_utf8_lossy(data);
        for command in text.split('\r').filter(|c| !c.is_empty()) {
            if let Some(reply) = device.handle(command) {
                self.pending.extend_from_slice(reply.as_bytes());
                self.pending.extend_from_slice(b"\r\n");
            }
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(line);
        }
        std::thread::sleep(timeout);
        Ok(std::mem::take(&mut self.pending))
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for SimulatedPort {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone)]
enum BusSlot {
    Device(SimulatedLaser),
    Empty,
    Unopenable(String),
}

/// Open request recorded by a [`SimulatedBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    /// Port name
    pub port: String,
    /// Open timeout requested
    pub open_timeout: Option<Duration>,
}

/// Simulated set of serial ports
#[derive(Debug, Default)]
pub struct SimulatedBus {
    ports: Vec<(String, BusSlot)>,
    handles: Arc<AtomicUsize>,
    peak: AtomicUsize,
    opens: Mutex<VecDeque<OpenRecord>>,
}

impl SimulatedBus {
    /// Empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port with a laser attached
    pub fn with_laser(mut self, port: &str, laser: SimulatedLaser) -> Self {
        self.ports.push((port.to_string(), BusSlot::Device(laser)));
        self
    }

    /// Add a port that opens but has nothing attached
    pub fn with_empty_port(mut self, port: &str) -> Self {
        self.ports.push((port.to_string(), BusSlot::Empty));
        self
    }

    /// Add a port that fails to open
    pub fn with_unopenable_port(mut self, port: &str, reason: &str) -> Self {
        self.ports
            .push((port.to_string(), BusSlot::Unopenable(reason.to_string())));
        self
    }

    /// Handles currently open
    pub fn open_handles(&self) -> usize {
        self.handles.load(Ordering::SeqCst)
    }

    /// Most handles ever open at the same time
    pub fn peak_open_handles(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Every successful open, oldest first
    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl PortProvider for SimulatedBus {
    fn list_ports(&self) -> Vec<PortInfo> {
        self.ports
            .iter()
            .map(|(name, _)| PortInfo::named(name.as_str()))
            .collect()
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        open_timeout: Option<Duration>,
    ) -> Result<Box<dyn Transport>, ProtocolError> {
        let slot = self
            .ports
            .iter()
            .find(|(name, _)| name == port)
            .map(|(_, slot)| slot)
            .ok_or_else(|| ProtocolError::PortUnavailable {
                port: port.to_string(),
                reason: "No such port".to_string(),
            })?;

        let device = match slot {
            BusSlot::Unopenable(reason) => {
                return Err(ProtocolError::PortUnavailable {
                    port: port.to_string(),
                    reason: reason.clone(),
                })
            }
            BusSlot::Empty => None,
            BusSlot::Device(laser) => Some(laser.clone()),
        };

        let open = self.handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        self.opens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(OpenRecord {
                port: port.to_string(),
                open_timeout,
            });

        Ok(Box::new(SimulatedPort::new(device, self.handles.clone())))
    }
}
