//! Laser session
//!
//! Connects, identifies and classifies a laser, then exposes the operations
//! every command set shares. Device state is never cached: every getter asks
//! the laser.

use std::fmt;

use super::commands::{Operation, Vocabulary};
use super::identity::{identify, DeviceIdentity};
use super::status::{self, AutostartState, Fault, OperatingMode};
use super::units;
use super::Variant;
use crate::config::LaserConfig;
use crate::protocol::{
    self, CommandChannel, ConnectTarget, PortProvider, ProbeSkip, ProtocolError, SystemPorts,
};

/// Reply to the connection check
const PING_REPLY: &str = "OK";

/// An identified laser on an open command channel
pub struct Laser {
    /// Channel to the device; `None` after disconnect
    channel: Option<CommandChannel>,
    /// Identity reported at connect time
    identity: Option<DeviceIdentity>,
    /// Command set in use
    variant: Variant,
    /// Settings the session was opened with
    config: LaserConfig,
}

impl Laser {
    /// Connect to a laser through the host's serial ports
    pub fn connect(target: ConnectTarget, config: LaserConfig) -> Result<Self, ProtocolError> {
        Self::connect_with(&SystemPorts, &target, config, &mut |_| {})
    }

    /// Connect through a port provider, reporting ports skipped by a scan
    pub fn connect_with(
        provider: &dyn PortProvider,
        target: &ConnectTarget,
        config: LaserConfig,
        observer: &mut dyn FnMut(&ProbeSkip),
    ) -> Result<Self, ProtocolError> {
        let channel = protocol::connect(
            provider,
            target,
            config.baud_rate,
            config.open_timeout(),
            config.timing(),
            observer,
        )?;
        Self::from_channel(channel, config)
    }

    /// Identify and classify the laser on an already open channel.
    ///
    /// The channel is closed if identification fails.
    pub fn from_channel(
        mut channel: CommandChannel,
        config: LaserConfig,
    ) -> Result<Self, ProtocolError> {
        let identity = match identify(&mut channel) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!("Identification on {} failed: {e}", channel.port_name());
                channel.close();
                return Err(e);
            }
        };

        let variant = match config.variant {
            Some(forced) => {
                tracing::info!("Using forced {forced} command set");
                forced
            }
            None => {
                let variant = Variant::classify(identity.model_number.as_deref());
                tracing::info!(
                    "Classified model {:?} as {variant}",
                    identity.model_number
                );
                variant
            }
        };

        tracing::info!("Connected to laser {} on {}", identity.serial_number, channel.port_name());
        Ok(Self {
            channel: Some(channel),
            identity: Some(identity),
            variant,
            config,
        })
    }

    /// Close the channel and forget the identity. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
            tracing::info!("Disconnected from {}", channel.port_name());
        }
        self.identity = None;
    }

    /// Ask the laser whether it is listening
    pub fn is_connected(&mut self) -> bool {
        if self.channel.is_none() {
            return false;
        }
        matches!(self.query(Operation::Ping), Ok(reply) if reply.trim() == PING_REPLY)
    }

    /// Identity reported at connect time
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Serial number
    pub fn serial_number(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.serial_number.as_str())
    }

    /// Model number
    pub fn model_number(&self) -> Option<&str> {
        self.identity.as_ref().and_then(|i| i.model_number.as_deref())
    }

    /// Command set in use
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Port the channel is open on
    pub fn port_name(&self) -> Option<&str> {
        self.channel.as_ref().map(|c| c.port_name())
    }

    /// Settings the session was opened with
    pub fn config(&self) -> &LaserConfig {
        &self.config
    }

    /// Send a raw command and return the reply
    pub fn send(&mut self, command: &str) -> Result<String, ProtocolError> {
        self.channel_mut()?.send(command)
    }

    /// Turn on through the autostart sequence. The laser waits for its TEC
    /// setpoints and warms up before lasing.
    pub fn turn_on(&mut self) -> Result<(), ProtocolError> {
        tracing::info!("Turning on laser");
        self.execute(Operation::TurnOn, None)
    }

    /// Turn off
    pub fn turn_off(&mut self) -> Result<(), ProtocolError> {
        tracing::info!("Turning off laser");
        self.execute(Operation::TurnOff, None)
    }

    /// Whether the laser is on
    pub fn is_on(&mut self) -> Result<bool, ProtocolError> {
        self.query_flag(Operation::IsOn)
    }

    /// Whether the interlock is open
    pub fn interlock_open(&mut self) -> Result<bool, ProtocolError> {
        self.query_flag(Operation::Interlock)
    }

    /// Latched fault
    pub fn fault(&mut self) -> Result<Fault, ProtocolError> {
        self.query_code(Operation::GetFault).map(Fault::from_code)
    }

    /// Clear the latched fault
    pub fn clear_fault(&mut self) -> Result<(), ProtocolError> {
        tracing::info!("Clearing fault");
        self.execute(Operation::ClearFault, None)
    }

    /// Regulation mode
    pub fn operating_mode(&mut self) -> Result<OperatingMode, ProtocolError> {
        self.query_code(Operation::GetOperatingMode)
            .map(OperatingMode::from_code)
    }

    /// Autostart sequence state
    pub fn autostart_state(&mut self) -> Result<AutostartState, ProtocolError> {
        self.query_code(Operation::GetAutostartState)
            .map(AutostartState::from_code)
    }

    /// Enter constant current mode, optionally setting the current (mA) first
    pub fn constant_current(&mut self, current_ma: Option<f64>) -> Result<(), ProtocolError> {
        self.command(Operation::EnterConstantCurrent)?;
        if let Some(ma) = current_ma {
            self.set_current(ma)?;
        }
        tracing::info!("Entering constant current mode");
        self.execute(Operation::EnterConstantCurrent, None)
    }

    /// Set the current setpoint in mA
    pub fn set_current(&mut self, current_ma: f64) -> Result<(), ProtocolError> {
        tracing::info!("Setting I = {current_ma} mA");
        let value = units::current_to_device(self.variant, current_ma);
        self.execute(Operation::SetCurrent, Some(&units::format_value(value)?))
    }

    /// Actual current in mA
    pub fn current(&mut self) -> Result<f64, ProtocolError> {
        let value = self.query_number(Operation::GetCurrent)?;
        Ok(units::current_from_device(self.variant, value))
    }

    /// Current setpoint in mA
    pub fn current_setpoint(&mut self) -> Result<f64, ProtocolError> {
        let value = self.query_number(Operation::GetCurrentSetpoint)?;
        Ok(units::current_from_device(self.variant, value))
    }

    /// Enter constant power mode, optionally setting the power (mW) first
    pub fn constant_power(&mut self, power_mw: Option<f64>) -> Result<(), ProtocolError> {
        self.command(Operation::EnterConstantPower)?;
        if let Some(mw) = power_mw {
            self.set_power(mw)?;
        }
        tracing::info!("Entering constant power mode");
        self.execute(Operation::EnterConstantPower, None)
    }

    /// Set the power setpoint in mW
    pub fn set_power(&mut self, power_mw: f64) -> Result<(), ProtocolError> {
        tracing::info!("Setting P = {power_mw} mW");
        let watts = units::mw_to_w(power_mw);
        self.execute(Operation::SetPower, Some(&units::format_value(watts)?))
    }

    /// Actual output power in mW
    pub fn power(&mut self) -> Result<f64, ProtocolError> {
        self.query_number(Operation::GetPower).map(units::w_to_mw)
    }

    /// Power setpoint in mW
    pub fn power_setpoint(&mut self) -> Result<f64, ProtocolError> {
        self.query_number(Operation::GetPowerSetpoint)
            .map(units::w_to_mw)
    }

    /// Operating hours
    pub fn operating_hours(&mut self) -> Result<f64, ProtocolError> {
        self.query_number(Operation::GetOperatingHours)
    }

    /// Turn off, then disconnect. The channel is closed even if turning off
    /// fails.
    pub fn shutdown(&mut self) -> Result<(), ProtocolError> {
        let result = if self.channel.is_some() {
            self.turn_off()
        } else {
            Ok(())
        };
        self.disconnect();
        result
    }

    pub(super) fn channel_mut(&mut self) -> Result<&mut CommandChannel, ProtocolError> {
        self.channel.as_mut().ok_or(ProtocolError::NotConnected)
    }

    /// Command token for an operation, or `Unsupported`
    pub(super) fn command(&self, op: Operation) -> Result<&'static str, ProtocolError> {
        Vocabulary::lookup(self.variant, op).ok_or(ProtocolError::Unsupported {
            operation: op.name(),
            variant: self.variant,
        })
    }

    /// Run a query and return the raw reply
    pub(super) fn query(&mut self, op: Operation) -> Result<String, ProtocolError> {
        let command = self.command(op)?;
        self.channel_mut()?.send(command)
    }

    /// Run a state-changing command. Error replies are rejected.
    pub(super) fn execute(
        &mut self,
        op: Operation,
        argument: Option<&str>,
    ) -> Result<(), ProtocolError> {
        let token = self.command(op)?;
        let command = match argument {
            Some(arg) => format!("{token} {arg}"),
            None => token.to_string(),
        };
        let reply = self.channel_mut()?.send(&command)?;
        if reply.to_ascii_lowercase().contains("error") {
            return Err(ProtocolError::InvalidResponse {
                command,
                response: reply,
            });
        }
        Ok(())
    }

    pub(super) fn query_number(&mut self, op: Operation) -> Result<f64, ProtocolError> {
        let reply = self.query(op)?;
        status::parse_number(self.command(op)?, &reply)
    }

    pub(super) fn query_flag(&mut self, op: Operation) -> Result<bool, ProtocolError> {
        let reply = self.query(op)?;
        status::parse_flag(self.command(op)?, &reply)
    }

    fn query_code(&mut self, op: Operation) -> Result<i32, ProtocolError> {
        let reply = self.query(op)?;
        status::parse_code(self.command(op)?, &reply)
    }
}

impl fmt::Display for Laser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(identity) = &self.identity else {
            return write!(f, "Laser (not connected)");
        };
        write!(f, "Serial number: {}", identity.serial_number)?;
        if let Some(model) = &identity.model_number {
            write!(f, ", model number: {model}")?;
        }
        if let Some(nm) = identity.wavelength_nm() {
            write!(f, ", wavelength: {nm} nm")?;
        }
        write!(f, ", command set: {}", self.variant)
    }
}

impl fmt::Debug for Laser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Laser")
            .field("channel", &self.channel)
            .field("identity", &self.identity)
            .field("variant", &self.variant)
            .finish()
    }
}

impl Drop for Laser {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Connect to every port by name and keep the lasers that identify
pub fn list_lasers(provider: &dyn PortProvider, config: &LaserConfig) -> Vec<Laser> {
    let mut lasers = Vec::new();
    for port in provider.list_ports() {
        let target = ConnectTarget::ByPort(port.name.clone());
        match Laser::connect_with(provider, &target, config.clone(), &mut |_| {}) {
            Ok(laser) => lasers.push(laser),
            Err(e) => tracing::debug!("No laser on {}: {e}", port.name),
        }
    }
    lasers
}
