//! Modulation operations
//!
//! Available on the 06-MLD, 06-DPL and SCPI command sets. The generic command
//! set rejects all of them with `Unsupported` before anything is sent.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::commands::Operation;
use super::session::Laser;
use super::status::ModulationState;
use super::units;
use super::Variant;
use crate::protocol::ProtocolError;

/// How the modulated output is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModulationSubMode {
    /// Digital input gates the output
    Digital,
    /// Analog input scales the output
    Analog,
    /// On/off modulation (06-MLD only)
    OnOff,
    /// Modulation level set over the serial link, both inputs disabled
    Command,
}

impl fmt::Display for ModulationSubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModulationSubMode::Digital => "digital",
            ModulationSubMode::Analog => "analog",
            ModulationSubMode::OnOff => "on-off",
            ModulationSubMode::Command => "command",
        })
    }
}

impl std::str::FromStr for ModulationSubMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "digital" => Ok(ModulationSubMode::Digital),
            "analog" => Ok(ModulationSubMode::Analog),
            "on-off" | "onoff" => Ok(ModulationSubMode::OnOff),
            "command" => Ok(ModulationSubMode::Command),
            other => Err(format!("unknown modulation mode '{other}'")),
        }
    }
}

fn enable_arg(enable: bool) -> &'static str {
    if enable {
        "1"
    } else {
        "0"
    }
}

impl Laser {
    /// Enter modulation mode.
    ///
    /// `level` is the modulation power in mW on 06-MLD and SCPI lasers and
    /// the modulation high current in mA on 06-DPL lasers.
    pub fn enter_modulation_mode(&mut self, level: Option<f64>) -> Result<(), ProtocolError> {
        self.command(Operation::EnterModulation)?;
        if let Some(level) = level {
            match self.variant() {
                Variant::Dpl => self.set_modulation_current_high(level)?,
                _ => self.set_modulation_power(level)?,
            }
        }
        tracing::info!("Entering modulation mode");
        self.execute(Operation::EnterModulation, None)
    }

    /// Enter modulation mode driven in the given way
    pub fn enter_modulation(
        &mut self,
        sub_mode: ModulationSubMode,
        level: Option<f64>,
    ) -> Result<(), ProtocolError> {
        tracing::info!("Selecting {sub_mode} modulation");
        match sub_mode {
            ModulationSubMode::OnOff => {
                self.command(Operation::EnableOnOffModulation)?;
                if let Some(mw) = level {
                    self.set_modulation_power(mw)?;
                }
                self.set_on_off_modulation(true)
            }
            ModulationSubMode::Digital => {
                self.enter_modulation_mode(level)?;
                self.set_analog_modulation(false)?;
                self.set_digital_modulation(true)
            }
            ModulationSubMode::Analog => {
                self.enter_modulation_mode(level)?;
                self.set_digital_modulation(false)?;
                self.set_analog_modulation(true)
            }
            ModulationSubMode::Command => {
                self.enter_modulation_mode(level)?;
                self.set_digital_modulation(false)?;
                self.set_analog_modulation(false)
            }
        }
    }

    /// Enable or disable digital modulation
    pub fn set_digital_modulation(&mut self, enable: bool) -> Result<(), ProtocolError> {
        self.execute(Operation::SetDigitalModulation, Some(enable_arg(enable)))
    }

    /// Enable or disable analog modulation
    pub fn set_analog_modulation(&mut self, enable: bool) -> Result<(), ProtocolError> {
        self.execute(Operation::SetAnalogModulation, Some(enable_arg(enable)))
    }

    /// Enter or leave on/off modulation (06-MLD)
    pub fn set_on_off_modulation(&mut self, enable: bool) -> Result<(), ProtocolError> {
        let op = if enable {
            Operation::EnableOnOffModulation
        } else {
            Operation::DisableOnOffModulation
        };
        self.execute(op, None)
    }

    /// Analog and digital modulation enables
    pub fn modulation_state(&mut self) -> Result<ModulationState, ProtocolError> {
        let analog = self.query_flag(Operation::GetAnalogModulation)?;
        let digital = self.query_flag(Operation::GetDigitalModulation)?;
        Ok(ModulationState { analog, digital })
    }

    /// Set the modulation power in mW (06-MLD, SCPI)
    pub fn set_modulation_power(&mut self, power_mw: f64) -> Result<(), ProtocolError> {
        self.command(Operation::SetModulationPower)?;
        tracing::info!("Setting modulation power = {power_mw} mW");
        let value = match self.variant() {
            Variant::Mld => power_mw,
            _ => units::mw_to_w(power_mw),
        };
        self.execute(
            Operation::SetModulationPower,
            Some(&units::format_value(value)?),
        )
    }

    /// Modulation power setpoint in mW (06-MLD, SCPI)
    pub fn modulation_power(&mut self) -> Result<f64, ProtocolError> {
        let value = self.query_number(Operation::GetModulationPower)?;
        Ok(match self.variant() {
            Variant::Mld => value,
            _ => units::w_to_mw(value),
        })
    }

    /// Set the analog input impedance: `true` for 50 Ohm, `false` for high-Z
    /// (06-MLD)
    pub fn set_analog_impedance_50ohm(&mut self, fifty_ohm: bool) -> Result<(), ProtocolError> {
        self.execute(Operation::SetAnalogImpedance, Some(enable_arg(fifty_ohm)))
    }

    /// Whether the analog input is terminated with 50 Ohm (06-MLD)
    pub fn analog_impedance_50ohm(&mut self) -> Result<bool, ProtocolError> {
        self.query_flag(Operation::GetAnalogImpedance)
    }

    /// Set the modulation high current in mA (06-DPL)
    pub fn set_modulation_current_high(&mut self, current_ma: f64) -> Result<(), ProtocolError> {
        tracing::info!("Setting modulation high current = {current_ma} mA");
        self.execute(
            Operation::SetModulationCurrentHigh,
            Some(&units::format_value(current_ma)?),
        )
    }

    /// Set the modulation low current in mA (06-DPL)
    pub fn set_modulation_current_low(&mut self, current_ma: f64) -> Result<(), ProtocolError> {
        tracing::info!("Setting modulation low current = {current_ma} mA");
        self.execute(
            Operation::SetModulationCurrentLow,
            Some(&units::format_value(current_ma)?),
        )
    }

    /// Modulation `(high, low)` current setpoints in mA (06-DPL)
    pub fn modulation_current(&mut self) -> Result<(f64, f64), ProtocolError> {
        let high = self.query_number(Operation::GetModulationCurrentHigh)?;
        let low = self.query_number(Operation::GetModulationCurrentLow)?;
        Ok((high, low))
    }

    /// Modulation TEC temperature in °C (06-DPL)
    pub fn modulation_tec(&mut self) -> Result<f64, ProtocolError> {
        self.query_number(Operation::ReadModulationTec)
    }

    /// Set the modulation TEC temperature in °C (06-DPL)
    pub fn set_modulation_tec(&mut self, celsius: f64) -> Result<(), ProtocolError> {
        tracing::info!("Setting modulation TEC = {celsius} C");
        self.execute(
            Operation::SetModulationTec,
            Some(&units::format_value(celsius)?),
        )
    }

    /// Modulation TEC setpoint in °C (06-DPL)
    pub fn modulation_tec_setpoint(&mut self) -> Result<f64, ProtocolError> {
        self.query_number(Operation::GetModulationTecSetpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_mode_parse() {
        assert_eq!(
            "on-off".parse::<ModulationSubMode>(),
            Ok(ModulationSubMode::OnOff)
        );
        assert_eq!(
            "Digital".parse::<ModulationSubMode>(),
            Ok(ModulationSubMode::Digital)
        );
        assert!("pulse".parse::<ModulationSubMode>().is_err());
        assert_eq!(ModulationSubMode::Command.to_string(), "command");
    }
}
