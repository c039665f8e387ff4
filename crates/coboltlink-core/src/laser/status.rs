//! Device state codes
//!
//! Fault, operating mode and autostart state are reported as small integers.
//! They are mapped to enums that render as `"<code> - <label>"`, matching the
//! way the laser manual lists them. Codes outside the documented tables are
//! kept as `Unknown(code)`.

use serde::Serialize;
use std::fmt;

use crate::protocol::ProtocolError;

/// Latched fault condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fault {
    /// 0 - No errors
    None,
    /// 1 - Temperature error
    Temperature,
    /// 3 - Interlock error
    Interlock,
    /// 4 - Constant power time out
    ConstantPowerTimeout,
    /// Undocumented code
    Unknown(i32),
}

impl Fault {
    /// Map a numeric fault code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Fault::None,
            1 => Fault::Temperature,
            3 => Fault::Interlock,
            4 => Fault::ConstantPowerTimeout,
            other => Fault::Unknown(other),
        }
    }

    /// Numeric code
    pub fn code(&self) -> i32 {
        match self {
            Fault::None => 0,
            Fault::Temperature => 1,
            Fault::Interlock => 3,
            Fault::ConstantPowerTimeout => 4,
            Fault::Unknown(code) => *code,
        }
    }

    /// Label without the code
    pub fn label(&self) -> &'static str {
        match self {
            Fault::None => "No errors",
            Fault::Temperature => "Temperature error",
            Fault::Interlock => "Interlock error",
            Fault::ConstantPowerTimeout => "Constant power time out",
            Fault::Unknown(_) => "Unknown",
        }
    }

    /// Whether a fault is latched
    pub fn is_fault(&self) -> bool {
        !matches!(self, Fault::None)
    }
}

/// Regulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatingMode {
    /// 0 - Constant Current
    ConstantCurrent,
    /// 1 - Constant Power
    ConstantPower,
    /// 2 - Modulation Mode
    Modulation,
    /// Undocumented code
    Unknown(i32),
}

impl OperatingMode {
    /// Map a numeric mode code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OperatingMode::ConstantCurrent,
            1 => OperatingMode::ConstantPower,
            2 => OperatingMode::Modulation,
            other => OperatingMode::Unknown(other),
        }
    }

    /// Numeric code
    pub fn code(&self) -> i32 {
        match self {
            OperatingMode::ConstantCurrent => 0,
            OperatingMode::ConstantPower => 1,
            OperatingMode::Modulation => 2,
            OperatingMode::Unknown(code) => *code,
        }
    }

    /// Label without the code
    pub fn label(&self) -> &'static str {
        match self {
            OperatingMode::ConstantCurrent => "Constant Current",
            OperatingMode::ConstantPower => "Constant Power",
            OperatingMode::Modulation => "Modulation Mode",
            OperatingMode::Unknown(_) => "Unknown",
        }
    }
}

/// Autostart sequence state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutostartState {
    /// 0 - Off
    Off,
    /// 1 - Waiting for key
    WaitingForKey,
    /// 2 - Continuous
    Continuous,
    /// 3 - On/Off Modulation
    OnOffModulation,
    /// 4 - Modulation
    Modulation,
    /// 5 - Fault
    Fault,
    /// 6 - Aborted
    Aborted,
    /// Undocumented code
    Unknown(i32),
}

impl AutostartState {
    /// Map a numeric state code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => AutostartState::Off,
            1 => AutostartState::WaitingForKey,
            2 => AutostartState::Continuous,
            3 => AutostartState::OnOffModulation,
            4 => AutostartState::Modulation,
            5 => AutostartState::Fault,
            6 => AutostartState::Aborted,
            other => AutostartState::Unknown(other),
        }
    }

    /// Numeric code
    pub fn code(&self) -> i32 {
        match self {
            AutostartState::Off => 0,
            AutostartState::WaitingForKey => 1,
            AutostartState::Continuous => 2,
            AutostartState::OnOffModulation => 3,
            AutostartState::Modulation => 4,
            AutostartState::Fault => 5,
            AutostartState::Aborted => 6,
            AutostartState::Unknown(code) => *code,
        }
    }

    /// Label without the code
    pub fn label(&self) -> &'static str {
        match self {
            AutostartState::Off => "Off",
            AutostartState::WaitingForKey => "Waiting for key",
            AutostartState::Continuous => "Continuous",
            AutostartState::OnOffModulation => "On/Off Modulation",
            AutostartState::Modulation => "Modulation",
            AutostartState::Fault => "Fault",
            AutostartState::Aborted => "Aborted",
            AutostartState::Unknown(_) => "Unknown",
        }
    }
}

macro_rules! impl_code_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{} - {}", self.code(), self.label())
                }
            }
        )*
    };
}

impl_code_display!(Fault, OperatingMode, AutostartState);

/// Analog and digital modulation enables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModulationState {
    /// Analog modulation enabled
    pub analog: bool,
    /// Digital modulation enabled
    pub digital: bool,
}

impl fmt::Display for ModulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analog {}, digital {}",
            on_off(self.analog),
            on_off(self.digital)
        )
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Parse an integer code reply
pub(crate) fn parse_code(command: &str, reply: &str) -> Result<i32, ProtocolError> {
    let text = reply.trim();
    text.parse::<i32>()
        .or_else(|_| text.parse::<f64>().map(|v| v as i32))
        .map_err(|_| invalid(command, reply))
}

/// Parse a numeric reply
pub(crate) fn parse_number(command: &str, reply: &str) -> Result<f64, ProtocolError> {
    reply
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid(command, reply))
}

/// Parse a boolean reply: `1`/`0` on classic firmware, `ON`/`OFF` on SCPI
pub(crate) fn parse_flag(command: &str, reply: &str) -> Result<bool, ProtocolError> {
    match reply.trim().to_ascii_uppercase().as_str() {
        "1" | "ON" => Ok(true),
        "0" | "OFF" => Ok(false),
        _ => Err(invalid(command, reply)),
    }
}

fn invalid(command: &str, reply: &str) -> ProtocolError {
    ProtocolError::InvalidResponse {
        command: command.to_string(),
        response: reply.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_labels() {
        assert_eq!(Fault::from_code(0).to_string(), "0 - No errors");
        assert_eq!(Fault::from_code(4).to_string(), "4 - Constant power time out");
        assert_eq!(Fault::from_code(2), Fault::Unknown(2));
        assert_eq!(Fault::from_code(2).to_string(), "2 - Unknown");
        assert!(Fault::Interlock.is_fault());
        assert!(!Fault::None.is_fault());
    }

    #[test]
    fn test_mode_and_state_labels() {
        assert_eq!(OperatingMode::from_code(1).to_string(), "1 - Constant Power");
        assert_eq!(
            AutostartState::from_code(1).to_string(),
            "1 - Waiting for key"
        );
        assert_eq!(AutostartState::from_code(6), AutostartState::Aborted);
        for code in 0..=6 {
            assert_eq!(AutostartState::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_code("f?", "3").unwrap(), 3);
        assert_eq!(parse_code("f?", "1.0").unwrap(), 1);
        assert_eq!(parse_number("pa?", "0.0125\r").unwrap(), 0.0125);
        assert!(parse_flag("l?", "1").unwrap());
        assert!(!parse_flag("OUTP:STAT?", "off").unwrap());
        assert!(matches!(
            parse_number("pa?", "Syntax error"),
            Err(ProtocolError::InvalidResponse { .. })
        ));
    }
}
