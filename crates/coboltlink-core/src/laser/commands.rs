//! Laser command vocabularies
//!
//! Each [`Variant`] maps the abstract [`Operation`]s it supports to the text
//! token its firmware understands. Operations a command set lacks map to
//! `None` and are rejected before anything is sent.

use super::Variant;

/// Operations exposed by a laser session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Connection check, answered with `OK`
    Ping,
    /// Turn on through the autostart sequence
    TurnOn,
    /// Turn off
    TurnOff,
    /// Query whether the laser is on
    IsOn,
    /// Query the interlock (0 closed, 1 open)
    Interlock,
    /// Query the fault code
    GetFault,
    /// Clear the latched fault
    ClearFault,
    /// Query the operating mode code
    GetOperatingMode,
    /// Query the autostart state code
    GetAutostartState,
    /// Enter constant current mode
    EnterConstantCurrent,
    /// Set the current setpoint
    SetCurrent,
    /// Read the actual current
    GetCurrent,
    /// Read the current setpoint
    GetCurrentSetpoint,
    /// Enter constant power mode
    EnterConstantPower,
    /// Set the power setpoint
    SetPower,
    /// Read the actual output power
    GetPower,
    /// Read the power setpoint
    GetPowerSetpoint,
    /// Read the operating hours
    GetOperatingHours,
    /// Enter modulation mode
    EnterModulation,
    /// Enable/disable digital modulation
    SetDigitalModulation,
    /// Query digital modulation enable
    GetDigitalModulation,
    /// Enable/disable analog modulation
    SetAnalogModulation,
    /// Query analog modulation enable
    GetAnalogModulation,
    /// Enter on/off modulation
    EnableOnOffModulation,
    /// Leave on/off modulation
    DisableOnOffModulation,
    /// Set the modulation power
    SetModulationPower,
    /// Read the modulation power setpoint
    GetModulationPower,
    /// Set the analog input impedance (0 high-Z, 1 50 Ohm)
    SetAnalogImpedance,
    /// Read the analog input impedance
    GetAnalogImpedance,
    /// Set the modulation high current
    SetModulationCurrentHigh,
    /// Read the modulation high current
    GetModulationCurrentHigh,
    /// Set the modulation low current
    SetModulationCurrentLow,
    /// Read the modulation low current
    GetModulationCurrentLow,
    /// Read the modulation TEC temperature
    ReadModulationTec,
    /// Set the modulation TEC temperature
    SetModulationTec,
    /// Read the modulation TEC setpoint
    GetModulationTecSetpoint,
}

impl Operation {
    /// Human readable name, used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Ping => "connection check",
            Operation::TurnOn => "turn on",
            Operation::TurnOff => "turn off",
            Operation::IsOn => "on state query",
            Operation::Interlock => "interlock query",
            Operation::GetFault => "fault query",
            Operation::ClearFault => "clear fault",
            Operation::GetOperatingMode => "operating mode query",
            Operation::GetAutostartState => "autostart state query",
            Operation::EnterConstantCurrent => "constant current mode",
            Operation::SetCurrent => "set current",
            Operation::GetCurrent => "current query",
            Operation::GetCurrentSetpoint => "current setpoint query",
            Operation::EnterConstantPower => "constant power mode",
            Operation::SetPower => "set power",
            Operation::GetPower => "power query",
            Operation::GetPowerSetpoint => "power setpoint query",
            Operation::GetOperatingHours => "operating hours query",
            Operation::EnterModulation => "modulation mode",
            Operation::SetDigitalModulation => "digital modulation",
            Operation::GetDigitalModulation => "digital modulation query",
            Operation::SetAnalogModulation => "analog modulation",
            Operation::GetAnalogModulation => "analog modulation query",
            Operation::EnableOnOffModulation | Operation::DisableOnOffModulation => {
                "on/off modulation"
            }
            Operation::SetModulationPower => "modulation power",
            Operation::GetModulationPower => "modulation power query",
            Operation::SetAnalogImpedance => "analog impedance",
            Operation::GetAnalogImpedance => "analog impedance query",
            Operation::SetModulationCurrentHigh => "modulation high current",
            Operation::GetModulationCurrentHigh => "modulation high current query",
            Operation::SetModulationCurrentLow => "modulation low current",
            Operation::GetModulationCurrentLow => "modulation low current query",
            Operation::ReadModulationTec => "modulation TEC temperature",
            Operation::SetModulationTec => "modulation TEC setpoint",
            Operation::GetModulationTecSetpoint => "modulation TEC setpoint query",
        }
    }
}

/// Static command tables of every command set
pub struct Vocabulary;

impl Vocabulary {
    /// Command token for an operation, `None` if the command set lacks it
    pub fn lookup(variant: Variant, op: Operation) -> Option<&'static str> {
        match variant {
            Variant::Generic => baseline(op),
            Variant::Mld => baseline(op).or_else(|| mld(op)),
            Variant::Dpl => baseline(op).or_else(|| dpl(op)),
            Variant::Scpi => scpi(op),
        }
    }
}

/// Commands understood by every laser of the classic command set
fn baseline(op: Operation) -> Option<&'static str> {
    let token = match op {
        Operation::Ping => "?",
        Operation::TurnOn => "@cob1",
        Operation::TurnOff => "l0",
        Operation::IsOn => "l?",
        Operation::Interlock => "ilk?",
        Operation::GetFault => "f?",
        Operation::ClearFault => "cf",
        Operation::GetOperatingMode => "gam?",
        Operation::GetAutostartState => "gom?",
        Operation::EnterConstantCurrent => "ci",
        Operation::SetCurrent => "slc",
        Operation::GetCurrent => "i?",
        Operation::GetCurrentSetpoint => "glc?",
        Operation::EnterConstantPower => "cp",
        Operation::SetPower => "p",
        Operation::GetPower => "pa?",
        Operation::GetPowerSetpoint => "p?",
        Operation::GetOperatingHours => "hrs?",
        _ => return None,
    };
    Some(token)
}

/// Modulation commands shared by the 06-MLD and 06-DPL lines
fn modulation_06(op: Operation) -> Option<&'static str> {
    let token = match op {
        Operation::EnterModulation => "em",
        Operation::SetDigitalModulation => "sdmes",
        Operation::GetDigitalModulation => "gdmes?",
        Operation::SetAnalogModulation => "sames",
        Operation::GetAnalogModulation => "games?",
        _ => return None,
    };
    Some(token)
}

fn mld(op: Operation) -> Option<&'static str> {
    let token = match op {
        Operation::EnableOnOffModulation => "eoom",
        Operation::DisableOnOffModulation => "xoom",
        Operation::SetModulationPower => "slmp",
        Operation::GetModulationPower => "glmp?",
        Operation::SetAnalogImpedance => "salis",
        Operation::GetAnalogImpedance => "galis?",
        _ => return modulation_06(op),
    };
    Some(token)
}

fn dpl(op: Operation) -> Option<&'static str> {
    let token = match op {
        Operation::SetModulationCurrentHigh => "smc",
        Operation::GetModulationCurrentHigh => "gmc?",
        Operation::SetModulationCurrentLow => "slth",
        Operation::GetModulationCurrentLow => "glth?",
        Operation::ReadModulationTec => "rtec4t?",
        Operation::SetModulationTec => "stec4t",
        Operation::GetModulationTecSetpoint => "gtec4t?",
        _ => return modulation_06(op),
    };
    Some(token)
}

fn scpi(op: Operation) -> Option<&'static str> {
    let token = match op {
        Operation::Ping => "?",
        Operation::TurnOn => "OUTP:STAT ON",
        Operation::TurnOff => "OUTP:STAT OFF",
        Operation::IsOn => "OUTP:STAT?",
        Operation::Interlock => "SYST:INT?",
        Operation::GetFault => "SYST:FAUL?",
        Operation::ClearFault => "SYST:FAUL:CLE",
        Operation::GetOperatingMode => "SOUR:MODE?",
        Operation::GetAutostartState => "SYST:STAT?",
        Operation::EnterConstantCurrent => "SOUR:MODE CURR",
        Operation::SetCurrent => "SOUR:CURR",
        Operation::GetCurrent => "MEAS:CURR?",
        Operation::GetCurrentSetpoint => "SOUR:CURR?",
        Operation::EnterConstantPower => "SOUR:MODE POW",
        Operation::SetPower => "SOUR:POW",
        Operation::GetPower => "MEAS:POW?",
        Operation::GetPowerSetpoint => "SOUR:POW?",
        Operation::GetOperatingHours => "SYST:HOUR?",
        Operation::EnterModulation => "SOUR:MODE MOD",
        Operation::SetDigitalModulation => "SOUR:MOD:DIG",
        Operation::GetDigitalModulation => "SOUR:MOD:DIG?",
        Operation::SetAnalogModulation => "SOUR:MOD:ANAL",
        Operation::GetAnalogModulation => "SOUR:MOD:ANAL?",
        Operation::SetModulationPower => "SOUR:MOD:POW",
        Operation::GetModulationPower => "SOUR:MOD:POW?",
        _ => return None,
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_shared() {
        for variant in [Variant::Generic, Variant::Mld, Variant::Dpl] {
            assert_eq!(Vocabulary::lookup(variant, Operation::TurnOn), Some("@cob1"));
            assert_eq!(Vocabulary::lookup(variant, Operation::SetPower), Some("p"));
            assert_eq!(Vocabulary::lookup(variant, Operation::GetPower), Some("pa?"));
        }
        assert_eq!(
            Vocabulary::lookup(Variant::Scpi, Operation::SetPower),
            Some("SOUR:POW")
        );
    }

    #[test]
    fn test_generic_has_no_modulation() {
        assert_eq!(Vocabulary::lookup(Variant::Generic, Operation::EnterModulation), None);
        assert_eq!(
            Vocabulary::lookup(Variant::Generic, Operation::SetDigitalModulation),
            None
        );
    }

    #[test]
    fn test_family_specific_commands() {
        assert_eq!(
            Vocabulary::lookup(Variant::Mld, Operation::SetModulationPower),
            Some("slmp")
        );
        assert_eq!(
            Vocabulary::lookup(Variant::Dpl, Operation::SetModulationPower),
            None
        );
        assert_eq!(
            Vocabulary::lookup(Variant::Dpl, Operation::SetModulationCurrentLow),
            Some("slth")
        );
        assert_eq!(
            Vocabulary::lookup(Variant::Mld, Operation::ReadModulationTec),
            None
        );
        assert_eq!(
            Vocabulary::lookup(Variant::Scpi, Operation::EnableOnOffModulation),
            None
        );
        assert_eq!(Vocabulary::lookup(Variant::Dpl, Operation::EnterModulation), Some("em"));
    }

    #[test]
    fn test_every_variant_can_ping() {
        for variant in [Variant::Generic, Variant::Mld, Variant::Dpl, Variant::Scpi] {
            assert_eq!(Vocabulary::lookup(variant, Operation::Ping), Some("?"));
        }
    }
}
