//! Unit Conversion Functions
//!
//! The host API always speaks mW and mA. Firmware speaks:
//! - Power: W on every command set
//! - Current: mA on the classic command sets, A on SCPI
//! - MLD modulation power: mW

use super::Variant;
use crate::protocol::ProtocolError;

/// Convert milliwatts to watts
pub fn mw_to_w(mw: f64) -> f64 {
    mw / 1000.0
}

/// Convert watts to milliwatts
pub fn w_to_mw(w: f64) -> f64 {
    w * 1000.0
}

/// Convert milliamps to amps
pub fn ma_to_a(ma: f64) -> f64 {
    ma / 1000.0
}

/// Convert amps to milliamps
pub fn a_to_ma(a: f64) -> f64 {
    a * 1000.0
}

/// Host mA to the current unit of a command set
pub fn current_to_device(variant: Variant, ma: f64) -> f64 {
    match variant {
        Variant::Scpi => ma_to_a(ma),
        _ => ma,
    }
}

/// Device current reading to host mA
pub fn current_from_device(variant: Variant, value: f64) -> f64 {
    match variant {
        Variant::Scpi => a_to_ma(value),
        _ => value,
    }
}

/// Format a value for the wire.
///
/// Uses the shortest representation that parses back to the same value, so
/// `0.0125` stays `0.0125` rather than picking up float noise. NaN and
/// infinities have no wire form and are rejected.
pub fn format_value(value: f64) -> Result<String, ProtocolError> {
    if !value.is_finite() {
        return Err(ProtocolError::InvalidCommand(format!("non-finite value {value}")));
    }
    let rounded = (value * 1e9).round() / 1e9;
    if rounded == rounded.trunc() && rounded.abs() < 1e15 {
        Ok(format!("{}", rounded as i64))
    } else {
        Ok(format!("{rounded}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_round_trip() {
        assert_eq!(mw_to_w(12.5), 0.0125);
        assert_eq!(w_to_mw(0.0125), 12.5);
        assert_eq!(w_to_mw(mw_to_w(100.0)), 100.0);
    }

    #[test]
    fn test_current_per_variant() {
        assert_eq!(current_to_device(Variant::Mld, 150.0), 150.0);
        assert_eq!(current_to_device(Variant::Scpi, 150.0), 0.15);
        assert_eq!(current_from_device(Variant::Scpi, 1.5), 1500.0);
        assert_eq!(current_from_device(Variant::Generic, 1.5), 1.5);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.0125).unwrap(), "0.0125");
        assert_eq!(format_value(1500.0).unwrap(), "1500");
        assert_eq!(format_value(mw_to_w(0.1)).unwrap(), "0.0001");
        assert_eq!(format_value(mw_to_w(33.3)).unwrap(), "0.0333");
        assert_eq!(format_value(-2.0).unwrap(), "-2");
    }

    #[test]
    fn test_format_value_rejects_non_finite() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                format_value(value),
                Err(ProtocolError::InvalidCommand(_))
            ));
        }
    }
}
