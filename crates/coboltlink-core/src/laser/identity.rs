//! Laser identification
//!
//! Runs the fixed query sequence that decides whether the device on a
//! channel is one of ours and what it is: firmware version, serial number,
//! then model number. Firmware without a version separator predates the
//! model number query, so the model is derived from the serial number.

use serde::{Deserialize, Serialize};

use crate::protocol::{CommandChannel, ProtocolError};

/// Firmware version query
pub const FIRMWARE_QUERY: &str = "gfv?";
/// Serial number query
pub const SERIAL_QUERY: &str = "sn?";
/// Model number query (versioned firmware only)
pub const MODEL_QUERY: &str = "glm?";

/// Suffix appended to model numbers derived from legacy serial numbers
const LEGACY_MODEL_SUFFIX: &str = "-04-XX-XXXX-XXX";

/// Who the laser says it is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Serial number, digits only
    pub serial_number: String,
    /// Model number, absent when it cannot be queried or derived
    pub model_number: Option<String>,
    /// Firmware descriptor as reported
    pub firmware: String,
}

impl DeviceIdentity {
    /// Whether the firmware is the legacy generation without `glm?`
    pub fn is_legacy_firmware(&self) -> bool {
        !self.firmware.contains('.')
    }

    /// Wavelength in nm, from the first four digits of the model number
    pub fn wavelength_nm(&self) -> Option<u32> {
        self.model_number
            .as_deref()
            .and_then(|m| m.get(0..4))
            .and_then(|w| w.parse().ok())
    }
}

/// Identify the laser on an open channel.
///
/// Every failure, including transport errors, is reported as
/// [`ProtocolError::UnrecognizedDevice`]. The caller owns closing the
/// channel.
pub fn identify(channel: &mut CommandChannel) -> Result<DeviceIdentity, ProtocolError> {
    run_identification(channel).map_err(|e| match e {
        ProtocolError::UnrecognizedDevice(_) => e,
        other => ProtocolError::UnrecognizedDevice(other.to_string()),
    })
}

fn run_identification(channel: &mut CommandChannel) -> Result<DeviceIdentity, ProtocolError> {
    let firmware = channel.send(FIRMWARE_QUERY)?.trim().to_string();
    if firmware.to_ascii_lowercase().contains("error") {
        return Err(ProtocolError::UnrecognizedDevice(format!(
            "firmware query answered {firmware:?}"
        )));
    }

    let reported_serial = channel.send(SERIAL_QUERY)?.trim().to_string();

    let (serial_number, model_number) = if firmware.contains('.') {
        let model = channel.send(MODEL_QUERY)?.trim().to_string();
        (reported_serial, Some(model))
    } else {
        match derive_legacy_model(&reported_serial) {
            Some((model, serial)) => (serial, Some(model)),
            None => (reported_serial, None),
        }
    };

    if serial_number.is_empty() || !serial_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::UnrecognizedDevice(format!(
            "malformed serial number {serial_number:?}"
        )));
    }

    let identity = DeviceIdentity {
        serial_number,
        model_number,
        firmware,
    };
    tracing::info!(
        "Identified laser: serial {} model {:?} firmware {}",
        identity.serial_number,
        identity.model_number,
        identity.firmware
    );
    Ok(identity)
}

/// Derive `(model_number, serial_number)` from a legacy serial number.
///
/// The leading run up to and including the first `0` becomes the model
/// prefix, zero-padded on the left; the rest, without leading zeros, is the
/// serial number. Returns `None` when the serial number has no `0`.
pub fn derive_legacy_model(serial: &str) -> Option<(String, String)> {
    let zero = serial.find('0')?;
    let (consumed, rest) = serial.split_at(zero + 1);
    let model = format!("0{consumed}{LEGACY_MODEL_SUFFIX}");
    let serial = rest.trim_start_matches('0').to_string();
    Some((model, serial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_legacy_model() {
        assert_eq!(
            derive_legacy_model("0123456"),
            Some(("00-04-XX-XXXX-XXX".to_string(), "123456".to_string()))
        );
        assert_eq!(
            derive_legacy_model("4730012345"),
            Some(("04730-04-XX-XXXX-XXX".to_string(), "12345".to_string()))
        );
        assert_eq!(derive_legacy_model("123456"), None);
    }

    #[test]
    fn test_wavelength() {
        let identity = DeviceIdentity {
            serial_number: "12345".into(),
            model_number: Some("0532-06-91-0100-000".into()),
            firmware: "1.2.3".into(),
        };
        assert_eq!(identity.wavelength_nm(), Some(532));
        assert!(!identity.is_legacy_firmware());

        let identity = DeviceIdentity {
            model_number: Some("00-04-XX-XXXX-XXX".into()),
            firmware: "20120415".into(),
            ..identity
        };
        assert_eq!(identity.wavelength_nm(), None);
        assert!(identity.is_legacy_firmware());
    }
}
