//! Device discovery
//!
//! Resolves a laser either by an explicit port or by scanning every port for
//! a matching serial number. During a scan each candidate is opened, probed
//! with `sn?` and closed again before the next one is touched, so at most
//! one port is open at a time.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{ChannelTiming, CommandChannel, PortProvider, ProtocolError};

/// Serial number query used to probe ports
pub const SERIAL_NUMBER_QUERY: &str = "sn?";

/// How to find the laser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectTarget {
    /// Open this port directly
    ByPort(String),
    /// Scan all ports for a laser reporting this serial number
    BySerial(String),
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::ByPort(port) => write!(f, "port {port}"),
            ConnectTarget::BySerial(serial) => write!(f, "serial number {serial}"),
        }
    }
}

/// Why a candidate port was passed over during a serial number scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The port could not be opened
    OpenFailed(String),
    /// The probe could not be written
    WriteFailed(String),
    /// Nothing answered the probe in time
    NoResponse,
    /// A device answered with another serial number
    SerialMismatch(String),
    /// Any other probe failure
    ProbeFailed(String),
}

/// A candidate port skipped during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSkip {
    /// Port that was skipped
    pub port: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

impl fmt::Display for ProbeSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::OpenFailed(e) => write!(f, "{}: open failed ({e})", self.port),
            SkipReason::WriteFailed(e) => write!(f, "{}: probe write failed ({e})", self.port),
            SkipReason::NoResponse => write!(f, "{}: no response to probe", self.port),
            SkipReason::SerialMismatch(sn) => {
                write!(f, "{}: serial number {sn} does not match", self.port)
            }
            SkipReason::ProbeFailed(e) => write!(f, "{}: probe failed ({e})", self.port),
        }
    }
}

/// Open a command channel to the target laser.
///
/// `open_timeout` applies to the explicit port and to every probe; the port
/// found by a serial number scan is reopened without it. Every skipped
/// candidate is reported to `observer`.
pub fn connect(
    provider: &dyn PortProvider,
    target: &ConnectTarget,
    baud_rate: u32,
    open_timeout: Duration,
    timing: ChannelTiming,
    observer: &mut dyn FnMut(&ProbeSkip),
) -> Result<CommandChannel, ProtocolError> {
    match target {
        ConnectTarget::ByPort(port) => {
            let transport = provider
                .open(port, baud_rate, Some(open_timeout))
                .map_err(|e| unavailable(port, e))?;
            tracing::info!("Opened {port} at {baud_rate} baud");
            Ok(CommandChannel::new(transport, port.as_str(), baud_rate, timing))
        }
        ConnectTarget::BySerial(serial) => {
            let wanted = serial.trim();
            let ports = provider.list_ports();
            tracing::debug!("Scanning {} ports for serial number {wanted}", ports.len());

            for info in ports {
                match probe_port(provider, &info.name, baud_rate, open_timeout, timing) {
                    Ok((found, probed_at)) if found == wanted => {
                        tracing::info!("Found serial number {wanted} on {}", info.name);
                        let transport = provider
                            .open(&info.name, baud_rate, None)
                            .map_err(|e| unavailable(&info.name, e))?;
                        let channel = CommandChannel::new(transport, info.name, baud_rate, timing);
                        return Ok(channel.with_last_exchange(probed_at));
                    }
                    Ok((found, _)) => report(
                        observer,
                        ProbeSkip {
                            port: info.name,
                            reason: SkipReason::SerialMismatch(found),
                        },
                    ),
                    Err(reason) => report(
                        observer,
                        ProbeSkip {
                            port: info.name,
                            reason,
                        },
                    ),
                }
            }

            Err(ProtocolError::DeviceNotFound(wanted.to_string()))
        }
    }
}

/// Open a port, ask for its serial number and close it again.
///
/// Also returns when the probe exchange ended.
fn probe_port(
    provider: &dyn PortProvider,
    port: &str,
    baud_rate: u32,
    open_timeout: Duration,
    timing: ChannelTiming,
) -> Result<(String, Option<Instant>), SkipReason> {
    let transport = provider
        .open(port, baud_rate, Some(open_timeout))
        .map_err(|e| SkipReason::OpenFailed(e.to_string()))?;

    let mut channel = CommandChannel::new(transport, port, baud_rate, timing);
    let reply = channel.send(SERIAL_NUMBER_QUERY);
    let probed_at = channel.last_exchange();
    channel.close();

    match reply {
        Ok(serial) => Ok((serial.trim().to_string(), probed_at)),
        Err(ProtocolError::NoResponse) => Err(SkipReason::NoResponse),
        Err(ProtocolError::WriteFailed(e)) => Err(SkipReason::WriteFailed(e)),
        Err(e) => Err(SkipReason::ProbeFailed(e.to_string())),
    }
}

fn report(observer: &mut dyn FnMut(&ProbeSkip), skip: ProbeSkip) {
    tracing::debug!("Skipping {skip}");
    observer(&skip);
}

fn unavailable(port: &str, err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::PortUnavailable { .. } => err,
        other => ProtocolError::PortUnavailable {
            port: port.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        assert_eq!(
            ConnectTarget::ByPort("COM3".into()).to_string(),
            "port COM3"
        );
        assert_eq!(
            ConnectTarget::BySerial("12345".into()).to_string(),
            "serial number 12345"
        );
    }

    #[test]
    fn test_skip_display() {
        let skip = ProbeSkip {
            port: "/dev/ttyUSB0".into(),
            reason: SkipReason::SerialMismatch("777".into()),
        };
        assert_eq!(
            skip.to_string(),
            "/dev/ttyUSB0: serial number 777 does not match"
        );
    }

    #[test]
    fn test_unavailable_keeps_port_error() {
        let err = unavailable(
            "COM1",
            ProtocolError::PortUnavailable {
                port: "COM1".into(),
                reason: "Access denied".into(),
            },
        );
        assert_eq!(err.to_string(), "Port COM1 not accessible: Access denied");

        let err = unavailable("COM2", ProtocolError::NotConnected);
        assert!(matches!(err, ProtocolError::PortUnavailable { port, .. } if port == "COM2"));
    }
}
