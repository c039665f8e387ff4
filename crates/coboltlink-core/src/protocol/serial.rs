//! Serial port handling
//!
//! Provides the `serialport`-backed [`Transport`] and port enumeration.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use super::{PortProvider, ProtocolError, Transport, DEFAULT_BAUD_RATE};

/// Polling interval while waiting for reply bytes
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Read timeout used for ports opened without an open timeout
const PERSISTENT_PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// Hardware descriptor, e.g. "USB VID:PID=0403:6001 SER=FT1234"
    pub hardware_id: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// USB serial number (if available). Not the laser serial number.
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Port entry with no hardware details
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_id: "n/a".to_string(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                let hardware_id = match &usb_info.serial_number {
                    Some(sn) => format!(
                        "USB VID:PID={:04X}:{:04X} SER={}",
                        usb_info.vid, usb_info.pid, sn
                    ),
                    None => format!("USB VID:PID={:04X}:{:04X}", usb_info.vid, usb_info.pid),
                };
                Self {
                    name: info.port_name,
                    hardware_id,
                    vid: Some(usb_info.vid),
                    pid: Some(usb_info.pid),
                    manufacturer: usb_info.manufacturer,
                    product: usb_info.product,
                    serial_number: usb_info.serial_number,
                }
            }
            SerialPortType::PciPort => Self {
                hardware_id: "PCI".to_string(),
                ..Self::named(info.port_name)
            },
            SerialPortType::BluetoothPort => Self {
                hardware_id: "Bluetooth".to_string(),
                ..Self::named(info.port_name)
            },
            SerialPortType::Unknown => Self::named(info.port_name),
        }
    }
}

/// Helper used to sort port names so that:
///  - ttyACM* ports come first (sorted numerically by suffix)
///  - then ttyUSB* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::debug!("serialport enumeration failed: {e}"),
    }

    // Linux-only: USB adapters occasionally missing from the udev listing
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::named(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Take one complete line off the front of `pending`.
///
/// Stray terminators left over from a previous `\r\n` are dropped first.
/// The returned line keeps its terminator; a `\r\n` pair is consumed whole
/// when both bytes are present.
pub(crate) fn take_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let start = pending
        .iter()
        .position(|&b| b != b'\r' && b != b'\n')
        .unwrap_or(pending.len());
    if start > 0 {
        pending.drain(..start);
    }

    let end = pending.iter().position(|&b| b == b'\r' || b == b'\n')?;
    let mut cut = end + 1;
    if pending[end] == b'\r' && pending.get(cut) == Some(&b'\n') {
        cut += 1;
    }
    Some(pending.drain(..cut).collect())
}

/// [`Transport`] over a `serialport` handle
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open and configure a serial port (8N1, no flow control)
    pub fn open(
        name: &str,
        baud_rate: Option<u32>,
        open_timeout: Option<Duration>,
    ) -> Result<Self, ProtocolError> {
        let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        let mut port = serialport::new(name, baud)
            .timeout(open_timeout.unwrap_or(PERSISTENT_PORT_TIMEOUT))
            .open()
            .map_err(|e| ProtocolError::PortUnavailable {
                port: name.to_string(),
                reason: e.to_string(),
            })?;
        configure_port(port.as_mut()).map_err(|e| ProtocolError::PortUnavailable {
            port: name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            port,
            name: name.to_string(),
            pending: Vec::new(),
        })
    }

    /// Port name this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Configure a serial port for laser communication
fn configure_port(port: &mut dyn SerialPort) -> Result<(), serialport::Error> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;
    Ok(())
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; 256];

        loop {
            if let Some(line) = take_line(&mut self.pending) {
                return Ok(line);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(std::mem::take(&mut self.pending));
            }

            let available = self.port.bytes_to_read().map_err(io::Error::from)?;
            if available == 0 {
                std::thread::sleep(POLL_INTERVAL.min(deadline - now));
                continue;
            }

            let to_read = std::cmp::min(available as usize, buffer.len());
            match self.port.read(&mut buffer[..to_read]) {
                Ok(n) => self.pending.extend_from_slice(&buffer[..n]),
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn close(&mut self) -> io::Result<()> {
        // serialport closes the handle on drop; flush what is still queued.
        self.pending.clear();
        self.port.flush()
    }
}

/// [`PortProvider`] for the host's real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortProvider for SystemPorts {
    fn list_ports(&self) -> Vec<PortInfo> {
        list_ports()
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        open_timeout: Option<Duration>,
    ) -> Result<Box<dyn Transport>, ProtocolError> {
        let transport = SerialTransport::open(port, Some(baud_rate), open_timeout)?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // This test just ensures the function doesn't panic
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {}", port.name, port.hardware_id);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "/dev/ttyACM10",
        ];
        let mut ports: Vec<PortInfo> = names.into_iter().map(PortInfo::named).collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_take_line_crlf() {
        let mut pending = b"OK\r\n0.0125\r\n".to_vec();
        assert_eq!(take_line(&mut pending), Some(b"OK\r\n".to_vec()));
        assert_eq!(take_line(&mut pending), Some(b"0.0125\r\n".to_vec()));
        assert_eq!(take_line(&mut pending), None);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_line_split_terminator() {
        // "\r" arrived, "\n" is still on the wire
        let mut pending = b"1\r".to_vec();
        assert_eq!(take_line(&mut pending), Some(b"1\r".to_vec()));

        pending.extend_from_slice(b"\n0\r\n");
        assert_eq!(take_line(&mut pending), Some(b"0\r\n".to_vec()));
    }

    #[test]
    fn test_take_line_incomplete() {
        let mut pending = b"\r\n12345".to_vec();
        assert_eq!(take_line(&mut pending), None);
        assert_eq!(pending, b"12345".to_vec());
    }

    #[test]
    fn test_take_line_terminators_only() {
        let mut pending = b"\r\n\r".to_vec();
        assert_eq!(take_line(&mut pending), None);
        assert!(pending.is_empty());
    }
}
