//! Transport abstraction
//!
//! The [`Transport`] trait is the physical link to one laser. The
//! [`CommandChannel`](super::CommandChannel) layers framing and timing on top
//! of it, so a serial port, a simulated laser and a scripted test double are
//! interchangeable. [`PortProvider`] covers port enumeration and opening.

use std::io;
use std::time::Duration;

use super::{PortInfo, ProtocolError};

/// Line-oriented byte transport to a single device.
pub trait Transport: Send {
    /// Write all bytes to the device.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read one line, waiting at most `timeout`.
    ///
    /// Returns the line including its terminator. If the timeout elapses
    /// first, returns whatever arrived (possibly nothing) without a
    /// terminator.
    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Drop any unread input.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release the underlying resource.
    fn close(&mut self) -> io::Result<()>;
}

/// Host-side port enumeration and opening.
pub trait PortProvider {
    /// List candidate ports in a deterministic order.
    fn list_ports(&self) -> Vec<PortInfo>;

    /// Open a port. `open_timeout` bounds how long opening may block;
    /// `None` opens without a deadline.
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        open_timeout: Option<Duration>,
    ) -> Result<Box<dyn Transport>, ProtocolError>;
}
