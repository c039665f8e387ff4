//! Serial Protocol Communication
//!
//! Implements the line-oriented ASCII protocol spoken by Cobolt lasers.
//!
//! Commands are terminated by a single carriage return; replies end in
//! `\r`, `\n` or both. The device firmware drops commands that arrive too
//! close together, so every exchange goes through a [`CommandChannel`] that
//! enforces [`MIN_COMMAND_INTERVAL_MS`] between exchanges.

mod channel;
pub mod discovery;
mod error;
pub mod serial;
mod transport;

pub use channel::{strip_terminators, ChannelTiming, CommandChannel};
pub use discovery::{connect, ConnectTarget, ProbeSkip, SkipReason};
pub use error::ProtocolError;
pub use serial::{list_ports, PortInfo, SerialTransport, SystemPorts};
pub use transport::{PortProvider, Transport};

/// Default baud rate for laser communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout for a reply in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default timeout used when opening a port for a probe or by explicit id
pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 1000;

/// Minimum spacing between the end of one exchange and the next write.
///
/// The laser's input buffer overruns when commands arrive faster than this.
pub const MIN_COMMAND_INTERVAL_MS: u64 = 100;

/// Command terminator appended to every frame
pub const COMMAND_TERMINATOR: u8 = b'\r';
