//! Protocol errors

use thiserror::Error;

use crate::laser::Variant;

/// Errors that can occur while talking to a laser
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The explicitly requested port could not be opened.
    #[error("Port {port} not accessible: {reason}")]
    PortUnavailable {
        /// Port that was requested
        port: String,
        /// Why opening failed
        reason: String,
    },

    /// No enumerated port answered with the requested serial number.
    #[error("No laser found with serial number {0}")]
    DeviceNotFound(String),

    /// The device on the port is not a laser of this family.
    #[error("Not a Cobolt laser: {0}")]
    UnrecognizedDevice(String),

    /// The transport refused the write. Connection state is unknown.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// No complete reply arrived before the timeout.
    #[error("No response")]
    NoResponse,

    /// The session has been disconnected.
    #[error("Not connected to laser")]
    NotConnected,

    /// The command cannot be framed (empty, non-ASCII, embedded terminator
    /// or a non-finite argument).
    #[error("Invalid command: {0:?}")]
    InvalidCommand(String),

    /// The reply could not be parsed, or the laser reported an error.
    #[error("Invalid response to '{command}': {response:?}")]
    InvalidResponse {
        /// Command that was sent
        command: String,
        /// Reply as received
        response: String,
    },

    /// The session's command set has no such operation.
    #[error("{operation} is not supported by the {variant} command set")]
    Unsupported {
        /// Operation that was requested
        operation: &'static str,
        /// Command set in use
        variant: Variant,
    },
}

impl ProtocolError {
    /// Whether the error leaves the connection usable for another exchange.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::NoResponse
                | ProtocolError::InvalidCommand(_)
                | ProtocolError::InvalidResponse { .. }
                | ProtocolError::Unsupported { .. }
        )
    }
}
