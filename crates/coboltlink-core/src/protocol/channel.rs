//! Command channel
//!
//! Owns one open transport and runs framed, rate-limited exchanges over it:
//! one command out, one reply line back.

use std::time::{Duration, Instant};

use super::{
    ProtocolError, Transport, COMMAND_TERMINATOR, DEFAULT_TIMEOUT_MS, MIN_COMMAND_INTERVAL_MS,
};

/// Strip trailing carriage returns and line feeds from a reply
pub fn strip_terminators(reply: &str) -> &str {
    reply.trim_end_matches(['\r', '\n'])
}

/// Build the on-wire frame for a command
fn frame_command(command: &str) -> Result<Vec<u8>, ProtocolError> {
    if command.is_empty()
        || !command.is_ascii()
        || command.contains(['\r', '\n'])
    {
        return Err(ProtocolError::InvalidCommand(command.to_string()));
    }
    let mut frame = Vec::with_capacity(command.len() + 1);
    frame.extend_from_slice(command.as_bytes());
    frame.push(COMMAND_TERMINATOR);
    Ok(frame)
}

/// Timing parameters of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTiming {
    /// Reply timeout when the caller does not override it
    pub default_timeout: Duration,
    /// Minimum gap between the end of one exchange and the next write
    pub min_interval: Duration,
}

impl Default for ChannelTiming {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            min_interval: Duration::from_millis(MIN_COMMAND_INTERVAL_MS),
        }
    }
}

impl ChannelTiming {
    /// Timing with a custom default reply timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            default_timeout: timeout,
            ..Self::default()
        }
    }
}

/// Exclusive, half-duplex command channel to one laser
pub struct CommandChannel {
    /// Underlying transport; `None` once closed
    transport: Option<Box<dyn Transport>>,
    /// Port identifier the transport was opened on
    port_name: String,
    /// Baud rate the port was opened at
    baud_rate: u32,
    /// Timeout and rate-limit settings
    timing: ChannelTiming,
    /// End of the previous exchange, for rate limiting
    last_exchange: Option<Instant>,
    /// Metrics: cumulative bytes/commands sent & replies received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_commands: u64,
    rx_replies: u64,
}

impl CommandChannel {
    /// Wrap an already opened transport
    pub fn new(
        transport: Box<dyn Transport>,
        port_name: impl Into<String>,
        baud_rate: u32,
        timing: ChannelTiming,
    ) -> Self {
        Self {
            transport: Some(transport),
            port_name: port_name.into(),
            baud_rate,
            timing,
            last_exchange: None,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_commands: 0,
            rx_replies: 0,
        }
    }

    /// Carry the end of an earlier exchange with the same device, so the
    /// first command on this channel still honors the minimum interval.
    pub fn with_last_exchange(mut self, last_exchange: Option<Instant>) -> Self {
        self.last_exchange = last_exchange;
        self
    }

    /// Port identifier
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Timing settings
    pub fn timing(&self) -> ChannelTiming {
        self.timing
    }

    /// Whether the transport is still open
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// End of the last exchange, if any
    pub fn last_exchange(&self) -> Option<Instant> {
        self.last_exchange
    }

    /// Get cumulative tx/rx bytes, commands sent and replies received
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_commands, self.rx_replies)
    }

    /// Send a command and wait for its reply with the default timeout
    pub fn send(&mut self, command: &str) -> Result<String, ProtocolError> {
        self.send_timeout(command, None)
    }

    /// Send a command and wait for its reply.
    ///
    /// `timeout` overrides the channel default for this exchange only.
    /// Nothing is retried here; a `NoResponse` leaves the channel usable.
    pub fn send_timeout(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<String, ProtocolError> {
        let frame = frame_command(command)?;
        let timeout = timeout.unwrap_or(self.timing.default_timeout);

        if self.transport.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        self.wait_for_interval();

        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;

        if let Err(e) = transport.discard_input() {
            tracing::debug!(port = %self.port_name, "discarding stale input failed: {e}");
        }

        if let Err(e) = transport.write_all(&frame) {
            tracing::warn!(port = %self.port_name, command, "write failed: {e}");
            self.last_exchange = Some(Instant::now());
            return Err(ProtocolError::WriteFailed(e.to_string()));
        }
        self.tx_bytes = self.tx_bytes.saturating_add(frame.len() as u64);
        self.tx_commands = self.tx_commands.saturating_add(1);
        tracing::debug!(port = %self.port_name, "sent {:?}", command);

        let read = transport.read_line(timeout);
        self.last_exchange = Some(Instant::now());

        let raw = match read {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(port = %self.port_name, command, "read failed: {e}");
                return Err(ProtocolError::NoResponse);
            }
        };
        self.rx_bytes = self.rx_bytes.saturating_add(raw.len() as u64);

        let complete = matches!(raw.last(), Some(b'\r') | Some(b'\n'));
        let text = String::from_utf8_lossy(&raw);
        let reply = strip_terminators(&text);
        if !complete || reply.is_empty() {
            tracing::warn!(
                port = %self.port_name,
                command,
                "no response within {}ms",
                timeout.as_millis()
            );
            return Err(ProtocolError::NoResponse);
        }

        self.rx_replies = self.rx_replies.saturating_add(1);
        tracing::debug!(port = %self.port_name, "received {:?}", reply);
        Ok(reply.to_string())
    }

    /// Block until the minimum command interval has passed
    fn wait_for_interval(&self) {
        if let Some(last) = self.last_exchange {
            let elapsed = last.elapsed();
            if elapsed < self.timing.min_interval {
                std::thread::sleep(self.timing.min_interval - elapsed);
            }
        }
    }

    /// Close the transport. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                tracing::debug!(port = %self.port_name, "close failed: {e}");
            }
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .field("timing", &self.timing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_command() {
        assert_eq!(frame_command("sn?").unwrap(), b"sn?\r".to_vec());
        assert_eq!(frame_command("slc 1500").unwrap(), b"slc 1500\r".to_vec());
    }

    #[test]
    fn test_frame_command_rejects_bad_input() {
        assert!(matches!(
            frame_command(""),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            frame_command("l1\r"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            frame_command("p 1\nl1"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            frame_command("stec4t 25°"),
            Err(ProtocolError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_strip_terminators() {
        assert_eq!(strip_terminators("OK\r\n"), "OK");
        assert_eq!(strip_terminators("OK\n\r\r\n"), "OK");
        assert_eq!(strip_terminators("\r\n"), "");
        assert_eq!(strip_terminators("0.0125"), "0.0125");
    }

    #[test]
    fn test_default_timing() {
        let timing = ChannelTiming::default();
        assert_eq!(timing.default_timeout, Duration::from_millis(1000));
        assert_eq!(timing.min_interval, Duration::from_millis(100));

        let timing = ChannelTiming::with_timeout(Duration::from_millis(250));
        assert_eq!(timing.default_timeout, Duration::from_millis(250));
        assert_eq!(timing.min_interval, Duration::from_millis(100));
    }
}
