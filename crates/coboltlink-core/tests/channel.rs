mod common;

use std::time::{Duration, Instant};

use coboltlink_core::protocol::{ChannelTiming, CommandChannel, ProtocolError};
use common::{line, scripted, scripted_channel, Step};
use pretty_assertions::assert_eq;

#[test]
fn test_command_framed_with_single_cr() {
    let (mut channel, log) = scripted_channel(vec![line("12345"), line("OK")]);

    assert_eq!(channel.send("sn?").unwrap(), "12345");
    assert_eq!(channel.send("p 0.0125").unwrap(), "OK");

    assert_eq!(
        log.lock().unwrap().written(),
        vec!["sn?\r".to_string(), "p 0.0125\r".to_string()]
    );
}

#[test]
fn test_reply_terminators_stripped() {
    let (mut channel, _log) = scripted_channel(vec![
        Step::Reply(b"1\r".to_vec()),
        Step::Reply(b"0.0125\n".to_vec()),
        Step::Reply(b"OK\n\r".to_vec()),
    ]);

    assert_eq!(channel.send("l?").unwrap(), "1");
    assert_eq!(channel.send("pa?").unwrap(), "0.0125");
    assert_eq!(channel.send("cp").unwrap(), "OK");
}

#[test]
fn test_minimum_gap_between_exchanges() {
    let (mut channel, log) = scripted_channel(vec![line("OK"), line("OK"), line("OK")]);

    for _ in 0..3 {
        channel.send("?").unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.writes.len(), 3);
    for i in 1..log.writes.len() {
        let gap = log.writes[i].0.duration_since(log.read_ends[i - 1]);
        assert!(gap >= Duration::from_millis(100), "gap {gap:?} too short");
    }
}

#[test]
fn test_minimum_gap_holds_after_failed_exchanges() {
    let (mut channel, log) = scripted_channel(vec![
        line("OK"),
        Step::Silent,
        Step::FailWrite,
        line("OK"),
    ]);

    channel.send("?").unwrap();
    assert!(matches!(channel.send("?"), Err(ProtocolError::NoResponse)));
    assert!(matches!(channel.send("?"), Err(ProtocolError::WriteFailed(_))));
    channel.send("?").unwrap();

    let log = log.lock().unwrap();
    let min = Duration::from_millis(100);
    // after a success, before the silent exchange
    let gap = log.writes[1].0.duration_since(log.read_ends[0]);
    assert!(gap >= min, "gap {gap:?} after reply");
    // after the silent exchange, before the refused write
    let gap = log.failed_writes[0].duration_since(log.read_ends[1]);
    assert!(gap >= min, "gap {gap:?} after no response");
    // after the refused write
    let gap = log.writes[2].0.duration_since(log.failed_writes[0]);
    assert!(gap >= min, "gap {gap:?} after write failure");
}

#[test]
fn test_empty_reply_is_no_response() {
    let (mut channel, _log) = scripted_channel(vec![line(""), line("OK")]);

    assert!(matches!(channel.send("?"), Err(ProtocolError::NoResponse)));
    // channel stays usable
    assert_eq!(channel.send("?").unwrap(), "OK");
}

#[test]
fn test_silence_and_partial_reply_are_no_response() {
    let (mut channel, _log) = scripted_channel(vec![Step::Silent, Step::Reply(b"123".to_vec())]);

    assert!(matches!(channel.send("sn?"), Err(ProtocolError::NoResponse)));
    assert!(matches!(channel.send("sn?"), Err(ProtocolError::NoResponse)));
}

#[test]
fn test_timeout_override() {
    let (transport, log) = scripted(vec![Step::Silent]);
    let timing = ChannelTiming::with_timeout(Duration::from_secs(5));
    let mut channel = CommandChannel::new(transport, "SCRIPT", 115200, timing);

    let result = channel.send_timeout("hrs?", Some(Duration::from_millis(5)));
    assert!(matches!(result, Err(ProtocolError::NoResponse)));

    let log = log.lock().unwrap();
    let waited = log.read_ends[0].duration_since(log.writes[0].0);
    assert!(waited < Duration::from_secs(1), "waited {waited:?}");
}

#[test]
fn test_write_failure() {
    let (mut channel, log) = scripted_channel(vec![Step::FailWrite, line("OK")]);

    assert!(matches!(
        channel.send("@cob1"),
        Err(ProtocolError::WriteFailed(_))
    ));
    assert!(channel.last_exchange().is_some());
    assert_eq!(channel.send("?").unwrap(), "OK");

    let log = log.lock().unwrap();
    assert_eq!(log.failed_writes.len(), 1);
    assert_eq!(log.written(), vec!["?\r".to_string()]);
}

#[test]
fn test_invalid_command_never_written() {
    let (mut channel, log) = scripted_channel(vec![]);

    assert!(matches!(
        channel.send("l1\rl0"),
        Err(ProtocolError::InvalidCommand(_))
    ));
    assert!(log.lock().unwrap().writes.is_empty());
}

#[test]
fn test_closed_channel() {
    let (mut channel, log) = scripted_channel(vec![line("OK")]);

    channel.close();
    channel.close();
    assert!(!channel.is_open());
    assert!(log.lock().unwrap().closed);
    assert!(matches!(channel.send("?"), Err(ProtocolError::NotConnected)));
}

#[test]
fn test_closed_channel_fails_without_waiting() {
    let (mut channel, _log) = scripted_channel(vec![line("OK")]);

    channel.send("?").unwrap();
    channel.close();

    let started = Instant::now();
    assert!(matches!(channel.send("?"), Err(ProtocolError::NotConnected)));
    let waited = started.elapsed();
    assert!(waited < Duration::from_millis(50), "waited {waited:?}");
}

#[test]
fn test_counters() {
    let (mut channel, _log) = scripted_channel(vec![line("OK"), Step::Silent]);

    channel.send("?").unwrap();
    let _ = channel.send("?");

    let (tx_bytes, rx_bytes, tx_commands, rx_replies) = channel.get_counters();
    assert_eq!(tx_bytes, 4);
    assert_eq!(rx_bytes, 4);
    assert_eq!(tx_commands, 2);
    assert_eq!(rx_replies, 1);
}
