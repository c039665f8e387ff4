#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use coboltlink_core::protocol::{
    ChannelTiming, CommandChannel, PortInfo, PortProvider, ProtocolError, Transport,
};
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness; `RUST_LOG` selects the level
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// What the scripted device does with the next write
pub enum Step {
    /// Answer with these bytes
    Reply(Vec<u8>),
    /// Accept the write, never answer
    Silent,
    /// Refuse the write
    FailWrite,
}

/// Answer with a line terminated by `\r\n`
pub fn line(text: &str) -> Step {
    Step::Reply(format!("{text}\r\n").into_bytes())
}

/// Everything the scripted device saw
#[derive(Debug, Default)]
pub struct Log {
    /// Successful writes with their start time
    pub writes: Vec<(Instant, Vec<u8>)>,
    /// When each read attempt returned
    pub read_ends: Vec<Instant>,
    /// When each refused write attempt happened
    pub failed_writes: Vec<Instant>,
    /// Whether close was called
    pub closed: bool,
}

impl Log {
    /// Written commands as text, terminators included
    pub fn written(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }
}

type Script = Arc<Mutex<VecDeque<Step>>>;

/// Transport answering from a fixed script
pub struct ScriptedTransport {
    steps: Script,
    answer: Option<Vec<u8>>,
    log: Arc<Mutex<Log>>,
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Silent);
        let mut log = self.log.lock().unwrap();
        match step {
            Step::FailWrite => {
                log.failed_writes.push(Instant::now());
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"))
            }
            Step::Silent => {
                log.writes.push((Instant::now(), data.to_vec()));
                self.answer = None;
                Ok(())
            }
            Step::Reply(bytes) => {
                log.writes.push((Instant::now(), data.to_vec()));
                self.answer = Some(bytes);
                Ok(())
            }
        }
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        let bytes = match self.answer.take() {
            Some(bytes) => bytes,
            None => {
                std::thread::sleep(timeout);
                Vec::new()
            }
        };
        self.log.lock().unwrap().read_ends.push(Instant::now());
        Ok(bytes)
    }

    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Scripted transport plus a handle on its log
pub fn scripted(steps: Vec<Step>) -> (Box<dyn Transport>, Arc<Mutex<Log>>) {
    init_tracing();
    let log = Arc::new(Mutex::new(Log::default()));
    let transport = ScriptedTransport {
        steps: Arc::new(Mutex::new(steps.into())),
        answer: None,
        log: log.clone(),
    };
    (Box::new(transport), log)
}

/// Short reply timeout so silent exchanges finish quickly
pub fn test_timing() -> ChannelTiming {
    init_tracing();
    ChannelTiming::with_timeout(Duration::from_millis(30))
}

/// Command channel over a scripted transport
pub fn scripted_channel(steps: Vec<Step>) -> (CommandChannel, Arc<Mutex<Log>>) {
    let (transport, log) = scripted(steps);
    (
        CommandChannel::new(transport, "SCRIPT", 115200, test_timing()),
        log,
    )
}

/// A single port whose every handle follows one shared script
pub struct ScriptedPort {
    name: String,
    steps: Script,
    log: Arc<Mutex<Log>>,
}

impl ScriptedPort {
    pub fn new(name: &str, steps: Vec<Step>) -> (Self, Arc<Mutex<Log>>) {
        init_tracing();
        let log = Arc::new(Mutex::new(Log::default()));
        let port = Self {
            name: name.to_string(),
            steps: Arc::new(Mutex::new(steps.into())),
            log: log.clone(),
        };
        (port, log)
    }
}

impl PortProvider for ScriptedPort {
    fn list_ports(&self) -> Vec<PortInfo> {
        vec![PortInfo::named(self.name.as_str())]
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        _open_timeout: Option<Duration>,
    ) -> Result<Box<dyn Transport>, ProtocolError> {
        if port != self.name {
            return Err(ProtocolError::PortUnavailable {
                port: port.to_string(),
                reason: "No such file or directory".into(),
            });
        }
        Ok(Box::new(ScriptedTransport {
            steps: self.steps.clone(),
            answer: None,
            log: self.log.clone(),
        }))
    }
}
