//! Shared helpers: a scripted fake process and event recording

#![allow(dead_code)]

use futures::{StreamExt, TryStreamExt};
use process_monitor::{
    BoxedReader, EventKind, ExitStatus, Listener, PollConfig, ProbeStatus, ProcessEvent,
    StatusProbe,
};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::sync::{Arc, Mutex};

/// A process whose liveness is controlled by the test
#[derive(Clone, Default)]
pub struct FakeProcess {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    probes: usize,
    exit: Option<ExitStatus>,
    vanished: bool,
    killed: bool,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next probe report an exit with `code`
    pub fn exit(&self, code: i32) {
        self.state.lock().unwrap().exit = Some(ExitStatus::from_code(code));
    }

    /// Make the next probe fail as if the process had been reaped elsewhere
    pub fn vanish(&self) {
        self.state.lock().unwrap().vanished = true;
    }

    pub fn probes(&self) -> usize {
        self.state.lock().unwrap().probes
    }

    pub fn was_killed(&self) -> bool {
        self.state.lock().unwrap().killed
    }
}

impl StatusProbe for FakeProcess {
    fn probe(&mut self) -> io::Result<ProbeStatus> {
        let mut state = self.state.lock().unwrap();
        state.probes += 1;
        if state.vanished {
            return Err(io::Error::other("no such process"));
        }
        Ok(match state.exit {
            Some(status) => ProbeStatus::Exited(status),
            None => ProbeStatus::Running,
        })
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn kill(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.killed = true;
        state.exit = Some(ExitStatus {
            code: None,
            signal: Some(9),
        });
        Ok(())
    }
}

/// A pipe fed by the test; closing the sender is end of stream
pub fn fake_pipe() -> (async_channel::Sender<Vec<u8>>, BoxedReader) {
    let (tx, rx) = async_channel::unbounded::<Vec<u8>>();
    let reader = Box::pin(rx.map(Ok::<_, io::Error>)).into_async_read();
    (tx, Box::new(reader))
}

/// A pipe whose every read fails
pub struct BrokenPipe;

impl futures::io::AsyncRead for BrokenPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::other("input/output error")))
    }
}

pub fn broken_pipe() -> BoxedReader {
    Box::new(BrokenPipe)
}

/// A pipe that yields `data` once and then fails
pub fn failing_after(data: &[u8]) -> BoxedReader {
    let reads = futures::stream::iter(vec![Ok(data.to_vec()), Err(io::Error::other("pipe broke"))]);
    Box::new(reads.into_async_read())
}

/// Short waits so loop tests run fast
pub fn fast_config() -> PollConfig {
    PollConfig {
        readiness_timeout_ms: 20,
        idle_interval_ms: 5,
        ..PollConfig::default()
    }
}

pub type EventLog = Arc<Mutex<Vec<ProcessEvent>>>;

/// A listener that stores every event it receives
pub fn recorder() -> (EventLog, impl Listener + 'static) {
    let seen: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |event: &ProcessEvent| {
        sink.lock().unwrap().push(event.clone())
    })
}

pub fn kinds(log: &EventLog) -> Vec<EventKind> {
    log.lock().unwrap().iter().map(|e| e.kind).collect()
}

pub fn count(log: &EventLog, kind: EventKind) -> usize {
    kinds(log).into_iter().filter(|k| *k == kind).count()
}
