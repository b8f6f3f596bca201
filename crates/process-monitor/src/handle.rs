//! Launching a process and driving its poll loop
//!
//! A [`ProcessHandle`] goes through three phases: configured (spec stored,
//! listeners and redirects may still change), active (process spawned or
//! attached, ticks allowed) and exited (exit status recorded, no more ticks).
//!
//! Every tick probes the process status, drains each output pipe once and
//! dispatches exactly one event: `running` while the process is alive, or the
//! single `finished` event once it has exited.

use async_io::Timer;
use async_process::Stdio;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use crate::cancel::CancellationToken;
use crate::command::ProcessSpec;
use crate::config::PollConfig;
use crate::dispatcher::{EventDispatcher, Listener, Trigger};
use crate::drain::{BoxedReader, Drained, PipeReader};
use crate::error::{Error, Result};
use crate::event::{EventKind, StreamOutput, TickPayload};
use crate::output::OutputLog;
use crate::pipe::{Pipe, Redirect};
use crate::probe::{ExitStatus, ProbeStatus, StatusProbe};
use crate::stdin::StdinHandle;

/// What [`ProcessHandle::launch`] and [`ProcessHandle::wait`] report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Spawned without waiting; drive it with `tick` or `wait`
    InProgress,
    /// The process exited with this code
    Exited(i32),
    /// The loop was cancelled and the child left running
    Cancelled,
}

/// What a single tick observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The process is still alive
    Running,
    /// The process has exited
    Exited(ExitStatus),
}

struct Session {
    probe: Box<dyn StatusProbe>,
    pipes: BTreeMap<Pipe, PipeReader>,
    stdin: StdinHandle,
    started: bool,
    killed: bool,
}

enum Phase {
    Configured(ProcessSpec),
    Active(Session),
    Exited,
}

/// A monitored background process
///
/// ```no_run
/// use process_monitor::{Pipe, ProcessHandle, ProcessSpec, Trigger};
///
/// # fn main() -> process_monitor::Result<()> {
/// let mut handle = ProcessHandle::new(ProcessSpec::shell("echo hello"))?;
/// handle.on(Trigger::All, |event: &process_monitor::ProcessEvent| {
///     println!("{}: {:?}", event.kind, event.output(Pipe::Stdout));
/// });
/// futures_lite::future::block_on(handle.launch(true))?;
/// assert_eq!(handle.stdout_log("\n"), "hello");
/// # Ok(())
/// # }
/// ```
pub struct ProcessHandle {
    phase: Phase,
    config: PollConfig,
    dispatcher: EventDispatcher,
    output: OutputLog,
    cancel: CancellationToken,
    pid: Option<u32>,
}

impl ProcessHandle {
    /// Create a handle with the default poll configuration
    pub fn new(spec: ProcessSpec) -> Result<Self> {
        Self::with_config(spec, PollConfig::default())
    }

    /// Create a handle with a custom poll configuration
    ///
    /// Only the structure of `spec` is checked; redirect targets are opened
    /// at launch.
    pub fn with_config(spec: ProcessSpec, config: PollConfig) -> Result<Self> {
        spec.validate()?;
        config.validate()?;

        let output = OutputLog::new();
        for pipe in Pipe::OUTPUTS {
            if let Some(path) = spec.redirect_for(pipe).path() {
                output.set_log_file(pipe, path);
            }
        }

        Ok(Self {
            phase: Phase::Configured(spec),
            config,
            dispatcher: EventDispatcher::new(),
            output,
            cancel: CancellationToken::new(),
            pid: None,
        })
    }

    /// Monitor a process that was started elsewhere
    ///
    /// The handle starts out active: `tick` and `wait` can be used right away.
    pub fn attach<P, I>(probe: P, pipes: I, config: PollConfig) -> Result<Self>
    where
        P: StatusProbe + 'static,
        I: IntoIterator<Item = (Pipe, BoxedReader)>,
    {
        config.validate()?;

        let mut readers = BTreeMap::new();
        for (pipe, reader) in pipes {
            if !pipe.is_output() {
                return Err(Error::invalid_spec("stdin cannot be drained"));
            }
            readers.insert(pipe, PipeReader::new(reader));
        }

        let pid = probe.pid();
        Ok(Self {
            phase: Phase::Active(Session {
                probe: Box::new(probe),
                pipes: readers,
                stdin: StdinHandle::closed(),
                started: false,
                killed: false,
            }),
            config,
            dispatcher: EventDispatcher::new(),
            output: OutputLog::new(),
            cancel: CancellationToken::new(),
            pid,
        })
    }

    /// Register the listener for `trigger`, replacing any previous one
    pub fn on<L: Listener + 'static>(&mut self, trigger: Trigger, listener: L) -> &mut Self {
        self.dispatcher.register(trigger, listener);
        self
    }

    /// Register a listener by trigger name (`start`, `running`, `finished`, `all`)
    pub fn on_name<L: Listener + 'static>(&mut self, name: &str, listener: L) -> Result<&mut Self> {
        let trigger = name.parse()?;
        Ok(self.on(trigger, listener))
    }

    /// Send an output stream to a file instead of a pipe
    ///
    /// Only allowed before launch. The stream is never drained afterwards and
    /// its log is read back from the file.
    pub fn redirect_to_file(
        &mut self,
        pipe: Pipe,
        path: impl Into<PathBuf>,
        append: bool,
    ) -> Result<&mut Self> {
        let Phase::Configured(spec) = &mut self.phase else {
            return Err(Error::AlreadyLaunched);
        };
        if !pipe.is_output() {
            return Err(Error::invalid_spec("stdin cannot be redirected"));
        }
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_spec(format!("{pipe} redirect path is empty")));
        }

        self.output.set_log_file(pipe, &path);
        spec.set_redirect(pipe, Redirect::File { path, append });
        Ok(self)
    }

    /// Spawn the process
    ///
    /// A spawn failure is returned immediately; no listener is called and
    /// the handle stays configured. With `wait` the `start` event fires and
    /// the poll loop runs until the process exits (or the loop is cancelled);
    /// without it the caller drives the loop through [`tick`](Self::tick) or
    /// [`wait`](Self::wait).
    pub async fn launch(&mut self, wait: bool) -> Result<LaunchOutcome> {
        let Phase::Configured(spec) = &self.phase else {
            return Err(Error::AlreadyLaunched);
        };

        let (session, pid) = spawn(spec, &self.config)?;
        info!(
            pid,
            command = %spec.command().display(),
            drained = ?session.pipes.keys().collect::<Vec<_>>(),
            "launched process"
        );
        self.pid = Some(pid);
        self.phase = Phase::Active(session);

        if !wait {
            return Ok(LaunchOutcome::InProgress);
        }
        self.wait().await
    }

    /// Run the poll loop until the process exits or the loop is cancelled
    pub async fn wait(&mut self) -> Result<LaunchOutcome> {
        loop {
            if self.cancel.is_cancelled() && !self.kill_for_cancel() {
                info!(pid = ?self.pid, "poll loop cancelled, leaving process running");
                return Ok(LaunchOutcome::Cancelled);
            }

            match self.tick().await? {
                TickOutcome::Exited(status) => return Ok(LaunchOutcome::Exited(status.exit_code())),
                TickOutcome::Running if self.cancel.is_cancelled() => {
                    // Killed but not reaped yet; the drains no longer wait.
                    Timer::after(self.config.idle_interval()).await;
                }
                TickOutcome::Running => {}
            }
        }
    }

    /// Kill the child once after cancellation; false means stop polling
    fn kill_for_cancel(&mut self) -> bool {
        if !self.config.kill_on_cancel {
            return false;
        }
        let Phase::Active(session) = &mut self.phase else {
            return true;
        };
        if session.killed {
            return true;
        }
        session.killed = true;
        match session.probe.kill() {
            Ok(()) => {
                info!(pid = ?self.pid, "poll loop cancelled, killed process");
                true
            }
            Err(e) => {
                warn!(pid = ?self.pid, error = %e, "failed to kill process on cancel");
                false
            }
        }
    }

    /// Run one iteration of the poll loop
    ///
    /// The first tick fires `start`. After the process has exited this only
    /// returns the recorded status and dispatches nothing.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let Self {
            phase,
            config,
            dispatcher,
            output,
            cancel,
            pid,
        } = self;

        let session = match phase {
            Phase::Configured(_) => return Err(Error::NotLaunched),
            Phase::Exited => {
                return Ok(TickOutcome::Exited(
                    output.exit_status().unwrap_or_else(ExitStatus::lost),
                ));
            }
            Phase::Active(session) => session,
        };

        if !session.started {
            session.started = true;
            dispatcher.dispatch(EventKind::Start, None);
        }

        let status = match session.probe.probe() {
            Ok(status) => status,
            Err(e) => {
                warn!(pid = ?pid, error = %e, "process can no longer be queried, treating it as exited");
                ProbeStatus::Exited(ExitStatus::lost())
            }
        };

        // Neither EOF pipes nor failing ones make the drain wait
        let mut idle = session.pipes.values().all(PipeReader::is_eof);
        let mut payload = TickPayload::default();
        for (pipe, reader) in session.pipes.iter_mut() {
            match reader
                .drain(config.readiness_timeout(), config.chunk_size, cancel)
                .await
            {
                Drained::Chunks(group) => {
                    trace!(%pipe, chunks = group.len(), "drained output");
                    output.commit(*pipe, group.clone());
                    payload.insert(*pipe, StreamOutput::from_group(group));
                }
                Drained::Nothing => {}
                Drained::Failed(e) => {
                    warn!(%pipe, error = %e, "waiting for pipe failed, skipping it this tick");
                    idle = true;
                }
            }
        }

        match status {
            ProbeStatus::Running => {
                dispatcher.dispatch(EventKind::Running, Some(payload));
                if idle {
                    Timer::after(config.idle_interval()).await;
                }
                Ok(TickOutcome::Running)
            }
            ProbeStatus::Exited(status) => {
                output.record_exit(status);
                *phase = Phase::Exited;
                info!(pid = ?pid, exit_code = status.exit_code(), "process finished");
                dispatcher.dispatch(EventKind::Finished, Some(payload));
                Ok(TickOutcome::Exited(status))
            }
        }
    }

    /// Output of `pipe` so far, chunks joined by `separator`
    ///
    /// Redirected streams are read from their file. Never fails; returns
    /// whatever has accumulated, possibly nothing.
    pub fn log(&self, pipe: Pipe, separator: &str) -> String {
        self.output.text(pipe, separator)
    }

    /// Output of stdout so far
    pub fn stdout_log(&self, separator: &str) -> String {
        self.log(Pipe::Stdout, separator)
    }

    /// Output of stderr so far
    pub fn stderr_log(&self, separator: &str) -> String {
        self.log(Pipe::Stderr, separator)
    }

    /// Exit code, `None` until the process has exited
    pub fn exit_code(&self) -> Option<i32> {
        self.output.exit_code()
    }

    /// Full exit status, `None` until the process has exited
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.output.exit_status()
    }

    /// A shared view of the output log, usable from other threads
    pub fn output_log(&self) -> OutputLog {
        self.output.clone()
    }

    /// A token that stops [`wait`](Self::wait) when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The OS process id once launched
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The poll configuration
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Whether the process is launched and has not been seen exiting
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Whether the terminal state has been reached
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Exited)
    }

    /// The stdin pipe of a running process
    pub fn stdin_mut(&mut self) -> Option<&mut StdinHandle> {
        match &mut self.phase {
            Phase::Active(session) => Some(&mut session.stdin),
            _ => None,
        }
    }

    /// Close stdin so the child sees end of input
    pub fn close_stdin(&mut self) {
        if let Some(stdin) = self.stdin_mut() {
            stdin.close();
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Configured(_) => "configured",
            Phase::Active(_) => "active",
            Phase::Exited => "exited",
        };
        f.debug_struct("ProcessHandle")
            .field("phase", &phase)
            .field("pid", &self.pid)
            .field("dispatcher", &self.dispatcher)
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

fn spawn(spec: &ProcessSpec, config: &PollConfig) -> Result<(Session, u32)> {
    let platform = spec.get_platform();
    let mut cmd = spec.command().prepare(platform)?;

    cmd.stdin(Stdio::piped());
    cmd.stdout(stdio_for(spec, Pipe::Stdout)?);
    cmd.stderr(stdio_for(spec, Pipe::Stderr)?);
    cmd.kill_on_drop(config.kill_on_drop);

    let mut child = cmd.spawn().map_err(|e| {
        debug!(error = %e, command = %spec.command().display(), "spawn failed");
        if e.kind() == io::ErrorKind::NotFound {
            Error::CommandNotFound {
                command: spec.command().program(platform),
            }
        } else {
            Error::spawn_failed(format!("Failed to spawn {}: {}", spec.command().display(), e))
        }
    })?;

    let mut pipes = BTreeMap::new();
    if let Some(stdout) = child.stdout.take() {
        pipes.insert(Pipe::Stdout, PipeReader::new(Box::new(stdout) as BoxedReader));
    }
    if let Some(stderr) = child.stderr.take() {
        pipes.insert(Pipe::Stderr, PipeReader::new(Box::new(stderr) as BoxedReader));
    }
    let stdin = child
        .stdin
        .take()
        .map(StdinHandle::new)
        .unwrap_or_else(StdinHandle::closed);

    let pid = child.id();
    Ok((
        Session {
            probe: Box::new(child),
            pipes,
            stdin,
            started: false,
            killed: false,
        },
        pid,
    ))
}

/// Stdio for an output slot: its file, a pipe if drained, else the null device
fn stdio_for(spec: &ProcessSpec, pipe: Pipe) -> Result<Stdio> {
    match spec.redirect_for(pipe) {
        Redirect::File { path, append } => Ok(Stdio::from(open_redirect(path, *append)?)),
        Redirect::Pipe if spec.is_drained(pipe) => Ok(Stdio::piped()),
        Redirect::Pipe => Ok(Stdio::null()),
    }
}

fn open_redirect(path: &Path, append: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path).map_err(|source| Error::RedirectFailed {
        path: path.to_path_buf(),
        source,
    })
}
