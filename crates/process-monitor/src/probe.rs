//! Process status queries

use serde::{Deserialize, Serialize};
use std::io;

/// Exit code recorded when the process could no longer be queried
pub const LOST_EXIT_CODE: i32 = -1;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// A normal exit with `code`
    pub const fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// The status recorded for a process that vanished between ticks
    pub const fn lost() -> Self {
        Self::from_code(LOST_EXIT_CODE)
    }

    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// A single integer exit code; signal deaths map to `128 + signal`
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => LOST_EXIT_CODE,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
            #[cfg(not(unix))]
            signal: None,
        }
    }
}

/// What a status query observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Still alive
    Running,
    /// Exited with this status
    Exited(ExitStatus),
}

/// Non-blocking liveness query for a monitored process
///
/// An error means the process can no longer be queried at all; the poll loop
/// treats that as termination.
pub trait StatusProbe: Send {
    /// Check whether the process is still running without waiting for it
    fn probe(&mut self) -> io::Result<ProbeStatus>;

    /// The OS process id, if there is one
    fn pid(&self) -> Option<u32> {
        None
    }

    /// Forcefully stop the process
    fn kill(&mut self) -> io::Result<()>;
}

impl StatusProbe for async_process::Child {
    fn probe(&mut self) -> io::Result<ProbeStatus> {
        Ok(match self.try_status()? {
            Some(status) => ProbeStatus::Exited(status.into()),
            None => ProbeStatus::Running,
        })
    }

    fn pid(&self) -> Option<u32> {
        Some(self.id())
    }

    fn kill(&mut self) -> io::Result<()> {
        async_process::Child::kill(self)
    }
}
