//! Accumulated output and exit status, shared with readers on other threads

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pipe::Pipe;
use crate::probe::ExitStatus;

#[derive(Debug, Default)]
struct LogState {
    /// One entry per tick that produced output, per stream
    groups: BTreeMap<Pipe, Vec<Vec<String>>>,
    files: BTreeMap<Pipe, PathBuf>,
    exit: Option<ExitStatus>,
}

/// Output log of one process
///
/// Clones share the same state. Only the poll loop appends to it; any clone
/// can take snapshots at any time, including from another thread while the
/// process is still running.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    state: Arc<RwLock<LogState>>,
}

impl OutputLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, LogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Text written to `pipe` so far
    ///
    /// For a stream redirected to an existing file this is the file's content.
    /// Otherwise all buffered chunks joined by `separator`, trimmed; empty
    /// when nothing was buffered.
    pub fn text(&self, pipe: Pipe, separator: &str) -> String {
        if let Some(path) = self.log_file(pipe) {
            if path.exists() {
                match std::fs::read(&path) {
                    Ok(bytes) => return String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to read redirect target")
                    }
                }
            }
        }

        let state = self.read();
        let Some(groups) = state.groups.get(&pipe) else {
            return String::new();
        };
        groups
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(separator)
            .trim()
            .to_string()
    }

    /// Snapshot of the chunk groups buffered for `pipe`
    pub fn groups(&self, pipe: Pipe) -> Vec<Vec<String>> {
        self.read().groups.get(&pipe).cloned().unwrap_or_default()
    }

    /// The file `pipe` is redirected to, if any
    pub fn log_file(&self, pipe: Pipe) -> Option<PathBuf> {
        self.read().files.get(&pipe).cloned()
    }

    /// Exit status once the process has terminated
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.read().exit
    }

    /// Exit code once the process has terminated; `None` while running
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status().map(|status| status.exit_code())
    }

    pub(crate) fn commit(&self, pipe: Pipe, group: Vec<String>) {
        self.write().groups.entry(pipe).or_default().push(group);
    }

    pub(crate) fn set_log_file(&self, pipe: Pipe, path: &Path) {
        self.write().files.insert(pipe, path.to_path_buf());
    }

    /// Record the exit status; returns false if one was already recorded
    pub(crate) fn record_exit(&self, status: ExitStatus) -> bool {
        let mut state = self.write();
        if state.exit.is_some() {
            return false;
        }
        state.exit = Some(status);
        true
    }
}
