//! Standard stream slots and where they point

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One of the three standard stream slots of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipe {
    /// Slot 0, always a pipe the parent writes into
    Stdin,
    /// Slot 1
    Stdout,
    /// Slot 2
    Stderr,
}

impl Pipe {
    /// The two slots that can be drained or redirected
    pub const OUTPUTS: [Pipe; 2] = [Pipe::Stdout, Pipe::Stderr];

    /// The OS descriptor index of this slot
    pub const fn index(self) -> u8 {
        match self {
            Pipe::Stdin => 0,
            Pipe::Stdout => 1,
            Pipe::Stderr => 2,
        }
    }

    /// Look up a slot by its descriptor index
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Pipe::Stdin),
            1 => Some(Pipe::Stdout),
            2 => Some(Pipe::Stderr),
            _ => None,
        }
    }

    /// Returns true for stdout and stderr
    pub const fn is_output(self) -> bool {
        !matches!(self, Pipe::Stdin)
    }

    /// Lowercase name used in logs and serialized payloads
    pub const fn as_str(self) -> &'static str {
        match self {
            Pipe::Stdin => "stdin",
            Pipe::Stdout => "stdout",
            Pipe::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an output slot is connected when the process is spawned
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum Redirect {
    /// A pipe read back by the poll loop
    #[default]
    Pipe,
    /// A file the child writes into directly
    File {
        /// Target path, created if missing
        path: PathBuf,
        /// Append to existing contents instead of truncating
        append: bool,
    },
}

impl Redirect {
    /// Create a file redirect
    pub fn file(path: impl Into<PathBuf>, append: bool) -> Self {
        Redirect::File {
            path: path.into(),
            append,
        }
    }

    /// Returns true if this slot is a pipe
    pub fn is_pipe(&self) -> bool {
        matches!(self, Redirect::Pipe)
    }

    /// The file path for file redirects
    pub fn path(&self) -> Option<&Path> {
        match self {
            Redirect::Pipe => None,
            Redirect::File { path, .. } => Some(path),
        }
    }
}
