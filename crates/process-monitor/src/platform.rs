//! Host platform as far as spawning is concerned

use serde::{Deserialize, Serialize};

/// The platform a process is spawned on
///
/// The only decision that depends on it is whether a shell line is handed to
/// the system shell or executed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux
    Linux,
    /// macOS
    MacOs,
    /// Windows
    Windows,
    /// Any other Unix-like system
    Other,
}

impl Platform {
    /// The platform this binary was compiled for
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    /// Whether shell lines are executed directly instead of through the shell
    pub const fn bypasses_shell(self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
