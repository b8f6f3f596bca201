//! Background process execution and monitoring
//!
//! This crate launches an external command, drains its stdout and stderr
//! without ever blocking on a single read for longer than a bounded wait, and
//! notifies listeners as output arrives and when the process terminates.
//! Either output stream can be redirected to a file instead; its log is then
//! read back from that file.

#![warn(missing_docs)]

pub mod cancel;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod drain;
pub mod error;
pub mod event;
pub mod handle;
pub mod output;
pub mod pipe;
pub mod platform;
pub mod probe;
pub mod stdin;

pub use cancel::CancellationToken;
pub use command::{Command, CommandBuilder, CommandLine, ProcessSpec};
pub use config::PollConfig;
pub use dispatcher::{EventDispatcher, Listener, Trigger};
pub use drain::BoxedReader;
pub use error::{Error, Result};
pub use event::{EventKind, ProcessEvent, StreamOutput, TickPayload};
pub use handle::{LaunchOutcome, ProcessHandle, TickOutcome};
pub use output::OutputLog;
pub use pipe::{Pipe, Redirect};
pub use platform::Platform;
pub use probe::{ExitStatus, LOST_EXIT_CODE, ProbeStatus, StatusProbe};
pub use stdin::StdinHandle;
