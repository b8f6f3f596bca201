//! Writing to a monitored process's stdin

use futures_lite::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Handle for writing to a process's stdin
pub struct StdinHandle {
    stdin: Option<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl StdinHandle {
    /// Wrap a writable stdin pipe
    pub fn new(stdin: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            stdin: Some(Box::new(stdin)),
        }
    }

    /// A handle that was closed from the start
    pub fn closed() -> Self {
        Self { stdin: None }
    }

    /// Write a line to stdin (adds newline)
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        if let Some(stdin) = &mut self.stdin {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    /// Write raw bytes to stdin
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Some(stdin) = &mut self.stdin {
            stdin.write_all(data).await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    /// Whether the pipe is still open
    pub fn is_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Close stdin by dropping the writer, signalling EOF to the child
    pub fn close(&mut self) {
        self.stdin.take();
    }
}

impl std::fmt::Debug for StdinHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinHandle")
            .field("open", &self.is_open())
            .finish()
    }
}
