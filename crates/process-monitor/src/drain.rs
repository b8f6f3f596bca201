//! Opportunistic draining of an output pipe
//!
//! Each tick a pipe gets one bounded wait for readability. Once something
//! arrives, everything that is immediately available is read in fixed-size
//! chunks; the read that would block ends the drain for this tick.

use async_io::Timer;
use futures_lite::future;
use futures_lite::io::{AsyncRead, AsyncReadExt};
use std::io;
use std::time::Duration;
use tracing::debug;

use crate::cancel::CancellationToken;

/// A boxed pipe read end
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Result of draining one pipe for one tick
#[derive(Debug)]
pub enum Drained {
    /// Non-blank output, as trimmed chunks in arrival order
    ///
    /// Chunks that are blank after trimming are omitted, so the group can be
    /// shorter than the number of reads.
    Chunks(Vec<String>),
    /// Nothing (or only whitespace) arrived before the wait ended
    Nothing,
    /// Waiting for the pipe failed; the pipe is retried next tick
    Failed(io::Error),
}

enum Wait {
    Read(io::Result<usize>),
    Elapsed,
}

/// Read end of one output pipe and its drain state
pub struct PipeReader {
    reader: BoxedReader,
    /// Bytes of a UTF-8 sequence split across a chunk boundary
    pending: Vec<u8>,
    eof: bool,
}

impl PipeReader {
    /// Wrap a pipe read end
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            eof: false,
        }
    }

    /// Whether the write end has been closed and everything was read
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Drain whatever the pipe has for this tick
    pub async fn drain(
        &mut self,
        readiness_timeout: Duration,
        chunk_size: usize,
        cancel: &CancellationToken,
    ) -> Drained {
        if self.eof {
            return Drained::Nothing;
        }

        let mut buf = vec![0u8; chunk_size.max(1)];
        let first = {
            let read = async { Wait::Read(self.reader.read(&mut buf).await) };
            let elapsed = async {
                Timer::after(readiness_timeout).await;
                Wait::Elapsed
            };
            let cancelled = async {
                cancel.cancelled().await;
                Wait::Elapsed
            };
            future::or(read, future::or(elapsed, cancelled)).await
        };

        let mut chunks = Vec::new();
        match first {
            Wait::Elapsed => return Drained::Nothing,
            Wait::Read(Err(e)) => return Drained::Failed(e),
            Wait::Read(Ok(0)) => self.finish(&mut chunks),
            Wait::Read(Ok(n)) => {
                self.push_chunk(&buf[..n], &mut chunks);
                loop {
                    match future::poll_once(self.reader.read(&mut buf)).await {
                        // Nothing more without blocking
                        None => break,
                        Some(Ok(0)) => {
                            self.finish(&mut chunks);
                            break;
                        }
                        Some(Ok(n)) => self.push_chunk(&buf[..n], &mut chunks),
                        Some(Err(e)) => {
                            debug!(error = %e, collected = chunks.len(), "partial read, keeping collected chunks");
                            break;
                        }
                    }
                }
            }
        }

        if chunks.concat().trim().is_empty() {
            Drained::Nothing
        } else {
            Drained::Chunks(chunks)
        }
    }

    fn push_chunk(&mut self, bytes: &[u8], chunks: &mut Vec<String>) {
        let text = self.decode(bytes);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }

    fn finish(&mut self, chunks: &mut Vec<String>) {
        self.eof = true;
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let text = String::from_utf8_lossy(&rest);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        }
    }

    /// Decode `bytes`, holding back an incomplete trailing UTF-8 sequence
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let tail = self.pending.split_off(complete);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader")
            .field("pending", &self.pending.len())
            .field("eof", &self.eof)
            .finish()
    }
}
