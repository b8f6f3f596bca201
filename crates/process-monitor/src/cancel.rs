//! Cooperative cancellation of the poll loop

use async_channel::{Receiver, Sender};

/// A clonable flag that stops a running poll loop
///
/// Cancelling closes an internal channel, which wakes every task currently
/// awaiting [`CancellationToken::cancelled`].
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(1);
        Self { sender, receiver }
    }

    /// Signal cancellation; idempotent
    pub fn cancel(&self) {
        self.sender.close();
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        // Nothing is ever sent, so recv only returns once the channel closes.
        let _ = self.receiver.recv().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
