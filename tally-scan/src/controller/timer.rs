//! Cancellable single-shot timers
//!
//! A timer is a spawned task that sleeps and then posts one message back to
//! the controller. Cancelling is idempotent: aborting a timer that already
//! fired or was already cancelled does nothing.
//!
//! Cancellation alone cannot retract a message that was already posted, so
//! each timer carries a token and the receiver ignores messages whose token
//! no longer matches.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct SingleShot {
    token: u64,
    handle: JoinHandle<()>,
}

impl SingleShot {
    /// Post `message` on `tx` after `delay`
    pub fn schedule<T>(token: u64, delay: Duration, tx: mpsc::UnboundedSender<T>, message: T) -> Self
    where
        T: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the controller shut down
            let _ = tx.send(message);
        });
        Self { token, handle }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}
