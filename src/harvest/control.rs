use std::sync::Arc;

use tokio::sync::watch;

use super::store::ContactStore;

/// The `isRunning` flag of one run, shared between the loop, the UI and the interceptor.
///
/// `true` while running. [`RunControl::stop`] is idempotent and only observed at the loop's
/// suspension checkpoints.
#[derive(Clone, Debug)]
pub struct RunControl {
    tx: Arc<watch::Sender<bool>>,
}

impl RunControl {
    /// A fresh flag in the running position.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_running(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear the flag. Returns `true` only for the call that actually flipped it.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|running| std::mem::replace(running, false))
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves once the flag is cleared (immediately if it already is).
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        // Err means the sender is gone, which only happens when the run itself was dropped.
        let _ = rx.wait_for(|running| !*running).await;
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

/// What the response interceptor needs to write into the active run.
#[derive(Clone, Debug)]
pub struct RunFeed {
    pub store: Arc<ContactStore>,
    pub control: RunControl,
}

impl RunFeed {
    pub fn is_live(&self) -> bool {
        self.control.is_running()
    }
}
