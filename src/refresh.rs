//! Refresh signal: tells the view that owns a fetch to fetch again.
//!
//! The signal is a generation counter. Mutations bump it; a listener sees at
//! most one change per look, however many bumps happened in between.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct RefreshSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Record that server state changed.
    pub fn bump(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    /// A listener that has already seen the current generation.
    pub fn subscribe(&self) -> RefreshListener {
        RefreshListener {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug)]
pub struct RefreshListener {
    rx: watch::Receiver<u64>,
}

impl RefreshListener {
    /// True if a bump happened since this listener last looked. Marks it seen.
    pub fn take_change(&mut self) -> bool {
        match self.rx.has_changed() {
            Ok(true) => {
                let _ = self.rx.borrow_and_update();
                true
            }
            _ => false,
        }
    }

    /// Wait for the next unseen bump. Returns false once every signal handle is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    pub fn seen_generation(&self) -> u64 {
        *self.rx.borrow()
    }
}
