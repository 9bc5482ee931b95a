//! Debounced change notification.
//!
//! Consumers only need "something changed, re-read `all()`", so delivery
//! carries no payload. A generation counter plus a sleeping task coalesce
//! bursts of mutations (an initial directory scan, a batched drain) into a
//! single tick after a quiet period.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<()>,
    generation: Arc<AtomicU64>,
    delay: Duration,
}

impl ChangeNotifier {
    pub fn new(delay: Duration) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Records a mutation. The notification fires once the quiet period
    /// elapses without further marks; earlier pending marks are superseded.
    /// Must be called from within a tokio runtime.
    pub fn mark(&self) {
        let current = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == current {
                // Send fails only when nobody subscribed; that is fine.
                let _ = tx.send(());
            }
        });
    }
}
