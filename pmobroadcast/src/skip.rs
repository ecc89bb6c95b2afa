//! Signal de saut partagé par tous les workers
//!
//! Level-triggered: once published, the flag stays up until the station
//! resets it between two tracks.

use std::sync::Arc;
use tokio::sync::watch;

/// Publishing side of the skip flag
#[derive(Debug, Clone)]
pub struct SkipChannel {
    tx: Arc<watch::Sender<bool>>,
}

impl SkipChannel {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Asks every subscribed worker to abandon the current track
    pub fn publish(&self) {
        self.tx.send_replace(true);
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> SkipSignal {
        SkipSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SkipChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side held by one worker
#[derive(Debug, Clone)]
pub struct SkipSignal {
    rx: watch::Receiver<bool>,
}

impl SkipSignal {
    /// Non-blocking poll
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is up; pending forever if the channel is gone
    pub async fn raised(&mut self) {
        let closed = self.rx.wait_for(|set| *set).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fan_out_and_reset() {
        let channel = SkipChannel::new();
        let a = channel.subscribe();
        let b = channel.subscribe();
        assert!(!a.is_set());

        channel.publish();
        assert!(a.is_set() && b.is_set());
        // Reste levé tant qu'il n'est pas réinitialisé
        assert!(a.is_set());

        channel.reset();
        assert!(!a.is_set() && !b.is_set());
    }

    #[tokio::test]
    async fn test_raised_wakes_waiter() {
        let channel = SkipChannel::new();
        let mut signal = channel.subscribe();
        let waiter = tokio::spawn(async move { signal.raised().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.publish();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
