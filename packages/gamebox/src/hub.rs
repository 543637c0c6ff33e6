//! Broadcast Hub
//!
//! Fans session snapshots out to every connected WebSocket. Delivery is
//! unfiltered: each socket receives every session's updates and the client
//! picks the ones for its own game by `game_id`.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::Session;

/// Snapshot pushed to subscribers. Shared so a fan-out never clones the session.
pub type SessionSnapshot = Arc<Session>;

#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<SessionSnapshot>,
    published: Arc<AtomicU64>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push the current state of a session to every subscriber.
    /// Returns the number of subscribers that will see it.
    pub fn publish(&self, session: &Session) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine: nobody is watching yet.
        self.tx.send(Arc::new(session.clone())).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// Periodic re-push of one session's state.
///
/// Each tick calls `beat`, which pushes the session and returns false once the
/// session is gone. The task stops then, or when its token is cancelled.
pub(crate) struct Heartbeat {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Heartbeat {
    pub fn spawn<F, Fut>(game_id: String, period: Duration, beat: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; creation already pushed.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel_task.cancelled() => {
                        debug!(game_id = %game_id, "Heartbeat cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if !beat().await {
                            debug!(game_id = %game_id, "Session gone, stopping heartbeat");
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel, task }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}
