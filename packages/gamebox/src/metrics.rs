//! Server metrics for observability
//!
//! Provides runtime metrics for monitoring server health and game activity.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently active WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Session metrics
    /// Sessions created since server start
    pub sessions_created: AtomicU64,
    /// Sessions closed because their last player left
    pub sessions_deleted: AtomicU64,

    // Game metrics
    pub rounds_started: AtomicU64,
    /// Player actions accepted (reset included)
    pub actions_applied: AtomicU64,

    // Message metrics
    /// WebSocket messages received from clients
    pub messages_received: AtomicU64,
    /// WebSocket messages sent to clients
    pub messages_sent: AtomicU64,
    /// Snapshots skipped by lagging sockets
    pub messages_dropped: AtomicU64,

    /// WebSocket errors
    pub websocket_errors: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Session tracking
    pub fn session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_deleted(&self) {
        self.sessions_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn round_started(&self) {
        self.rounds_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn action_applied(&self) {
        self.actions_applied.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_dropped(&self, count: u64) {
        self.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics. `published` is the hub's count of
    /// snapshots pushed (state changes plus heartbeats).
    pub fn snapshot(&self, published: u64) -> MetricsSnapshot {
        let created = self.sessions_created.load(Ordering::Relaxed);
        let deleted = self.sessions_deleted.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            sessions: SessionMetrics {
                active: created.saturating_sub(deleted),
                created,
                deleted,
            },
            games: GameMetrics {
                rounds_started: self.rounds_started.load(Ordering::Relaxed),
                actions_applied: self.actions_applied.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                published,
                received: self.messages_received.load(Ordering::Relaxed),
                sent: self.messages_sent.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                websocket: self.websocket_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub sessions: SessionMetrics,
    pub games: GameMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub active: u64,
    pub created: u64,
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetrics {
    pub rounds_started: u64,
    pub actions_applied: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub published: u64,
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub websocket: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub sessions: u64,
    pub connections: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracking() {
        let metrics = ServerMetrics::new();

        metrics.connection_opened();
        metrics.connection_opened();
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.total_connections.load(Ordering::Relaxed), 2);

        metrics.connection_closed();
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_connections.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_session_tracking() {
        let metrics = ServerMetrics::new();

        metrics.session_created();
        metrics.session_created();
        metrics.session_deleted();

        let snapshot = metrics.snapshot(0);
        assert_eq!(snapshot.sessions.created, 2);
        assert_eq!(snapshot.sessions.deleted, 1);
        assert_eq!(snapshot.sessions.active, 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = ServerMetrics::new();
        metrics.connection_opened();
        metrics.round_started();
        metrics.action_applied();
        metrics.action_applied();
        metrics.message_sent();
        metrics.messages_dropped(3);

        let snapshot = metrics.snapshot(7);
        assert_eq!(snapshot.connections.active, 1);
        assert_eq!(snapshot.games.rounds_started, 1);
        assert_eq!(snapshot.games.actions_applied, 2);
        assert_eq!(snapshot.messages.published, 7);
        assert_eq!(snapshot.messages.sent, 1);
        assert_eq!(snapshot.messages.dropped, 3);
    }
}
