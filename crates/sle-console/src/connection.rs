//! Receive-only websocket connection to the proxy.
//!
//! The socket lives on its own task and reports to its owner over an mpsc
//! channel. Nothing is ever written to the server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// What the connection task reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionMessage {
    /// The socket opened.
    Opened,
    /// The socket closed.
    Closed {
        /// Why it closed.
        reason: String,
    },
    /// A JSON frame arrived.
    Received(Value),
}

/// Reconnect policy with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Reconnect attempts before giving up (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given attempt (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Whether reconnect attempt number `attempt` (1-based) may be made.
    #[must_use]
    pub const fn should_reconnect(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt <= max,
            None => true,
        }
    }
}

/// Lifecycle of the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Connecting.
    Connecting,
    /// Open.
    Connected,
    /// Waiting before the next attempt.
    Reconnecting,
    /// Gave up, or closed with reconnect disabled.
    Closed,
}

#[derive(Debug)]
struct AtomicConnectionState(AtomicU32);

impl AtomicConnectionState {
    const fn new(state: ConnectionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    fn load(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Closed,
        }
    }

    fn store(&self, state: ConnectionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}

/// Handle to the websocket task.
#[derive(Debug)]
pub struct WebsocketConnection {
    url: String,
    state: Arc<AtomicConnectionState>,
    task: JoinHandle<()>,
}

impl WebsocketConnection {
    /// Connect to `url` on a new task.
    ///
    /// With `reconnect` set to `None` the task ends after the first close
    /// (or failed connect).
    #[must_use]
    pub fn spawn(
        url: impl Into<String>,
        reconnect: Option<ReconnectConfig>,
    ) -> (Self, mpsc::Receiver<ConnectionMessage>) {
        let url = url.into();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));

        let task = tokio::spawn(connection_loop(
            url.clone(),
            reconnect,
            Arc::clone(&state),
            tx,
        ));

        (Self { url, state, task }, rx)
    }

    /// URL this connection targets.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current socket state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Whether the task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the connection down. No further messages are sent.
    pub fn shutdown(&self) {
        self.task.abort();
        self.state.store(ConnectionState::Closed);
    }
}

impl Drop for WebsocketConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn connection_loop(
    url: String,
    reconnect: Option<ReconnectConfig>,
    state: Arc<AtomicConnectionState>,
    tx: mpsc::Sender<ConnectionMessage>,
) {
    let mut attempt = 0u32;

    loop {
        state.store(ConnectionState::Connecting);

        let reason = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                attempt = 0;
                state.store(ConnectionState::Connected);
                info!(url = %url, "websocket connected");
                if tx.send(ConnectionMessage::Opened).await.is_err() {
                    return;
                }

                let (_write, read) = stream.split();
                match pump(read, &tx).await {
                    Some(reason) => reason,
                    None => return,
                }
            }
            Err(e) => {
                debug!(url = %url, error = %e, "websocket connect failed");
                format!("connect failed: {e}")
            }
        };

        state.store(ConnectionState::Disconnected);
        if tx
            .send(ConnectionMessage::Closed {
                reason: reason.clone(),
            })
            .await
            .is_err()
        {
            return;
        }

        let Some(config) = reconnect.as_ref() else {
            state.store(ConnectionState::Closed);
            return;
        };

        attempt += 1;
        if !config.should_reconnect(attempt) {
            warn!(attempts = attempt, "giving up on websocket reconnect");
            state.store(ConnectionState::Closed);
            return;
        }

        let delay = config.delay_for_attempt(attempt);
        state.store(ConnectionState::Reconnecting);
        info!(attempt, ?delay, %reason, "reconnecting websocket");
        sleep(delay).await;
    }
}

/// Forward frames until the socket closes. Returns the close reason, or
/// `None` if the owner dropped the receiver.
async fn pump<S>(mut read: S, tx: &mpsc::Sender<ConnectionMessage>) -> Option<String>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => {
                    if tx.send(ConnectionMessage::Received(value)).await.is_err() {
                        return None;
                    }
                }
                Err(e) => debug!(error = %e, "dropping non-JSON websocket frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                return Some(frame.map_or_else(
                    || "server closed connection".to_string(),
                    |f| format!("server closed connection: {}", f.reason),
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(error = %e, "websocket error");
                return Some(format!("websocket error: {e}"));
            }
            None => return Some("connection closed".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Backoff Tests ====================

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_attempts.is_none());
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            max_attempts: None,
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(3));
    }

    #[test]
    fn test_should_reconnect_respects_max_attempts() {
        let config = ReconnectConfig {
            max_attempts: Some(2),
            ..ReconnectConfig::default()
        };
        assert!(config.should_reconnect(1));
        assert!(config.should_reconnect(2));
        assert!(!config.should_reconnect(3));
        assert!(ReconnectConfig::default().should_reconnect(u32::MAX - 1));
    }

    #[test]
    fn test_single_attempt_allows_one_reconnect() {
        let once = ReconnectConfig {
            max_attempts: Some(1),
            ..ReconnectConfig::default()
        };
        assert!(once.should_reconnect(1));
        assert!(!once.should_reconnect(2));

        let never = ReconnectConfig {
            max_attempts: Some(0),
            ..ReconnectConfig::default()
        };
        assert!(!never.should_reconnect(1));
    }

    // ==================== State Tests ====================

    #[test]
    fn test_atomic_state_round_trips() {
        let state = AtomicConnectionState::new(ConnectionState::Disconnected);
        for s in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Closed,
        ] {
            state.store(s);
            assert_eq!(state.load(), s);
        }
    }

    // ==================== Lifecycle Tests ====================

    #[tokio::test]
    async fn test_failed_connect_without_reconnect_closes_once() {
        // Nothing listens on port 1.
        let (conn, mut rx) = WebsocketConnection::spawn("ws://127.0.0.1:1/websocket", None);
        assert_eq!(conn.url(), "ws://127.0.0.1:1/websocket");

        let msg = rx.recv().await;
        assert!(matches!(msg, Some(ConnectionMessage::Closed { .. })));
        assert!(rx.recv().await.is_none());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_max_attempts_counts_reconnects() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            max_attempts: Some(1),
            ..ReconnectConfig::default()
        };
        let (conn, mut rx) = WebsocketConnection::spawn("ws://127.0.0.1:1/websocket", Some(config));

        // The first connect and one reconnect, each failing.
        assert!(matches!(rx.recv().await, Some(ConnectionMessage::Closed { .. })));
        assert!(matches!(rx.recv().await, Some(ConnectionMessage::Closed { .. })));
        assert!(rx.recv().await.is_none());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            ..ReconnectConfig::default()
        };
        let (conn, mut rx) = WebsocketConnection::spawn("ws://127.0.0.1:1/websocket", Some(config));
        assert!(matches!(rx.recv().await, Some(ConnectionMessage::Closed { .. })));

        conn.shutdown();
        assert!(rx.recv().await.is_none());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
