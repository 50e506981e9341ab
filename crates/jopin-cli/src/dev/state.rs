//! Shared state of the browser refresh channel.
//!
//! Tracks connected sessions and the wait-for-ready flag using parking_lot
//! locks. Every mutation is a single short critical section; nothing is held
//! across an await point.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Frame sent to every session when browsers should reload.
pub const REFRESH_FRAME: &str = "browser-refresh-asked";

/// Outbound frames buffered per session.
const SESSION_BUFFER: usize = 32;

/// Identifier of a connected session.
pub type SessionId = usize;

/// Inbound control frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    /// The server will announce readiness itself; skip the automatic refresh
    MustWaitServerReady,
    /// Reload every connected browser now
    AskRefreshingBrowser,
    /// The server finished starting; reload every connected browser
    DeclareServerReady,
}

/// Error for frames outside the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage(pub String);

impl FromStr for ChannelMessage {
    type Err = UnknownMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mustWaitServerReady" => Ok(ChannelMessage::MustWaitServerReady),
            "askRefreshingBrowser" => Ok(ChannelMessage::AskRefreshingBrowser),
            "declareServerReady" => Ok(ChannelMessage::DeclareServerReady),
            other => Err(UnknownMessage(other.to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct ReadyFlag {
    must_wait: bool,
    /// Session that last set the flag
    owner: Option<SessionId>,
}

/// Session registry for the refresh channel.
#[derive(Debug, Default)]
pub struct RefreshHub {
    sessions: RwLock<HashMap<SessionId, mpsc::Sender<String>>>,
    next_session_id: RwLock<SessionId>,
    ready: RwLock<ReadyFlag>,
}

impl RefreshHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// # Returns
    ///
    /// Session ID and receiver for outbound frames
    pub fn register(&self) -> (SessionId, mpsc::Receiver<String>) {
        let id = {
            let mut next_id = self.next_session_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        self.sessions.write().insert(id, tx);
        tracing::debug!("refresh session {} connected", id);

        (id, rx)
    }

    /// Forget a session. Clears the wait-for-ready flag when this session set it.
    pub fn unregister(&self, id: SessionId) {
        self.sessions.write().remove(&id);

        let mut ready = self.ready.write();
        if ready.owner == Some(id) {
            ready.must_wait = false;
            ready.owner = None;
        }
        tracing::debug!("refresh session {} disconnected", id);
    }

    /// Apply an inbound frame from `session`.
    pub fn handle_message(&self, session: SessionId, message: ChannelMessage) {
        match message {
            ChannelMessage::MustWaitServerReady => {
                let mut ready = self.ready.write();
                ready.must_wait = true;
                ready.owner = Some(session);
            }
            ChannelMessage::AskRefreshingBrowser | ChannelMessage::DeclareServerReady => {
                self.broadcast_refresh();
            }
        }
    }

    /// Send [`REFRESH_FRAME`] to every connected session.
    ///
    /// Sessions whose connection is gone are dropped.
    pub fn broadcast_refresh(&self) {
        let sessions = self.sessions.read().clone();
        let mut closed = Vec::new();

        for (id, tx) in sessions {
            match tx.try_send(REFRESH_FRAME.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("refresh session {} is not reading, frame dropped", id);
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        for id in closed {
            self.unregister(id);
        }
    }

    /// Whether a session promised to announce readiness itself.
    pub fn must_wait_ready(&self) -> bool {
        self.ready.read().must_wait
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Post-spawn hook: schedule the automatic refresh unless a session
    /// promised to announce readiness.
    pub fn on_child_spawned(self: &Arc<Self>, delay: Duration) -> Option<JoinHandle<()>> {
        if self.must_wait_ready() {
            tracing::debug!("waiting for the server to declare itself ready");
            return None;
        }

        let hub = Arc::clone(self);
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            hub.broadcast_refresh();
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_messages() {
        assert_eq!(
            "mustWaitServerReady".parse::<ChannelMessage>(),
            Ok(ChannelMessage::MustWaitServerReady)
        );
        assert_eq!(
            "askRefreshingBrowser\n".parse::<ChannelMessage>(),
            Ok(ChannelMessage::AskRefreshingBrowser)
        );
        assert_eq!(
            "declareServerReady".parse::<ChannelMessage>(),
            Ok(ChannelMessage::DeclareServerReady)
        );
        assert_eq!(
            "reload".parse::<ChannelMessage>(),
            Err(UnknownMessage("reload".to_string()))
        );
    }

    #[test]
    fn test_session_registration() {
        let hub = RefreshHub::new();

        let (id1, _rx1) = hub.register();
        let (id2, _rx2) = hub.register();
        assert_ne!(id1, id2);
        assert_eq!(hub.session_count(), 2);

        hub.unregister(id1);
        assert_eq!(hub.session_count(), 1);
    }

    #[test]
    fn test_ready_messages_broadcast_to_all() {
        let hub = RefreshHub::new();
        let (id1, mut rx1) = hub.register();
        let (_id2, mut rx2) = hub.register();

        hub.handle_message(id1, ChannelMessage::DeclareServerReady);
        assert_eq!(rx1.try_recv().unwrap(), REFRESH_FRAME);
        assert_eq!(rx2.try_recv().unwrap(), REFRESH_FRAME);

        hub.handle_message(id1, ChannelMessage::AskRefreshingBrowser);
        assert_eq!(rx1.try_recv().unwrap(), REFRESH_FRAME);
        assert_eq!(rx2.try_recv().unwrap(), REFRESH_FRAME);
    }

    #[test]
    fn test_closed_sessions_are_pruned() {
        let hub = RefreshHub::new();
        let (_id1, rx1) = hub.register();
        let (_id2, _rx2) = hub.register();

        drop(rx1);
        hub.broadcast_refresh();
        assert_eq!(hub.session_count(), 1);
    }

    #[test]
    fn test_flag_cleared_when_owner_leaves() {
        let hub = RefreshHub::new();
        let (page, _rx1) = hub.register();
        let (other, _rx2) = hub.register();

        hub.handle_message(page, ChannelMessage::MustWaitServerReady);
        assert!(hub.must_wait_ready());

        hub.unregister(other);
        assert!(hub.must_wait_ready());

        hub.unregister(page);
        assert!(!hub.must_wait_ready());
    }

    #[test]
    fn test_flag_last_writer_wins() {
        let hub = RefreshHub::new();
        let (first, _rx1) = hub.register();
        let (second, _rx2) = hub.register();

        hub.handle_message(first, ChannelMessage::MustWaitServerReady);
        hub.handle_message(second, ChannelMessage::MustWaitServerReady);

        // The first session no longer owns the flag
        hub.unregister(first);
        assert!(hub.must_wait_ready());
        hub.unregister(second);
        assert!(!hub.must_wait_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_without_wait_refreshes_once_after_delay() {
        let hub = Arc::new(RefreshHub::new());
        let (_id, mut rx) = hub.register();

        let task = hub.on_child_spawned(Duration::from_millis(100)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        task.await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), REFRESH_FRAME);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_with_wait_does_not_refresh() {
        let hub = Arc::new(RefreshHub::new());
        let (id, mut rx) = hub.register();

        hub.handle_message(id, ChannelMessage::MustWaitServerReady);
        assert!(hub.on_child_spawned(Duration::from_millis(100)).is_none());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
