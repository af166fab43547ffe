//! Single outstanding deadline for the session.
//!
//! The firmware this models spawned a throwaway timer task per deadline
//! and deleted it on cancel. Here one service owns at most one armed
//! deadline: arming aborts the previous timer task and spawns a fresh one
//! that sleeps, posts exactly one event into the session inbox, and ends.
//! Abort is safe because the timer holds nothing but a sender clone.

use doorman_core::constants::{
    DENIED_HOLD, ENTRY_TIMEOUT, GRANTED_HOLD, SESSION_QUEUE_CAPACITY,
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Duration, Instant, sleep},
};
use tracing::{debug, trace};

/// Which deadline is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineKind {
    /// Entry timeout while the user is keying in ID or password.
    Entry,

    /// Auto-revert hold after a granted verdict.
    Granted,

    /// Auto-revert hold after a denied verdict.
    Denied,
}

impl DeadlineKind {
    pub fn duration(self) -> Duration {
        match self {
            Self::Entry => ENTRY_TIMEOUT,
            Self::Granted => GRANTED_HOLD,
            Self::Denied => DENIED_HOLD,
        }
    }

    /// What lands in the inbox when this deadline fires.
    fn event(self) -> SessionEventKind {
        match self {
            Self::Entry => SessionEventKind::Timeout,
            Self::Granted | Self::Denied => SessionEventKind::Reset,
        }
    }
}

/// Internal session events, distinct from key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    /// An entry deadline expired; show the timeout notice, then reset.
    Timeout,

    /// A verdict hold expired; reset silently.
    Reset,
}

/// An event posted into the session inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub at: Instant,
}

/// Receiving half of the session inbox.
#[derive(Debug)]
pub struct SessionInbox {
    rx: mpsc::Receiver<SessionEvent>,
}

impl SessionInbox {
    /// Drain one event without blocking.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

/// Owns the one-at-a-time deadline timer.
#[derive(Debug)]
pub struct DeadlineService {
    tx: mpsc::Sender<SessionEvent>,
    armed: Option<JoinHandle<()>>,
}

impl DeadlineService {
    /// Create the service and the inbox its events land in.
    pub fn new() -> (Self, SessionInbox) {
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        (Self { tx, armed: None }, SessionInbox { rx })
    }

    /// Arm `kind`, replacing any outstanding deadline.
    pub fn arm(&mut self, kind: DeadlineKind) {
        self.cancel();
        trace!(?kind, duration = ?kind.duration(), "deadline armed");
        let tx = self.tx.clone();
        self.armed = Some(tokio::spawn(async move {
            sleep(kind.duration()).await;
            let event = SessionEvent {
                kind: kind.event(),
                at: Instant::now(),
            };
            // Lossy like every other queue here; a full inbox means the
            // session is already busy resetting.
            if tx.try_send(event).is_err() {
                debug!(?kind, "session inbox unavailable, deadline event dropped");
            }
        }));
    }

    /// Cancel the outstanding deadline, if any.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.abort();
            trace!("deadline cancelled");
        }
    }
}

impl Drop for DeadlineService {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entry_deadline_posts_one_timeout() {
        let (mut service, mut inbox) = DeadlineService::new();
        service.arm(DeadlineKind::Entry);

        sleep(ENTRY_TIMEOUT + Duration::from_millis(10)).await;
        let event = inbox.try_next().unwrap();
        assert_eq!(event.kind, SessionEventKind::Timeout);
        assert!(inbox.try_next().is_none(), "exactly one event");
    }

    #[tokio::test(start_paused = true)]
    async fn verdict_deadlines_post_reset() {
        let (mut service, mut inbox) = DeadlineService::new();

        service.arm(DeadlineKind::Granted);
        sleep(GRANTED_HOLD + Duration::from_millis(10)).await;
        assert_eq!(inbox.try_next().unwrap().kind, SessionEventKind::Reset);

        service.arm(DeadlineKind::Denied);
        sleep(DENIED_HOLD + Duration::from_millis(10)).await;
        assert_eq!(inbox.try_next().unwrap().kind, SessionEventKind::Reset);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_the_event() {
        let (mut service, mut inbox) = DeadlineService::new();
        service.arm(DeadlineKind::Entry);

        sleep(Duration::from_secs(5)).await;
        service.cancel();

        sleep(ENTRY_TIMEOUT).await;
        assert!(inbox.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_deadline() {
        let (mut service, mut inbox) = DeadlineService::new();
        service.arm(DeadlineKind::Entry);

        // Replace just before expiry; only the second event arrives.
        sleep(ENTRY_TIMEOUT - Duration::from_millis(100)).await;
        service.arm(DeadlineKind::Denied);

        sleep(Duration::from_millis(200)).await;
        assert!(inbox.try_next().is_none(), "first deadline was replaced");

        sleep(DENIED_HOLD).await;
        assert_eq!(inbox.try_next().unwrap().kind, SessionEventKind::Reset);
    }
}
