//! Shared lifecycle machinery: states, the busy guard and polling.
//!
//! ```text
//! IDLE -> SUBMITTING -> POLLING -> DONE
//!              \-> FAILED
//! POLLING -> FAILED | CANCELLED
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use horde_core::error::CoreError;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::{EventBus, HordeEvent};

pub const GENERATION_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const INTERROGATION_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Generation,
    Interrogation,
    Rating,
}

impl LifecycleKind {
    fn label(self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Interrogation => "interrogation",
            Self::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Submitting,
    Polling,
    Done,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Poll timing for one lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Give up (FAILED) once this much time has passed. `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl PollConfig {
    pub fn generation() -> Self {
        Self {
            interval: GENERATION_POLL_INTERVAL,
            max_wait: None,
        }
    }

    pub fn interrogation() -> Self {
        Self {
            interval: INTERROGATION_POLL_INTERVAL,
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

// ---------------------------------------------------------------------------
// SessionTracker
// ---------------------------------------------------------------------------

/// Per-lifecycle state, busy flag and cancellation handle.
///
/// At most one session runs at a time; [`SessionTracker::begin`] refuses a
/// second one with [`CoreError::Conflict`].
pub struct SessionTracker {
    kind: LifecycleKind,
    busy: AtomicBool,
    state: watch::Sender<SessionState>,
    current: Mutex<Option<CancellationToken>>,
    events: Arc<EventBus>,
}

/// Held for the duration of a session. Clears the busy flag on drop.
pub struct ActiveSession<'a> {
    tracker: &'a SessionTracker,
    pub token: CancellationToken,
    pub session_id: uuid::Uuid,
}

impl std::fmt::Debug for ActiveSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("token", &self.token)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.tracker.set_current(None);
        self.tracker.busy.store(false, Ordering::Release);
    }
}

impl SessionTracker {
    pub fn new(kind: LifecycleKind, events: Arc<EventBus>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            kind,
            busy: AtomicBool::new(false),
            state,
            current: Mutex::new(None),
            events,
        }
    }

    pub fn kind(&self) -> LifecycleKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the lifecycle. The session's token is a child of `parent`.
    pub fn begin(&self, parent: &CancellationToken) -> Result<ActiveSession<'_>, CoreError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::Conflict(format!(
                "A {} request is already in progress",
                self.kind.label()
            )));
        }
        let token = parent.child_token();
        self.set_current(Some(token.clone()));
        Ok(ActiveSession {
            tracker: self,
            token,
            session_id: uuid::Uuid::new_v4(),
        })
    }

    /// Cancel the running session, if any. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        let current = match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match current {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Record and broadcast a state change.
    pub fn transition(&self, state: SessionState, remote_id: Option<&str>) {
        self.state.send_replace(state);
        tracing::debug!(
            kind = self.kind.label(),
            ?state,
            remote_id = remote_id.unwrap_or("-"),
            "Session state changed"
        );
        self.events.publish(HordeEvent::StateChanged {
            kind: self.kind,
            state,
            remote_id: remote_id.map(str::to_string),
        });
    }

    /// Move to the terminal state matching `error` and broadcast the failure.
    pub(crate) fn finish_with_error(
        &self,
        error: &SessionError,
        remote_id: Option<&str>,
    ) {
        if error.is_cancelled() {
            self.transition(SessionState::Cancelled, remote_id);
            return;
        }
        self.transition(SessionState::Failed, remote_id);
        self.events.publish(HordeEvent::Failed {
            kind: self.kind,
            remote_id: remote_id.map(str::to_string),
            message: error.to_string(),
        });
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    fn set_current(&self, token: Option<CancellationToken>) {
        match self.current.lock() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Call `check` every `config.interval` until it yields a value.
///
/// The first call happens immediately. `check` receives the time elapsed
/// since the loop started. Any error from `check` ends the loop without a
/// retry. Cancellation and `max_wait` also interrupt a check in flight.
pub async fn poll_until<T, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, SessionError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = Result<Option<T>, SessionError>>,
{
    let started = Instant::now();
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let polling = async {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = interval.tick() => {}
            }
            match cancellable(cancel, check(started.elapsed())).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }
    };

    match config.max_wait {
        Some(max_wait) => tokio::time::timeout(max_wait, polling)
            .await
            .map_err(|_| SessionError::TimedOut(max_wait))?,
        None => polling.await,
    }
}

/// Run `work` unless `cancel` fires first.
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, work: Fut) -> Result<T, SessionError>
where
    Fut: Future<Output = Result<T, SessionError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicU32;

    fn tracker() -> SessionTracker {
        SessionTracker::new(LifecycleKind::Generation, Arc::new(EventBus::default()))
    }

    #[test]
    fn second_begin_is_a_conflict() {
        let tracker = tracker();
        let root = CancellationToken::new();
        let first = tracker.begin(&root).unwrap();
        assert!(tracker.is_busy());
        assert_matches!(tracker.begin(&root), Err(CoreError::Conflict(_)));
        drop(first);
        assert!(!tracker.is_busy());
        assert!(tracker.begin(&root).is_ok());
    }

    #[test]
    fn cancel_reaches_active_session_only() {
        let tracker = tracker();
        assert!(!tracker.cancel());
        let root = CancellationToken::new();
        let session = tracker.begin(&root).unwrap();
        assert!(tracker.cancel());
        assert!(session.token.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn transitions_are_broadcast() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let tracker = SessionTracker::new(LifecycleKind::Interrogation, events);
        tracker.transition(SessionState::Submitting, None);
        assert_eq!(tracker.state(), SessionState::Submitting);
        assert_matches!(
            rx.try_recv().unwrap(),
            HordeEvent::StateChanged { kind: LifecycleKind::Interrogation, state: SessionState::Submitting, .. }
        );
    }

    #[tokio::test]
    async fn poll_until_returns_first_ready_value() {
        let calls = AtomicU32::new(0);
        let config = PollConfig {
            interval: Duration::from_millis(5),
            max_wait: None,
        };
        let value = poll_until(&config, &CancellationToken::new(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok((n == 3).then_some(n)) }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let config = PollConfig {
            interval: Duration::from_millis(5),
            max_wait: Some(Duration::from_millis(40)),
        };
        let result: Result<(), _> =
            poll_until(&config, &CancellationToken::new(), |_| async { Ok(None) }).await;
        assert_matches!(result, Err(SessionError::TimedOut(_)));
    }

    #[tokio::test]
    async fn poll_until_observes_cancellation() {
        let config = PollConfig::generation();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> = poll_until(&config, &cancel, |_| async { Ok(None) }).await;
        assert_matches!(result, Err(SessionError::Cancelled));
    }

    #[tokio::test]
    async fn poll_until_interrupts_a_stalled_check() {
        let config = PollConfig::generation();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(2),
            poll_until(&config, &cancel, |_| async {
                std::future::pending::<()>().await;
                Ok(None)
            }),
        )
        .await
        .unwrap();
        assert_matches!(result, Err(SessionError::Cancelled));
    }

    #[tokio::test]
    async fn max_wait_interrupts_a_stalled_check() {
        let config = PollConfig::generation().with_max_wait(Some(Duration::from_millis(20)));
        let result: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(2),
            poll_until(&config, &CancellationToken::new(), |_| async {
                std::future::pending::<()>().await;
                Ok(None)
            }),
        )
        .await
        .unwrap();
        assert_matches!(result, Err(SessionError::TimedOut(_)));
    }
}
