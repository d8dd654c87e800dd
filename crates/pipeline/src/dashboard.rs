//! Account dashboard: the current user, server load, news and the
//! kudos leaderboard.
//!
//! Two refresh loops run side by side. The fast loop (every 30 s)
//! fetches the current user, performance counters and news; the slow
//! loop (every 180 s) fetches the full user list, which is large, and
//! rebuilds the leaderboard from it.

use std::sync::Arc;
use std::time::Duration;

use horde_client::messages::{NewsItem, PerformanceStats, UserDetails};
use horde_client::{ErrorReporter, HordeApi};
use horde_core::leaderboard::{
    build_leaderboard, Leaderboard, LeaderboardKey, SortDirection, UserStanding,
};
use horde_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::{EventBus, HordeEvent};

pub const FAST_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const SLOW_REFRESH_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardState {
    pub user: Option<UserDetails>,
    pub performance: Option<PerformanceStats>,
    pub news: Vec<NewsItem>,
    pub users: Vec<UserStanding>,
    pub leaderboard: Leaderboard,
    pub leaderboard_key: LeaderboardKey,
    pub leaderboard_direction: SortDirection,
    pub fast_refreshed_at: Option<Timestamp>,
    pub slow_refreshed_at: Option<Timestamp>,
}

impl DashboardState {
    fn rebuild_leaderboard(&mut self) {
        self.leaderboard = build_leaderboard(
            &self.users,
            self.leaderboard_key,
            self.leaderboard_direction,
            self.user.as_ref().map(|u| u.id),
        );
    }
}

pub struct Dashboard {
    api: HordeApi,
    reporter: Arc<dyn ErrorReporter>,
    events: Arc<EventBus>,
    state: RwLock<DashboardState>,
    fast_interval: Duration,
    slow_interval: Duration,
}

impl Dashboard {
    pub fn new(api: HordeApi, reporter: Arc<dyn ErrorReporter>, events: Arc<EventBus>) -> Self {
        Self {
            api,
            reporter,
            events,
            state: RwLock::new(DashboardState::default()),
            fast_interval: FAST_REFRESH_INTERVAL,
            slow_interval: SLOW_REFRESH_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, fast: Duration, slow: Duration) -> Self {
        self.fast_interval = fast;
        self.slow_interval = slow;
        self
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    /// Change how the leaderboard is ranked, using the cached user list.
    pub async fn set_leaderboard_order(&self, key: LeaderboardKey, direction: SortDirection) {
        let mut state = self.state.write().await;
        state.leaderboard_key = key;
        state.leaderboard_direction = direction;
        state.rebuild_leaderboard();
        drop(state);
        self.events.publish(HordeEvent::DashboardUpdated);
    }

    /// Fetch the current user, performance counters and news.
    ///
    /// The three requests run concurrently. Parts that succeed are applied
    /// even if another fails; each failure is reported and the first one
    /// is returned.
    pub async fn refresh_fast(&self) -> Result<(), SessionError> {
        let (user, performance, news) =
            tokio::join!(self.api.find_user(), self.api.performance(), self.api.news());

        let mut first_error = None;
        let mut state = self.state.write().await;
        match user {
            Ok(user) => state.user = Some(user),
            Err(e) => self.record_failure(e.into(), &mut first_error),
        }
        match performance {
            Ok(performance) => state.performance = Some(performance),
            Err(e) => self.record_failure(e.into(), &mut first_error),
        }
        match news {
            Ok(news) => state.news = news,
            Err(e) => self.record_failure(e.into(), &mut first_error),
        }
        state.rebuild_leaderboard();
        state.fast_refreshed_at = Some(chrono::Utc::now());
        drop(state);

        self.events.publish(HordeEvent::DashboardUpdated);
        first_error.map_or(Ok(()), Err)
    }

    /// Fetch the full user list and rebuild the leaderboard.
    pub async fn refresh_slow(&self) -> Result<(), SessionError> {
        let users = match self.api.users().await {
            Ok(users) => users,
            Err(e) => {
                let e = SessionError::from(e);
                self.reporter.report(&e.to_string());
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        state.users = users.iter().map(UserStanding::from).collect();
        state.rebuild_leaderboard();
        state.slow_refreshed_at = Some(chrono::Utc::now());
        tracing::debug!(users = state.users.len(), "Leaderboard refreshed");
        drop(state);

        self.events.publish(HordeEvent::DashboardUpdated);
        Ok(())
    }

    /// Run both refresh loops until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tokio::join!(
            self.refresh_loop(&cancel, self.fast_interval, RefreshKind::Fast),
            self.refresh_loop(&cancel, self.slow_interval, RefreshKind::Slow),
        );
        tracing::info!("Dashboard refresh stopped");
    }

    // ---- private helpers ----

    async fn refresh_loop(&self, cancel: &CancellationToken, period: Duration, kind: RefreshKind) {
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let result = match kind {
                        RefreshKind::Fast => self.refresh_fast().await,
                        RefreshKind::Slow => self.refresh_slow().await,
                    };
                    if let Err(e) = result {
                        tracing::debug!(?kind, error = %e, "Dashboard refresh incomplete");
                    }
                }
            }
        }
    }

    fn record_failure(&self, error: SessionError, first: &mut Option<SessionError>) {
        self.reporter.report(&error.to_string());
        if first.is_none() {
            *first = Some(error);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RefreshKind {
    Fast,
    Slow,
}
