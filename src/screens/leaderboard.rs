use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::{ChallengePhaseSplit, LeaderboardEntry};
use crate::screens::{Route, ScreenAction, ScreenContext};
use crate::services::error_policy::Failure;
use crate::services::gateway::ApiRequest;
use crate::services::pagination::{PageRule, Paginator};
use crate::services::poller::{PollStatus, PollingRefresher};
use crate::services::projection::{LeaderboardRow, project_leaderboard};

#[derive(Debug, Clone)]
pub struct LeaderboardViewModel {
    pub phase_split_id: u64,
    pub entries: Paginator<LeaderboardEntry>,
    pub labels: Vec<String>,
    pub rows: Vec<LeaderboardRow>,
    /// Set by the first successful fetch and never cleared by a later failure.
    pub is_result: bool,
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl LeaderboardViewModel {
    pub fn new(phase_split_id: u64) -> Self {
        Self {
            phase_split_id,
            entries: Paginator::new(PageRule::FirstPage),
            labels: Vec::new(),
            rows: Vec::new(),
            is_result: false,
            error: None,
            refreshed_at: None,
        }
    }

    fn path(&self) -> String {
        format!("jobs/challenge_phase_split/{}/leaderboard/", self.phase_split_id)
    }

    fn route(&self) -> Route {
        Route::Leaderboard {
            phase_split_id: self.phase_split_id,
        }
    }

    fn project(&mut self, now: DateTime<Utc>) {
        self.labels = self
            .entries
            .items
            .first()
            .map(|entry| entry.schema.labels.clone())
            .unwrap_or_default();
        self.rows = project_leaderboard(&self.entries.items, now);
        self.is_result = true;
        self.error = None;
        self.refreshed_at = Some(now);
    }

    /// Re-fetches the page currently shown. Failures only record `error`.
    async fn refresh(&mut self, ctx: &ScreenContext) {
        let token = ctx.token().await;
        let path = self.path();
        match self.entries.reload(&ctx.gateway, &path, token).await {
            Ok(()) => self.project(ctx.now()),
            Err(err) => {
                warn!(phase_split_id = self.phase_split_id, error = %err, "leaderboard refresh failed");
                self.error = Some(Failure::classify(&err).message());
            }
        }
    }

    async fn settle(&mut self, ctx: &ScreenContext, result: Result<bool, ApiError>) -> ScreenAction {
        match result {
            Ok(_) => {
                self.project(ctx.now());
                debug!(phase_split_id = self.phase_split_id, rows = self.rows.len(), "leaderboard loaded");
                ScreenAction::Stay
            }
            Err(err) => {
                let action = ctx.fail_from(Some(&self.route()), &err).await;
                if let ScreenAction::InlineError(message) = &action {
                    self.error = Some(message.clone());
                }
                action
            }
        }
    }
}

/// Phase splits of a challenge, used to pick which leaderboard to show.
pub async fn phase_splits(
    ctx: &ScreenContext,
    challenge_id: u64,
) -> Result<Vec<ChallengePhaseSplit>, ApiError> {
    ctx.fetch(ApiRequest::get(format!(
        "challenges/{challenge_id}/challenge_phase_split"
    )))
    .await
}

#[derive(Debug)]
pub struct LeaderboardScreen {
    ctx: ScreenContext,
    state: Arc<Mutex<LeaderboardViewModel>>,
    poller: PollingRefresher,
}

impl LeaderboardScreen {
    pub fn new(ctx: ScreenContext, phase_split_id: u64) -> Self {
        let interval = ctx.config.polling.leaderboard_interval();
        Self {
            ctx,
            state: Arc::new(Mutex::new(LeaderboardViewModel::new(phase_split_id))),
            poller: PollingRefresher::new(format!("leaderboard-{phase_split_id}"), interval),
        }
    }

    pub async fn snapshot(&self) -> LeaderboardViewModel {
        self.state.lock().await.clone()
    }

    pub fn refresh_status(&self) -> PollStatus {
        self.poller.status()
    }

    /// The initial fetch. Failures go through the error policy.
    pub async fn fetch(&self) -> ScreenAction {
        let mut state = self.state.lock().await;
        let token = self.ctx.token().await;
        let path = state.path();
        let result = state
            .entries
            .load(&self.ctx.gateway, &path, token)
            .await
            .map(|()| true);
        state.settle(&self.ctx, result).await
    }

    pub async fn next_page(&self) -> ScreenAction {
        let mut state = self.state.lock().await;
        let token = self.ctx.token().await;
        let result = state.entries.next(&self.ctx.gateway, token).await;
        state.settle(&self.ctx, result).await
    }

    pub async fn prev_page(&self) -> ScreenAction {
        let mut state = self.state.lock().await;
        let token = self.ctx.token().await;
        let result = state.entries.previous(&self.ctx.gateway, token).await;
        state.settle(&self.ctx, result).await
    }

    /// Refreshes the page shown on the configured interval. A failing refresh only records `error`.
    pub fn start_refresh(&self) -> bool {
        let ctx = self.ctx.clone();
        let state = Arc::clone(&self.state);
        self.poller.start(move || {
            let ctx = ctx.clone();
            let state = Arc::clone(&state);
            async move {
                state.lock().await.refresh(&ctx).await;
                Ok(())
            }
        })
    }

    pub async fn stop_refresh(&self) -> bool {
        self.poller.stop().await
    }
}
