use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::models::Submission;
use crate::screens::{Route, ScreenAction, ScreenContext, Toast};
use crate::services::error_policy::Failure;
use crate::services::gateway::ApiRequest;
use crate::services::pagination::{PageRule, Paginator};
use crate::services::poller::PollingRefresher;
use crate::services::projection::{SubmissionRow, project_submission};

#[derive(Debug)]
pub struct SubmissionsViewModel {
    pub challenge_id: u64,
    pub phase_id: u64,
    pub submissions: Paginator<Submission>,
    pub rows: Vec<SubmissionRow>,
    pub is_loader: bool,
    pub no_submissions: bool,
    /// Last status-poll failure; cleared by the next successful poll.
    pub error: Option<String>,
    route: Route,
    list_path: String,
}

impl SubmissionsViewModel {
    /// The participant's own submissions for one phase.
    pub fn mine(challenge_id: u64, phase_id: u64) -> Self {
        Self::with(
            challenge_id,
            phase_id,
            PageRule::FirstPage,
            format!("jobs/challenge/{challenge_id}/challenge_phase/{phase_id}/submission/"),
            Route::MySubmissions {
                challenge_id,
                phase_id,
            },
        )
    }

    /// Every submission of a phase, as seen by the host. Its last page is derived from
    /// `count` and the configured `submissions_page_size`.
    pub fn all_for_host(ctx: &ScreenContext, challenge_id: u64, phase_id: u64) -> Self {
        Self::with(
            challenge_id,
            phase_id,
            PageRule::CountOverPageSize {
                page_size: ctx.config.submissions_page_size,
            },
            format!("challenges/{challenge_id}/challenge_phase/{phase_id}/submissions"),
            Route::Challenge { challenge_id },
        )
    }

    fn with(challenge_id: u64, phase_id: u64, rule: PageRule, list_path: String, route: Route) -> Self {
        Self {
            challenge_id,
            phase_id,
            submissions: Paginator::new(rule),
            rows: Vec::new(),
            is_loader: false,
            no_submissions: false,
            error: None,
            route,
            list_path,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.submissions
            .items
            .iter()
            .any(|submission| submission.status.is_pending())
    }

    pub async fn load(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let result = self.fetch_first(ctx).await;
        self.settle(ctx, result).await
    }

    pub async fn next_page(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.submissions.next(&ctx.gateway, token).await.map(|_| ());
        self.settle(ctx, result).await
    }

    pub async fn prev_page(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.is_loader = true;
        let token = ctx.token().await;
        let result = self.submissions.previous(&ctx.gateway, token).await.map(|_| ());
        self.settle(ctx, result).await
    }

    /// Re-fetches the page currently shown; errors go back to the caller untouched.
    pub async fn refresh(&mut self, ctx: &ScreenContext) -> Result<(), ApiError> {
        let token = ctx.token().await;
        self.submissions
            .reload(&ctx.gateway, &self.list_path, token)
            .await?;
        self.project(ctx);
        Ok(())
    }

    /// Flips `is_public` before the PATCH and restores it if the server rejects it.
    pub async fn toggle_visibility(&mut self, ctx: &ScreenContext, submission_id: u64) -> ScreenAction {
        let Some(index) = self
            .submissions
            .items
            .iter()
            .position(|submission| submission.id == submission_id)
        else {
            warn!(submission_id, "toggle requested for unknown submission");
            return ScreenAction::Stay;
        };

        let previous = self.submissions.items[index].is_public;
        self.submissions.items[index].is_public = !previous;
        self.project(ctx);

        let request = ApiRequest::patch(
            format!(
                "jobs/challenge/{}/challenge_phase/{}/submission/{submission_id}",
                self.challenge_id, self.phase_id
            ),
            json!({ "is_public": !previous }),
        );
        match ctx.send(request).await {
            Ok(_) => {
                info!(submission_id, is_public = !previous, "submission visibility changed");
                let message = if previous {
                    "The submission is made private."
                } else {
                    "The submission is made public."
                };
                ScreenAction::Toast(Toast::success(message))
            }
            Err(err) => {
                if let Some(submission) = self
                    .submissions
                    .items
                    .iter_mut()
                    .find(|submission| submission.id == submission_id)
                {
                    submission.is_public = previous;
                }
                self.project(ctx);
                ctx.fail_from(Some(&self.route), &err).await
            }
        }
    }

    async fn fetch_first(&mut self, ctx: &ScreenContext) -> Result<(), ApiError> {
        let token = ctx.token().await;
        self.submissions
            .load(&ctx.gateway, &self.list_path, token)
            .await
    }

    fn project(&mut self, ctx: &ScreenContext) {
        self.rows = self
            .submissions
            .items
            .iter()
            .map(|submission| project_submission(submission, &ctx.zone))
            .collect();
        self.no_submissions = self.rows.is_empty();
    }

    async fn settle(&mut self, ctx: &ScreenContext, result: Result<(), ApiError>) -> ScreenAction {
        self.is_loader = false;
        match result {
            Ok(()) => {
                self.project(ctx);
                ScreenAction::Stay
            }
            Err(err) => ctx.fail_from(Some(&self.route), &err).await,
        }
    }
}

/// The participant submissions list with status polling while anything is still pending.
#[derive(Debug)]
pub struct SubmissionsScreen {
    ctx: ScreenContext,
    state: Arc<Mutex<SubmissionsViewModel>>,
    poller: PollingRefresher,
}

impl SubmissionsScreen {
    pub fn new(ctx: ScreenContext, challenge_id: u64, phase_id: u64) -> Self {
        let interval = ctx.config.polling.submission_status_interval();
        Self {
            ctx,
            state: Arc::new(Mutex::new(SubmissionsViewModel::mine(challenge_id, phase_id))),
            poller: PollingRefresher::new(
                format!("submissions-{challenge_id}-{phase_id}"),
                interval,
            ),
        }
    }

    pub fn state(&self) -> Arc<Mutex<SubmissionsViewModel>> {
        Arc::clone(&self.state)
    }

    pub async fn open(&self) -> ScreenAction {
        let action = self.state.lock().await.load(&self.ctx).await;
        if action == ScreenAction::Stay {
            self.start_status_polling();
        }
        action
    }

    pub async fn toggle_visibility(&self, submission_id: u64) -> ScreenAction {
        self.state
            .lock()
            .await
            .toggle_visibility(&self.ctx, submission_id)
            .await
    }

    pub fn start_status_polling(&self) -> bool {
        let ctx = self.ctx.clone();
        let state = Arc::clone(&self.state);
        self.poller.start(move || {
            let ctx = ctx.clone();
            let state = Arc::clone(&state);
            async move {
                let mut state = state.lock().await;
                if !state.has_pending() {
                    debug!("no pending submissions, skipping refresh");
                    return Ok(());
                }
                let result = state.refresh(&ctx).await;
                state.error = result
                    .as_ref()
                    .err()
                    .map(|err| Failure::classify(err).message());
                result
            }
        })
    }

    pub async fn close(&self) {
        self.poller.stop().await;
    }
}
