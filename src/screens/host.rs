use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::WorkerLogs;
use crate::screens::{Route, ScreenAction, ScreenContext, Toast};
use crate::services::dialogs::{ModalDecision, ModalResult};
use crate::services::error_policy::{self, Failure};
use crate::services::gateway::{ApiRequest, Method};
use crate::services::poller::PollingRefresher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerAction {
    Start,
    Stop,
    Restart,
}

impl WorkerAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(WorkerAction::Start),
            "stop" => Some(WorkerAction::Stop),
            "restart" => Some(WorkerAction::Restart),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerAction::Start => "start",
            WorkerAction::Stop => "stop",
            WorkerAction::Restart => "restart",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            WorkerAction::Start => "started",
            WorkerAction::Stop => "stopped",
            WorkerAction::Restart => "restarted",
        }
    }
}

/// Asks the server to start, stop or restart the challenge's evaluation worker once
/// `decision` resolves to confirmed.
pub async fn manage_worker(
    ctx: &ScreenContext,
    challenge_id: u64,
    action: WorkerAction,
    decision: ModalDecision,
) -> ScreenAction {
    if decision.await != ModalResult::Confirmed {
        return ScreenAction::Stay;
    }

    let request = ApiRequest::new(
        Method::Put,
        format!("challenges/{challenge_id}/manage_worker/{}/", action.as_str()),
    )
    .with_body(json!({}));
    match ctx.send(request).await {
        Ok(body) => {
            let succeeded = body
                .get("action")
                .and_then(|value| value.as_str())
                .is_none_or(|outcome| outcome == "Success");
            if succeeded {
                info!(challenge_id, action = action.as_str(), "worker action accepted");
                ScreenAction::Toast(Toast::success(format!(
                    "Worker(s) {} successfully.",
                    action.past_tense()
                )))
            } else {
                let message = error_policy::body_message(&body)
                    .unwrap_or_else(|| error_policy::FALLBACK_MESSAGE.to_string());
                warn!(challenge_id, action = action.as_str(), error = %message, "worker action refused");
                ScreenAction::Toast(Toast::error(message))
            }
        }
        Err(err) => {
            ctx.fail_from(Some(&Route::Challenge { challenge_id }), &err)
                .await
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerLogsViewModel {
    pub challenge_id: u64,
    pub logs: Vec<String>,
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl WorkerLogsViewModel {
    fn path(&self) -> String {
        format!("jobs/challenge/{}/get_worker_logs/", self.challenge_id)
    }
}

/// Worker log tail that re-fetches every `worker_logs_seconds` while open.
#[derive(Debug)]
pub struct WorkerLogsScreen {
    ctx: ScreenContext,
    state: Arc<Mutex<WorkerLogsViewModel>>,
    poller: PollingRefresher,
}

impl WorkerLogsScreen {
    pub fn new(ctx: ScreenContext, challenge_id: u64) -> Self {
        let interval = ctx.config.polling.worker_logs_interval();
        Self {
            ctx,
            state: Arc::new(Mutex::new(WorkerLogsViewModel {
                challenge_id,
                ..Default::default()
            })),
            poller: PollingRefresher::new(format!("worker-logs-{challenge_id}"), interval),
        }
    }

    pub async fn snapshot(&self) -> WorkerLogsViewModel {
        self.state.lock().await.clone()
    }

    pub async fn open(&self) -> ScreenAction {
        let mut state = self.state.lock().await;
        let challenge_id = state.challenge_id;
        match self.ctx.fetch::<WorkerLogs>(ApiRequest::get(state.path())).await {
            Ok(logs) => {
                state.logs = logs.logs;
                state.error = None;
                state.refreshed_at = Some(self.ctx.now());
                drop(state);
                self.poll();
                ScreenAction::Stay
            }
            Err(err) => {
                drop(state);
                self.ctx
                    .fail_from(Some(&Route::Challenge { challenge_id }), &err)
                    .await
            }
        }
    }

    fn poll(&self) -> bool {
        let ctx = self.ctx.clone();
        let state = Arc::clone(&self.state);
        self.poller.start(move || {
            let ctx = ctx.clone();
            let state = Arc::clone(&state);
            async move {
                let path = state.lock().await.path();
                let result = ctx.fetch::<WorkerLogs>(ApiRequest::get(path)).await;
                let mut state = state.lock().await;
                match result {
                    Ok(logs) => {
                        state.logs = logs.logs;
                        state.error = None;
                        state.refreshed_at = Some(ctx.now());
                    }
                    Err(err) => state.error = Some(Failure::classify(&err).message()),
                }
                Ok(())
            }
        })
    }

    pub async fn close(&self) -> bool {
        self.poller.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::test_support::logged_in_context;
    use crate::services::dialogs::{self, ModalRequest};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_manage_worker_confirmed() {
        let (ctx, stub) = logged_in_context().await;
        stub.push_ok(json!({ "action": "Success" }));

        let action = manage_worker(
            &ctx,
            4,
            WorkerAction::Restart,
            ModalDecision::ready(ModalResult::Confirmed),
        )
        .await;
        assert_eq!(
            action,
            ScreenAction::Toast(Toast::success("Worker(s) restarted successfully."))
        );
        let request = &stub.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "challenges/4/manage_worker/restart/");
    }

    #[tokio::test]
    async fn test_manage_worker_refused() {
        let (ctx, stub) = logged_in_context().await;
        stub.push_ok(json!({ "action": "Failure", "error": "Worker is already running" }));

        let action = manage_worker(
            &ctx,
            4,
            WorkerAction::Start,
            ModalDecision::ready(ModalResult::Confirmed),
        )
        .await;
        assert_eq!(
            action,
            ScreenAction::Toast(Toast::error("Worker is already running"))
        );
    }

    #[tokio::test]
    async fn test_manage_worker_dismissed() {
        let (ctx, stub) = logged_in_context().await;
        let (pending, decision) = dialogs::open(ModalRequest::confirm("Stop", "Stop the worker?"));
        drop(pending);

        let action = manage_worker(&ctx, 4, WorkerAction::Stop, decision).await;
        assert_eq!(action, ScreenAction::Stay);
        assert_eq!(stub.request_count(), 0);
    }

    #[test]
    fn test_worker_action_parse() {
        assert_eq!(WorkerAction::parse("stop"), Some(WorkerAction::Stop));
        assert_eq!(WorkerAction::parse("pause"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_logs_poll() {
        let (ctx, stub) = logged_in_context().await;
        stub.push_ok(json!({ "logs": ["booting"] }));
        stub.push_ok(json!({ "logs": ["booting", "ready"] }));
        stub.push_status(403, json!({ "detail": "Not a host of this challenge" }));
        let screen = WorkerLogsScreen::new(ctx, 8);

        assert_eq!(screen.open().await, ScreenAction::Stay);
        assert_eq!(screen.snapshot().await.logs, vec!["booting"]);

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(screen.snapshot().await.logs, vec!["booting", "ready"]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let vm = screen.snapshot().await;
        assert_eq!(vm.logs, vec!["booting", "ready"]);
        assert_eq!(vm.error.as_deref(), Some("Not a host of this challenge"));

        assert!(screen.close().await);
        assert_eq!(
            stub.requests()[0].path,
            "jobs/challenge/8/get_worker_logs/"
        );
    }
}
