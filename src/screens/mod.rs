//! Per-screen view-models. Every operation reports its user-visible consequence as a
//! [`ScreenAction`] instead of touching global dialog or routing state.

pub mod auth;
pub mod challenges;
pub mod host;
pub mod leaderboard;
pub mod submissions;
pub mod teams;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::services::config_loader::EvalboardConfig;
use crate::services::error_policy::{self, Failure};
use crate::services::gateway::{ApiRequest, Gateway};
use crate::services::projection::{Clock, DisplayZone, SystemClock};
use crate::services::session::SharedSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Login,
    Signup,
    Dashboard,
    PermissionDenied,
    ChallengeList,
    Challenge { challenge_id: u64 },
    MySubmissions { challenge_id: u64, phase_id: u64 },
    Leaderboard { phase_split_id: u64 },
    Teams,
    HostTeams,
    AcceptInvitation { key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenAction {
    Stay,
    Toast(Toast),
    InlineError(String),
    FormError { field: String, message: String },
    Navigate(Route),
}

/// Everything a screen needs: the gateway, the session, and an injected clock.
#[derive(Clone)]
pub struct ScreenContext {
    pub gateway: Gateway,
    pub session: SharedSession,
    pub config: Arc<EvalboardConfig>,
    pub zone: DisplayZone,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ScreenContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ScreenContext")
            .field("api_base_url", &self.config.api_base_url)
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

impl ScreenContext {
    pub fn new(
        config: EvalboardConfig,
        gateway: Gateway,
        session: SharedSession,
    ) -> Result<Self, ApiError> {
        let zone = DisplayZone::parse(&config.display.utc_offset)?;
        Ok(Self {
            gateway,
            session,
            config: Arc::new(config),
            zone,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn token(&self) -> Option<String> {
        self.session.lock().await.token()
    }

    /// Sends with the session token attached when there is one.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let token = self.token().await;
        self.gateway.send(request.with_token(token)).await
    }

    pub async fn fetch<T>(&self, request: ApiRequest) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let token = self.token().await;
        self.gateway.fetch(request.with_token(token)).await
    }

    /// Classifies a failed call and applies its session side effects.
    pub async fn fail(&self, error: &ApiError) -> ScreenAction {
        self.fail_from(None, error).await
    }

    /// Like [`fail`](Self::fail), remembering `current` so login can return to it after a 401.
    pub async fn fail_from(&self, current: Option<&Route>, error: &ApiError) -> ScreenAction {
        let failure = Failure::classify(error);
        let mut session = self.session.lock().await;
        error_policy::resolve(failure, current, &mut session)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::gateway::test_support::StubTransport;
    use crate::services::projection::FixedClock;
    use crate::services::session::Session;
    use chrono::TimeZone;

    pub fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    pub fn context() -> (ScreenContext, Arc<StubTransport>) {
        let stub = StubTransport::new();
        let context = ScreenContext::new(
            EvalboardConfig::default(),
            Gateway::new(stub.clone()),
            Session::in_memory().shared(),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock(fixed_now())));
        (context, stub)
    }

    pub fn challenge_json(id: u64, start: &str, end: &str) -> Value {
        serde_json::json!({
            "id": id,
            "title": format!("Challenge {id}"),
            "short_description": "",
            "start_date": start,
            "end_date": end,
            "creator": { "id": 1, "team_name": "Hosts" },
            "published": true,
            "approved_by_admin": true,
            "is_active": true
        })
    }

    pub async fn logged_in_context() -> (ScreenContext, Arc<StubTransport>) {
        let (context, stub) = context();
        context.session.lock().await.login("token-1", None).unwrap();
        (context, stub)
    }
}
