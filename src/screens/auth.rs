use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::models::AuthToken;
use crate::screens::{Route, ScreenAction, ScreenContext, Toast};
use crate::services::error_policy;
use crate::services::gateway::ApiRequest;

const LOGIN_PATH: &str = "auth/login/";
const LOGOUT_PATH: &str = "auth/logout/";
const REGISTRATION_PATH: &str = "auth/registration/";
const PASSWORD_RESET_PATH: &str = "auth/password/reset/";
const PASSWORD_RESET_CONFIRM_PATH: &str = "auth/password/reset/confirm/";
const REFRESH_TOKEN_PATH: &str = "accounts/user/get_auth_token";

#[derive(Debug, Clone, Serialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetConfirmForm {
    pub uid: String,
    pub token: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Default)]
pub struct AuthViewModel {
    pub is_loader: bool,
    pub form_error: Option<String>,
    pub error_field: Option<String>,
    pub notice: Option<Toast>,
}

impl AuthViewModel {
    fn begin(&mut self) {
        self.is_loader = true;
        self.form_error = None;
        self.error_field = None;
        self.notice = None;
    }

    fn finish(&mut self, action: ScreenAction) -> ScreenAction {
        self.is_loader = false;
        match &action {
            ScreenAction::FormError { field, message } => {
                self.error_field = Some(field.clone());
                self.form_error = Some(message.clone());
            }
            ScreenAction::InlineError(message) => self.form_error = Some(message.clone()),
            ScreenAction::Toast(toast) => self.notice = Some(toast.clone()),
            _ => {}
        }
        action
    }

    pub async fn login(
        &mut self,
        ctx: &ScreenContext,
        username: &str,
        password: &str,
    ) -> ScreenAction {
        self.begin();
        let request = ApiRequest::post(
            LOGIN_PATH,
            json!({ "username": username, "password": password }),
        );
        let auth: AuthToken = match ctx.gateway.fetch(request).await {
            Ok(auth) => auth,
            Err(err) => {
                let action = ctx.fail(&err).await;
                return self.finish(action);
            }
        };

        let refresh = match ctx
            .gateway
            .fetch::<AuthToken>(
                ApiRequest::get(REFRESH_TOKEN_PATH).with_token(Some(auth.token.clone())),
            )
            .await
        {
            Ok(refresh) => Some(refresh.token),
            Err(err) => {
                warn!(error = %err, "refresh token unavailable");
                None
            }
        };

        let mut session = ctx.session.lock().await;
        if let Err(err) = session.login(&auth.token, refresh.as_deref()) {
            drop(session);
            let action = ScreenAction::Toast(Toast::error(err.to_string()));
            return self.finish(action);
        }
        info!(username, "logged in");

        let next = if let Some(key) = session.take_pending_invitation() {
            Route::AcceptInvitation { key }
        } else {
            session.take_redirect().unwrap_or(Route::Dashboard)
        };
        drop(session);
        self.finish(ScreenAction::Navigate(next))
    }

    /// Success navigates to login; a field-keyed 400 fills `form_error` and stays.
    pub async fn signup(&mut self, ctx: &ScreenContext, form: &SignupForm) -> ScreenAction {
        self.begin();
        let body = match serde_json::to_value(form) {
            Ok(body) => body,
            Err(err) => return self.finish(ScreenAction::Toast(Toast::error(err.to_string()))),
        };
        match ctx.gateway.send(ApiRequest::post(REGISTRATION_PATH, body)).await {
            Ok(_) => {
                info!(username = %form.username, "registered");
                self.notice = Some(Toast::success(
                    "Registered successfully. Please verify your email address.",
                ));
                self.is_loader = false;
                ScreenAction::Navigate(Route::Login)
            }
            Err(err) => {
                let action = ctx.fail(&err).await;
                self.finish(action)
            }
        }
    }

    pub async fn reset_password(&mut self, ctx: &ScreenContext, email: &str) -> ScreenAction {
        self.begin();
        let request = ApiRequest::post(PASSWORD_RESET_PATH, json!({ "email": email }));
        let action = match ctx.gateway.send(request).await {
            Ok(body) => ScreenAction::Toast(Toast::success(
                error_policy::body_message(&body)
                    .unwrap_or_else(|| "Password reset e-mail has been sent.".to_string()),
            )),
            Err(err) => ctx.fail(&err).await,
        };
        self.finish(action)
    }

    pub async fn confirm_reset(
        &mut self,
        ctx: &ScreenContext,
        form: &ResetConfirmForm,
    ) -> ScreenAction {
        self.begin();
        let body = match serde_json::to_value(form) {
            Ok(body) => body,
            Err(err) => return self.finish(ScreenAction::Toast(Toast::error(err.to_string()))),
        };
        match ctx
            .gateway
            .send(ApiRequest::post(PASSWORD_RESET_CONFIRM_PATH, body))
            .await
        {
            Ok(_) => {
                self.notice = Some(Toast::success("Your password has been reset."));
                self.is_loader = false;
                ScreenAction::Navigate(Route::Login)
            }
            Err(err) => {
                let action = ctx.fail(&err).await;
                self.finish(action)
            }
        }
    }

    /// The local session is cleared even when the server call fails.
    pub async fn logout(&mut self, ctx: &ScreenContext) -> ScreenAction {
        self.begin();
        if let Err(err) = ctx
            .send(ApiRequest::post(LOGOUT_PATH, json!({})))
            .await
        {
            warn!(error = %err, "server logout failed");
        }
        ctx.session.lock().await.logout();
        self.finish(ScreenAction::Navigate(Route::Login))
    }
}
