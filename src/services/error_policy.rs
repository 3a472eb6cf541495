use serde_json::Value;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::screens::{Route, ScreenAction, Toast};
use crate::services::session::Session;

pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";
pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
pub const EXPIRED_MESSAGE: &str = "This link has expired.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Unauthorized,
    Forbidden { detail: String },
    NotFound { message: String },
    Expired { message: String },
    /// First message per field, in body order.
    Validation { fields: Vec<(String, String)> },
    Unclassified { message: String },
}

impl Failure {
    pub fn classify(error: &ApiError) -> Self {
        let ApiError::Status { status, body } = error else {
            return Failure::Unclassified {
                message: error.to_string(),
            };
        };

        match *status {
            401 => Failure::Unauthorized,
            403 => Failure::Forbidden {
                detail: body_message(body).unwrap_or_else(|| PERMISSION_DENIED_MESSAGE.to_string()),
            },
            404 => Failure::NotFound {
                message: body_message(body).unwrap_or_else(|| NOT_FOUND_MESSAGE.to_string()),
            },
            410 => Failure::Expired {
                message: body_message(body).unwrap_or_else(|| EXPIRED_MESSAGE.to_string()),
            },
            400 => match field_errors(body) {
                Some(fields) => Failure::Validation { fields },
                None => Failure::Unclassified {
                    message: body_message(body).unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
                },
            },
            _ => Failure::Unclassified {
                message: body_message(body).unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            },
        }
    }

    pub fn field_message(&self, field: &str) -> Option<&str> {
        match self {
            Failure::Validation { fields } => fields
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, message)| message.as_str()),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Failure::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Failure::Forbidden { detail } => detail.clone(),
            Failure::NotFound { message }
            | Failure::Expired { message }
            | Failure::Unclassified { message } => message.clone(),
            Failure::Validation { fields } => fields
                .first()
                .map(|(_, message)| message.clone())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
        }
    }
}

/// Maps a failure to what the user sees, applying its session side effects.
pub fn resolve(failure: Failure, current: Option<&Route>, session: &mut Session) -> ScreenAction {
    match failure {
        Failure::Unauthorized => {
            session.logout();
            if let Some(route) = current
                && let Err(err) = session.remember_redirect(route)
            {
                warn!(error = %err, "failed to remember redirect");
            }
            info!("unauthorized response, redirecting to login");
            ScreenAction::Navigate(Route::Login)
        }
        Failure::Forbidden { detail } => {
            if let Err(err) = session.store_error_detail(&detail) {
                warn!(error = %err, "failed to store permission error detail");
            }
            ScreenAction::Navigate(Route::PermissionDenied)
        }
        Failure::NotFound { message } | Failure::Expired { message } => {
            ScreenAction::InlineError(message)
        }
        Failure::Validation { mut fields } => {
            if fields.is_empty() {
                return ScreenAction::Toast(Toast::error(FALLBACK_MESSAGE));
            }
            let (field, message) = fields.swap_remove(0);
            ScreenAction::FormError { field, message }
        }
        Failure::Unclassified { message } => ScreenAction::Toast(Toast::error(message)),
    }
}

/// The `detail`, `error`, or bare-string message of an error body.
pub fn body_message(body: &Value) -> Option<String> {
    match body {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Object(map) => ["detail", "error", "message"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|value| match value {
                Value::String(message) => Some(message.clone()),
                Value::Array(items) => first_string(items),
                _ => None,
            }),
        _ => None,
    }
}

/// `Some` when at least one value in the body is a list of messages.
fn field_errors(body: &Value) -> Option<Vec<(String, String)>> {
    let Value::Object(map) = body else {
        return None;
    };
    let fields: Vec<(String, String)> = map
        .iter()
        .filter_map(|(field, value)| match value {
            Value::Array(items) => first_string(items).map(|message| (field.clone(), message)),
            _ => None,
        })
        .collect();
    if fields.is_empty() { None } else { Some(fields) }
}

fn first_string(items: &[Value]) -> Option<String> {
    items.iter().find_map(|item| item.as_str().map(str::to_string))
}
