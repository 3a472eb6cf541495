use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::screens::Route;

pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    UserKey,
    RefreshJwt,
    EmailError,
    ChallengeHostTeamId,
    PendingInvitationKey,
    RedirectAfterLogin,
    CookieConsent,
}

impl StorageKey {
    pub const ALL: [StorageKey; 7] = [
        StorageKey::UserKey,
        StorageKey::RefreshJwt,
        StorageKey::EmailError,
        StorageKey::ChallengeHostTeamId,
        StorageKey::PendingInvitationKey,
        StorageKey::RedirectAfterLogin,
        StorageKey::CookieConsent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::UserKey => "userKey",
            StorageKey::RefreshJwt => "refreshJWT",
            StorageKey::EmailError => "emailError",
            StorageKey::ChallengeHostTeamId => "challengeHostTeamId",
            StorageKey::PendingInvitationKey => "pendingInvitationKey",
            StorageKey::RedirectAfterLogin => "redirectAfterLogin",
            StorageKey::CookieConsent => "cookie_consent",
        }
    }
}

pub trait KeyValueStore: Send {
    fn get(&self, key: StorageKey) -> Option<String>;
    fn set(&mut self, key: StorageKey, value: String) -> Result<(), ApiError>;
    fn remove(&mut self, key: StorageKey) -> Result<(), ApiError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StorageKey, value: String) -> Result<(), ApiError> {
        self.values.insert(key.as_str().to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: StorageKey) -> Result<(), ApiError> {
        self.values.remove(key.as_str());
        Ok(())
    }
}

/// JSON object on disk, rewritten after every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        let path = path.into();
        if !path.exists() {
            debug!("session file not found, starting empty: {}", path.display());
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|err| {
            ApiError::Storage(format!("Failed to read {}: {}", path.display(), err))
        })?;
        let values = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&raw).map_err(|err| {
                ApiError::Storage(format!("Failed to parse {}: {}", path.display(), err))
            })?
        };
        Ok(Self { path, values })
    }

    fn persist(&self) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                ApiError::Storage(format!("Failed to create {}: {}", parent.display(), err))
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.values)
            .map_err(|err| ApiError::Storage(err.to_string()))?;
        fs::write(&self.path, raw).map_err(|err| {
            ApiError::Storage(format!("Failed to write {}: {}", self.path.display(), err))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StorageKey, value: String) -> Result<(), ApiError> {
        self.values.insert(key.as_str().to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: StorageKey) -> Result<(), ApiError> {
        if self.values.remove(key.as_str()).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// Explicit replacement for the root-scope auth flags: populated by `login`,
/// cleared by `logout` or a 401.
pub struct Session {
    store: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("is_auth", &self.is_auth())
            .finish()
    }
}

impl Session {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn get(&self, key: StorageKey) -> Option<String> {
        self.store.get(key)
    }

    pub fn is_auth(&self) -> bool {
        self.token().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(StorageKey::UserKey).filter(|token| !token.is_empty())
    }

    pub fn login(&mut self, token: &str, refresh_jwt: Option<&str>) -> Result<(), ApiError> {
        self.store.set(StorageKey::UserKey, token.to_string())?;
        if let Some(refresh) = refresh_jwt {
            self.store.set(StorageKey::RefreshJwt, refresh.to_string())?;
        }
        info!("session populated");
        Ok(())
    }

    /// Clears every key except cookie consent.
    pub fn logout(&mut self) {
        for key in StorageKey::ALL {
            if key == StorageKey::CookieConsent {
                continue;
            }
            if let Err(err) = self.store.remove(key) {
                warn!(key = key.as_str(), error = %err, "failed to clear session key");
            }
        }
        info!("session cleared");
    }

    pub fn remember_redirect(&mut self, route: &Route) -> Result<(), ApiError> {
        let raw = serde_json::to_string(route).map_err(|err| ApiError::Storage(err.to_string()))?;
        self.store.set(StorageKey::RedirectAfterLogin, raw)
    }

    pub fn take_redirect(&mut self) -> Option<Route> {
        let raw = self.take(StorageKey::RedirectAfterLogin)?;
        match serde_json::from_str(&raw) {
            Ok(route) => Some(route),
            Err(err) => {
                warn!(error = %err, "discarding unreadable redirect");
                None
            }
        }
    }

    pub fn store_error_detail(&mut self, detail: &str) -> Result<(), ApiError> {
        self.store.set(StorageKey::EmailError, detail.to_string())
    }

    pub fn take_error_detail(&mut self) -> Option<String> {
        self.take(StorageKey::EmailError)
    }

    pub fn set_host_team(&mut self, team_id: u64) -> Result<(), ApiError> {
        self.store
            .set(StorageKey::ChallengeHostTeamId, team_id.to_string())
    }

    pub fn host_team(&self) -> Option<u64> {
        self.store
            .get(StorageKey::ChallengeHostTeamId)
            .and_then(|raw| raw.parse().ok())
    }

    pub fn set_pending_invitation(&mut self, key: &str) -> Result<(), ApiError> {
        self.store
            .set(StorageKey::PendingInvitationKey, key.to_string())
    }

    pub fn take_pending_invitation(&mut self) -> Option<String> {
        self.take(StorageKey::PendingInvitationKey)
    }

    pub fn cookie_consent(&self) -> bool {
        self.store
            .get(StorageKey::CookieConsent)
            .is_some_and(|raw| raw == "true")
    }

    pub fn set_cookie_consent(&mut self, accepted: bool) -> Result<(), ApiError> {
        self.store
            .set(StorageKey::CookieConsent, accepted.to_string())
    }

    fn take(&mut self, key: StorageKey) -> Option<String> {
        let value = self.store.get(key)?;
        if let Err(err) = self.store.remove(key) {
            warn!(key = key.as_str(), error = %err, "failed to remove session key");
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_then_logout() {
        let mut session = Session::in_memory();
        assert!(!session.is_auth());

        session.login("abc", Some("jwt")).unwrap();
        session.set_cookie_consent(true).unwrap();
        session.set_host_team(9).unwrap();
        assert!(session.is_auth());
        assert_eq!(session.token().as_deref(), Some("abc"));
        assert_eq!(session.host_team(), Some(9));

        session.logout();
        assert!(!session.is_auth());
        assert_eq!(session.get(StorageKey::RefreshJwt), None);
        assert_eq!(session.host_team(), None);
        assert!(session.cookie_consent());
    }

    #[test]
    fn test_redirect_is_taken_once() {
        let mut session = Session::in_memory();
        session
            .remember_redirect(&Route::Leaderboard { phase_split_id: 12 })
            .unwrap();
        assert_eq!(
            session.take_redirect(),
            Some(Route::Leaderboard { phase_split_id: 12 })
        );
        assert_eq!(session.take_redirect(), None);
    }

    #[test]
    fn test_storage_key_names() {
        assert_eq!(StorageKey::UserKey.as_str(), "userKey");
        assert_eq!(StorageKey::RefreshJwt.as_str(), "refreshJWT");
        assert_eq!(StorageKey::CookieConsent.as_str(), "cookie_consent");
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("evalboard-session-{}", std::process::id()));
        let path = dir.join("session.json");
        let _ = fs::remove_dir_all(&dir);

        {
            let mut store = FileStore::open(&path).unwrap();
            store.set(StorageKey::UserKey, "token-1".to_string()).unwrap();
            store
                .set(StorageKey::PendingInvitationKey, "invite".to_string())
                .unwrap();
            store.remove(StorageKey::PendingInvitationKey).unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(StorageKey::UserKey).as_deref(), Some("token-1"));
        assert_eq!(reopened.get(StorageKey::PendingInvitationKey), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
