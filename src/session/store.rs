//! Session store: the signed-in identity and its durable mirror.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::{AuthReply, ChatApi, Credentials};
use crate::core::errors::{ApiError, ApiResult, StorageResult};
use crate::core::model::{Session, UserIdentity};
use crate::storage::{AUTH_TOKEN_KEY, DurableStorage, USER_KEY};

/// Fallback text for a failed login.
const LOGIN_FAILED: &str = "Login failed";
/// Fallback text for a failed registration.
const REGISTRATION_FAILED: &str = "Registration failed";

/// Holds the authenticated identity.
///
/// The in-memory copy changes only through `establish`, `login`,
/// `register` and `logout`. Durable storage may be changed underneath by
/// other processes sharing it, so authentication is re-checked there.
pub struct SessionStore {
    storage: Arc<dyn DurableStorage>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Create a store with no session, without reading storage.
    #[must_use]
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            storage,
            current: RwLock::new(None),
        }
    }

    /// Create a store initialised from durable storage.
    ///
    /// A stored user that cannot be parsed, or a token without a user (or
    /// the reverse), clears storage and starts signed out.
    pub async fn restore(storage: Arc<dyn DurableStorage>) -> Self {
        let store = Self::new(storage);

        let token = store.read_key(AUTH_TOKEN_KEY).await;
        let user = store.read_key(USER_KEY).await;

        match (token, user) {
            (Some(token), Some(raw_user)) => match serde_json::from_str::<UserIdentity>(&raw_user) {
                Ok(user) => {
                    tracing::info!("restored session for {}", user.username);
                    *store.current.write().await = Some(Session { user, token });
                }
                Err(err) => {
                    tracing::error!("failed to parse stored user: {err}");
                    store.logout().await;
                }
            },
            (None, None) => {}
            _ => {
                tracing::warn!("partial session in storage, clearing it");
                store.logout().await;
            }
        }

        store
    }

    /// The current session, if any.
    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// The signed-in user, if any.
    pub async fn current_user(&self) -> Option<UserIdentity> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// Token as currently held in durable storage.
    pub async fn stored_token(&self) -> Option<String> {
        self.read_key(AUTH_TOKEN_KEY).await
    }

    /// True iff a session is held in memory and a token is still stored.
    pub async fn is_authenticated(&self) -> bool {
        if self.current.read().await.is_none() {
            return false;
        }
        self.stored_token().await.is_some()
    }

    /// Persist and adopt a session.
    ///
    /// # Errors
    /// Returns an error if durable storage cannot be written; the in-memory
    /// session is left untouched in that case.
    pub async fn establish(&self, session: Session) -> StorageResult<()> {
        let user_json = serde_json::to_string(&session.user)?;
        self.storage.set(AUTH_TOKEN_KEY, &session.token).await?;
        if let Err(err) = self.storage.set(USER_KEY, &user_json).await {
            self.remove_key(AUTH_TOKEN_KEY).await;
            return Err(err);
        }

        tracing::info!("session established for {}", session.user.username);
        *self.current.write().await = Some(session);
        Ok(())
    }

    /// Sign in.
    ///
    /// # Errors
    /// Returns a human-readable message on any failure; the session is unchanged.
    pub async fn login(
        &self,
        api: &dyn ChatApi,
        username: &str,
        password: &str,
    ) -> Result<UserIdentity, String> {
        let reply = api.login(Credentials::new(username, password)).await;
        self.adopt_auth_reply(reply, username, LOGIN_FAILED).await
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    /// Returns a human-readable message on any failure; the session is unchanged.
    pub async fn register(
        &self,
        api: &dyn ChatApi,
        username: &str,
        password: &str,
    ) -> Result<UserIdentity, String> {
        let reply = api.register(Credentials::new(username, password)).await;
        self.adopt_auth_reply(reply, username, REGISTRATION_FAILED)
            .await
    }

    /// Clear durable storage and the in-memory session. Never fails.
    pub async fn logout(&self) {
        self.remove_key(AUTH_TOKEN_KEY).await;
        self.remove_key(USER_KEY).await;
        let previous = self.current.write().await.take();
        if let Some(session) = previous {
            tracing::info!("signed out {}", session.user.username);
        }
    }

    async fn adopt_auth_reply(
        &self,
        reply: ApiResult<AuthReply>,
        username: &str,
        fallback: &str,
    ) -> Result<UserIdentity, String> {
        let session = reply
            .and_then(|reply| reply.into_session(username))
            .map_err(|err| {
                tracing::error!("{fallback}: {err}");
                auth_failure_message(&err, fallback)
            })?;

        let user = session.user.clone();
        self.establish(session).await.map_err(|err| {
            tracing::error!("failed to persist session: {err}");
            fallback.to_string()
        })?;
        Ok(user)
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("failed to read {key} from storage: {err}");
                None
            }
        }
    }

    async fn remove_key(&self, key: &str) {
        if let Err(err) = self.storage.remove(key).await {
            tracing::warn!("failed to remove {key} from storage: {err}");
        }
    }
}

fn auth_failure_message(err: &ApiError, fallback: &str) -> String {
    match err {
        ApiError::Server {
            message: Some(message),
            ..
        }
        | ApiError::AuthRejected {
            message: Some(message),
        } if !message.trim().is_empty() => message.clone(),
        ApiError::NetworkUnreachable(_) => err.user_message(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockChatApi;
    use crate::core::ids::UserId;
    use crate::storage::MemoryStorage;

    fn auth_reply(token: &str, username: &str, user_id: i64) -> AuthReply {
        AuthReply {
            token: Some(token.to_string()),
            username: Some(username.to_string()),
            user_id: Some(user_id),
        }
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        let api = MockChatApi::new();
        api.push_login(Ok(auth_reply("tok", "ada", 5)));

        let user = store.login(&api, "ada", "pw").await.unwrap();

        assert_eq!(user.id, UserId::new(5));
        assert!(store.is_authenticated().await);
        assert_eq!(storage.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok"));
        let stored: serde_json::Value =
            serde_json::from_str(&storage.get(USER_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, serde_json::json!({ "id": 5, "username": "ada" }));
    }

    #[tokio::test]
    async fn test_login_failure_uses_server_message() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let api = MockChatApi::new();
        api.push_login(Err(ApiError::server(
            reqwest::StatusCode::BAD_REQUEST,
            Some("Invalid username or password".to_string()),
        )));
        api.push_login(Err(ApiError::server(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            None,
        )));

        let first = store.login(&api, "ada", "bad").await.unwrap_err();
        assert_eq!(first, "Invalid username or password");
        let second = store.login(&api, "ada", "bad").await.unwrap_err();
        assert_eq!(second, LOGIN_FAILED);
        assert!(!store.is_authenticated().await);
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn test_register_network_failure_wording() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let api = MockChatApi::new();
        api.push_register(Err(ApiError::NetworkUnreachable("refused".to_string())));

        let message = store.register(&api, "ada", "pw").await.unwrap_err();
        assert!(message.contains("check your connection"));
    }

    #[tokio::test]
    async fn test_register_malformed_reply_fails() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let api = MockChatApi::new();
        api.push_register(Ok(AuthReply::default()));

        let message = store.register(&api, "ada", "pw").await.unwrap_err();
        assert_eq!(message, REGISTRATION_FAILED);
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        let api = MockChatApi::new();
        api.push_login(Ok(auth_reply("tok", "ada", 5)));
        store.login(&api, "ada", "pw").await.unwrap();

        store.logout().await;

        assert!(!store.is_authenticated().await);
        assert!(store.current_user().await.is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_external_token_removal_deauthenticates() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        let api = MockChatApi::new();
        api.push_login(Ok(auth_reply("tok", "ada", 5)));
        store.login(&api, "ada", "pw").await.unwrap();

        storage.remove(AUTH_TOKEN_KEY).await.unwrap();

        assert!(!store.is_authenticated().await);
        assert!(store.current().await.is_some());
    }

    #[tokio::test]
    async fn test_restore_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(AUTH_TOKEN_KEY, "tok").await.unwrap();
        storage
            .set(USER_KEY, r#"{"username":"ada","id":9}"#)
            .await
            .unwrap();

        let store = SessionStore::restore(storage).await;
        let session = store.current().await.unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.user.id, UserId::new(9));
        assert!(store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_restore_with_corrupt_user_clears_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(AUTH_TOKEN_KEY, "tok").await.unwrap();
        storage.set(USER_KEY, "{not json").await.unwrap();

        let store = SessionStore::restore(storage.clone()).await;
        assert!(store.current().await.is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_restore_with_token_only_clears_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(AUTH_TOKEN_KEY, "tok").await.unwrap();

        let store = SessionStore::restore(storage.clone()).await;
        assert!(!store.is_authenticated().await);
        assert!(storage.is_empty());
    }
}
