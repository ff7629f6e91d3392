//! Client state shared by the front-end.

use std::sync::Arc;

use crate::api::{ChatApi, HttpChatApi};
use crate::core::config::ClientConfig;
use crate::core::errors::ChatResult;
use crate::directory::ConversationDirectory;
use crate::exchange::MessageExchange;
use crate::session::{AuthGate, CHAT_ROUTE, LOGIN_ROUTE, Navigator, RouteState, SessionStore};
use crate::storage::{DurableStorage, SqliteStorage};

/// Everything a front-end needs, wired together once at startup.
pub struct ClientState {
    /// Effective configuration.
    pub config: ClientConfig,
    /// Signed-in identity.
    pub session: Arc<SessionStore>,
    /// Current route, observable for forced redirects.
    pub routes: Arc<RouteState>,
    /// Remote backend.
    pub api: Arc<dyn ChatApi>,
    /// Conversation list and selection.
    pub directory: Arc<ConversationDirectory>,
    /// Message sending.
    pub exchange: Arc<MessageExchange>,
}

impl ClientState {
    /// Open durable storage, restore the session and connect to the backend.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, storage cannot be
    /// opened or the HTTP client cannot be built.
    pub async fn initialize(config: ClientConfig) -> ChatResult<Arc<Self>> {
        config.validate()?;
        let storage = SqliteStorage::open(&config.storage_path).await?;
        tracing::info!("durable storage at {}", config.storage_path.display());

        let http_config = config.clone();
        Self::assemble(config, Arc::new(storage), move |gate| {
            let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(&http_config, gate)?);
            Ok(api)
        })
        .await
    }

    /// Wire the components over `storage`, building the API from the auth gate.
    ///
    /// The session is restored from storage first; the initial route is the
    /// chat view when that yields an authenticated session.
    ///
    /// # Errors
    /// Returns whatever `make_api` returns.
    pub async fn assemble<F>(
        config: ClientConfig,
        storage: Arc<dyn DurableStorage>,
        make_api: F,
    ) -> ChatResult<Arc<Self>>
    where
        F: FnOnce(AuthGate) -> ChatResult<Arc<dyn ChatApi>>,
    {
        let session = Arc::new(SessionStore::restore(storage).await);
        let initial = if session.is_authenticated().await {
            CHAT_ROUTE
        } else {
            LOGIN_ROUTE
        };
        let routes = Arc::new(RouteState::new(initial));
        let navigator: Arc<dyn Navigator> = routes.clone();
        let gate = AuthGate::new(session.clone(), navigator);

        let api = make_api(gate)?;
        let directory = Arc::new(ConversationDirectory::new(api.clone()));
        let exchange = Arc::new(MessageExchange::new(
            api.clone(),
            directory.clone(),
            config.max_upload_bytes,
        ));

        Ok(Arc::new(Self {
            config,
            session,
            routes,
            api,
            directory,
            exchange,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockChatApi;
    use crate::storage::{AUTH_TOKEN_KEY, MemoryStorage, USER_KEY};

    fn mock_api(gate: AuthGate) -> ChatResult<Arc<dyn ChatApi>> {
        Ok(Arc::new(MockChatApi::new().with_gate(gate)))
    }

    #[tokio::test]
    async fn test_initial_route_follows_restored_session() {
        let storage = Arc::new(MemoryStorage::new());
        let state = ClientState::assemble(ClientConfig::new(), storage.clone(), mock_api)
            .await
            .unwrap();
        assert_eq!(state.routes.current_route(), LOGIN_ROUTE);

        storage.set(AUTH_TOKEN_KEY, "tok").await.unwrap();
        storage
            .set(USER_KEY, r#"{"id":1,"username":"ada"}"#)
            .await
            .unwrap();
        let state = ClientState::assemble(ClientConfig::new(), storage, mock_api)
            .await
            .unwrap();
        assert_eq!(state.routes.current_route(), CHAT_ROUTE);
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_config() {
        let config = ClientConfig::new().with_api_base_url("ftp://example.com");
        assert!(ClientState::initialize(config).await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_with_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new().with_storage_path(dir.path().join("client.sqlite"));

        let state = ClientState::initialize(config).await.unwrap();
        assert!(!state.session.is_authenticated().await);
    }
}
