//! Cross-cutting handling of authentication rejections.

use std::sync::Arc;

use super::navigation::{LOGIN_ROUTE, Navigator};
use super::store::SessionStore;

/// Shared by every remote call: supplies the bearer credential and applies
/// the logout-and-redirect policy when the server rejects it.
#[derive(Clone)]
pub struct AuthGate {
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl AuthGate {
    /// Build a gate over a session store and a navigator.
    #[must_use]
    pub fn new(session: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// The guarded session store.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Credential to attach to the next request, read from durable storage.
    pub async fn bearer_token(&self) -> Option<String> {
        self.session.stored_token().await
    }

    /// Clear the session and send the user to the login entry point.
    pub async fn reject(&self) {
        tracing::warn!("authentication rejected by server, clearing session");
        self.session.logout().await;
        if self.navigator.current_route() != LOGIN_ROUTE {
            self.navigator.navigate(LOGIN_ROUTE);
        }
    }
}
