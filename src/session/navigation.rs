//! Route tracking for forced redirects.

use tokio::sync::watch;

/// Entry point for signing in.
pub const LOGIN_ROUTE: &str = "/login";
/// Main chat view.
pub const CHAT_ROUTE: &str = "/chat";

/// Where the front-end currently is, and how to move it.
pub trait Navigator: Send + Sync {
    /// Current route path.
    fn current_route(&self) -> String;
    /// Move to `route`.
    fn navigate(&self, route: &str);
}

/// Route holder observable through a watch channel.
#[derive(Debug)]
pub struct RouteState {
    tx: watch::Sender<String>,
}

impl RouteState {
    /// Start at `initial`.
    #[must_use]
    pub fn new(initial: &str) -> Self {
        let (tx, _rx) = watch::channel(initial.to_string());
        Self { tx }
    }

    /// Observe route changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for RouteState {
    fn default() -> Self {
        Self::new(LOGIN_ROUTE)
    }
}

impl Navigator for RouteState {
    fn current_route(&self) -> String {
        self.tx.borrow().clone()
    }

    fn navigate(&self, route: &str) {
        tracing::debug!("navigating to {route}");
        self.tx.send_replace(route.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_notifies_subscribers() {
        let routes = RouteState::new(CHAT_ROUTE);
        let mut rx = routes.subscribe();

        routes.navigate(LOGIN_ROUTE);
        assert_eq!(routes.current_route(), LOGIN_ROUTE);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LOGIN_ROUTE);
    }
}
