//! Session lifecycle and the process-wide authentication policy.

pub mod auth_gate;
pub mod navigation;
pub mod store;

pub use auth_gate::AuthGate;
pub use navigation::{CHAT_ROUTE, LOGIN_ROUTE, Navigator, RouteState};
pub use store::SessionStore;
