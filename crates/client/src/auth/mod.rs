//! Session credentials and the single-flight token refresh.

pub mod refresh;
pub mod session;

pub use refresh::RefreshCoordinator;
pub use session::SessionStore;
