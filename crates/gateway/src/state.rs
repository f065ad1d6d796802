//! Application state for dependency injection.

use std::sync::Arc;

use crate::clients::UserClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub user_client: Arc<UserClient>,
}

impl AppState {
    /// Create new app state.
    pub fn new(user_client: Arc<UserClient>) -> Self {
        Self { user_client }
    }
}
