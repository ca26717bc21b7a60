pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod moods;
pub mod patients;
pub mod posts;

use std::sync::Arc;

use tracing::error;

use solace_db::Database;
use solace_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;

/// Upper bound for post, comment and message bodies, in characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("worker task failed"))
        })?
        .map_err(ApiError::from)
}

/// Trim user-authored text and enforce the shared length rules.
pub(crate) fn validate_content(raw: &str) -> Result<String, ApiError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Content must not be empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Content must be at most {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(content.to_string())
}
