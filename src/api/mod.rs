pub mod freelancer;
pub mod webhook;

use axum::{http::StatusCode, routing::get, Router};

use crate::{error::SyncError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", webhook::router())
        .nest("/freelancers", freelancer::router())
}

async fn health() -> &'static str {
    "health!"
}

/// Map domain errors onto http responses. The data-integrity aborts are the
/// caller's fault, everything else is ours.
pub(crate) fn sync_error_response(err: SyncError) -> (StatusCode, String) {
    let status = match &err {
        SyncError::UnknownAssignee { .. }
        | SyncError::MissingGithubUser { .. }
        | SyncError::MissingCredentials { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub(crate) fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
