//! Inbound github webhook deliveries.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use log::{info, warn};
use sqlx::SqlitePool;

use crate::{
    error::SyncError,
    models::Issue,
    sync::{self, InboundComment, InboundIssue},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/github/:academy_slug", post(github_issue_webhook))
}

/// Receive an issue event from github. The delivery is logged before anything
/// else and the log record stays whatever reconciliation does.
async fn github_issue_webhook(
    State(state): State<AppState>,
    Path(academy_slug): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<Option<Issue>>, (StatusCode, String)> {
    let webhook = sync::add_webhook(&state.pool, &payload, &academy_slug)
        .await
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    let Some(webhook) = webhook else {
        return Err((StatusCode::BAD_REQUEST, "empty webhook payload".to_owned()));
    };
    info!("github hook called: {}", webhook.webhook_action);

    if payload.get("issue").is_none() {
        warn!("Unhandled webhook payload: {}", webhook.webhook_action);
        return Ok(Json(None));
    }

    let issue = process_issue_event(&state.pool, &webhook.webhook_action, &payload)
        .await
        .map_err(super::sync_error_response)?;

    Ok(Json(issue))
}

/// Reconcile the issue carried by a webhook payload, then apply whatever
/// status the github action itself implies (closed, reopened, deleted).
pub(crate) async fn process_issue_event(
    pool: &SqlitePool,
    action: &str,
    payload: &serde_json::Value,
) -> Result<Option<Issue>, SyncError> {
    let inbound = InboundIssue::from_value(payload);
    let comment = payload.get("comment").and_then(InboundComment::from_value);

    let issue =
        sync::sync_single_issue(pool, &inbound, comment.as_ref(), None, Some(action)).await?;
    let Some(mut issue) = issue else {
        return Ok(None);
    };

    let status = sync::status_for_github_action(action, Some(&issue));
    if status != issue.status {
        sync::change_status(pool, &mut issue, &status).await?;
    }

    Ok(Some(issue))
}
