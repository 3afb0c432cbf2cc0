//! Freelancer registration, issue sync and billing routes.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    billing, db,
    models::{Bill, Freelancer, Issue},
    sync, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/:id/credentials", post(store_credentials))
        .route("/:id/issues", get(list_issues))
        .route("/:id/issues/sync", post(sync_issues))
        .route("/:id/bills/generate", post(generate_bill))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub github_user_id: Option<i64>,
    pub price_per_hour: f64,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<Freelancer>, (StatusCode, String)> {
    let freelancer = db::insert_freelancer(&state.pool, body.github_user_id, body.price_per_hour)
        .await
        .map_err(super::internal_error)?;
    Ok(Json(freelancer))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub token: String,
}

/// Store the github access token used for bulk issue fetches
async fn store_credentials(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CredentialsBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    let freelancer = fetch_freelancer(&state, id).await?;
    let Some(github_id) = freelancer.github_user_id else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("freelancer {id} has no github user"),
        ));
    };

    db::upsert_github_credentials(&state.pool, github_id, &body.token)
        .await
        .map_err(super::internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_issues(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Issue>>, (StatusCode, String)> {
    fetch_freelancer(&state, id).await?;
    let issues = db::list_freelancer_issues(&state.pool, id)
        .await
        .map_err(super::internal_error)?;
    Ok(Json(issues))
}

async fn sync_issues(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let freelancer = fetch_freelancer(&state, id).await?;
    let count = sync::sync_user_issues(&state, &freelancer)
        .await
        .map_err(super::sync_error_response)?;
    Ok(Json(json!({ "synced": count })))
}

async fn generate_bill(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Bill>, (StatusCode, String)> {
    let freelancer = fetch_freelancer(&state, id).await?;
    let bill = billing::generate_freelancer_bill(&state.pool, &freelancer)
        .await
        .map_err(super::internal_error)?;
    Ok(Json(bill))
}

async fn fetch_freelancer(
    state: &AppState,
    id: i64,
) -> Result<Freelancer, (StatusCode, String)> {
    db::get_freelancer(&state.pool, id)
        .await
        .map_err(super::internal_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("freelancer {id} not found")))
}
