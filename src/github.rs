//! Calls against the github REST API.

use log::debug;
use reqwest::Method;

use crate::{error::SyncError, sync::InboundIssue, AppState};

const PER_PAGE: usize = 100;

/// Fetch all currently open issues assigned to the authenticated user,
/// walking pages until github returns a short one.
pub async fn list_assigned_open_issues(
    state: &AppState,
    token: &str,
) -> Result<Vec<InboundIssue>, SyncError> {
    let mut issues = Vec::new();

    for page in 1.. {
        let url = format!(
            "{}/user/issues?filter=assigned&state=open&per_page={PER_PAGE}&page={page}",
            state.github_api_base
        );
        let res = state.reqwest_github(Method::GET, &url, token).send().await?;

        let body = res.json::<serde_json::Value>().await?;
        let issues_raw = body.as_array().ok_or_else(|| SyncError::UnexpectedResponse {
            body: body.to_string(),
        })?;

        issues.extend(issues_raw.iter().map(InboundIssue::from_value));

        if issues_raw.len() < PER_PAGE {
            break;
        }
    }
    debug!("fetched {} open issues from github", issues.len());

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::db;

    async fn issues_page(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let issues: Vec<Value> = match page {
            1 => (0..PER_PAGE)
                .map(|i| json!({"node_id": format!("page1-{i}"), "number": i}))
                .collect(),
            2 => vec![json!({"node_id": "page2-0", "number": PER_PAGE})],
            _ => vec![],
        };
        Json(Value::Array(issues))
    }

    #[tokio::test]
    async fn walks_every_page_of_open_issues() {
        let router = Router::new().route("/user/issues", get(issues_page));
        let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
            .serve(router.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);

        let state = AppState {
            pool: db::test_pool().await,
            reqwest: reqwest::Client::new(),
            github_api_base: format!("http://{addr}"),
        };

        let issues = list_assigned_open_issues(&state, "token").await.unwrap();

        // a full first page plus the one issue on the second
        assert_eq!(issues.len(), PER_PAGE + 1);
        assert_eq!(issues[0].node_id.as_deref(), Some("page1-0"));
        assert_eq!(issues.last().unwrap().node_id.as_deref(), Some("page2-0"));
    }
}
