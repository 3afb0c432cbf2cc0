use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Well known issue statuses. Stored as plain text rather than an enum since a
/// `<status>` tag in a comment can push any token into the column.
pub mod issue_status {
    pub const DRAFT: &str = "DRAFT";
    pub const TODO: &str = "TODO";
    pub const DOING: &str = "DOING";
    pub const DONE: &str = "DONE";
    pub const IGNORED: &str = "IGNORED";
}

pub mod bill_status {
    /// A freelancer has at most one DUE bill at a time
    pub const DUE: &str = "DUE";
}

pub mod webhook_status {
    pub const PENDING: &str = "PENDING";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Issue {
    pub id: i64,
    /// Stable github node id, used as the dedup key when merging inbound state
    pub node_id: String,
    /// Issue number within its repository
    pub github_number: Option<i64>,
    pub title: String,
    pub body: Option<String>,
    pub url: Option<String>,
    pub status: String,
    /// Diagnostics appended by the billing aggregator
    pub status_message: Option<String>,
    pub duration_in_minutes: f64,
    pub duration_in_hours: f64,
    pub freelancer_id: Option<i64>,
    pub bill_id: Option<i64>,
}

impl Issue {
    /// A freshly sighted issue, not yet persisted (`id` 0 until saved)
    pub fn new(node_id: &str) -> Issue {
        Issue {
            id: 0,
            node_id: node_id.to_owned(),
            github_number: None,
            title: "Untitled".to_owned(),
            body: None,
            url: None,
            status: issue_status::DRAFT.to_owned(),
            status_message: None,
            duration_in_minutes: 0.0,
            duration_in_hours: 0.0,
            freelancer_id: None,
            bill_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Freelancer {
    pub id: i64,
    /// External github account id, if the freelancer has linked one
    pub github_user_id: Option<i64>,
    pub price_per_hour: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: i64,
    pub freelancer_id: i64,
    pub status: String,
    pub total_duration_in_hours: f64,
    pub total_duration_in_minutes: f64,
    pub total_price: f64,
    pub created_at: NaiveDateTime,
}

/// Access token for the github account a freelancer linked
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GithubCredentials {
    pub github_user_id: i64,
    pub token: String,
}

/// Append-only log record of one inbound webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RepositoryIssueWebhook {
    pub id: i64,
    pub webhook_action: String,
    pub academy_slug: String,
    pub repository: Option<String>,
    pub payload: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}
