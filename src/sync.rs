//! Reconciliation of inbound github issue state into the local records.

use log::debug;
use sqlx::SqlitePool;

use crate::{
    db,
    error::SyncError,
    github,
    models::{issue_status, webhook_status, Freelancer, Issue, RepositoryIssueWebhook},
    tags, utils, AppState,
};

/// Canonical shape of an inbound issue event. Payloads arrive either as a bare
/// issue object or nested one level under an `issue` key; both collapse into
/// this at the boundary so the reconciler only ever sees one shape.
#[derive(Debug, Clone, Default)]
pub struct InboundIssue {
    pub node_id: Option<String>,
    pub number: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub html_url: Option<String>,
    /// External github ids of the assignees, in payload order
    pub assignee_ids: Vec<i64>,
}

impl InboundIssue {
    pub fn from_value(value: &serde_json::Value) -> InboundIssue {
        let value = value.get("issue").unwrap_or(value);
        InboundIssue {
            node_id: value["node_id"].as_str().map(str::to_owned),
            number: value["number"].as_i64(),
            title: value["title"].as_str().map(str::to_owned),
            body: value["body"].as_str().map(str::to_owned),
            html_url: value["html_url"].as_str().map(str::to_owned),
            assignee_ids: value["assignees"]
                .as_array()
                .map(|assignees| assignees.iter().filter_map(|a| a["id"].as_i64()).collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboundComment {
    pub body: String,
}

impl InboundComment {
    pub fn from_value(value: &serde_json::Value) -> Option<InboundComment> {
        Some(InboundComment {
            body: value["body"].as_str()?.to_owned(),
        })
    }
}

/// Merge one inbound issue into its persisted record.
///
/// Returns `Ok(None)` when the payload carries no node id (silent skip) and
/// the stored issue otherwise. Issues already DONE or IGNORED are returned
/// untouched unless github says the issue was reopened.
pub async fn sync_single_issue(
    pool: &SqlitePool,
    inbound: &InboundIssue,
    comment: Option<&InboundComment>,
    freelancer: Option<&Freelancer>,
    incoming_github_action: Option<&str>,
) -> Result<Option<Issue>, SyncError> {
    let Some(node_id) = inbound.node_id.as_deref() else {
        debug!(
            "Impossible to identify issue because it does not have a node_id (number: {:?}), ignoring sync: {:?}",
            inbound.number, inbound.title
        );
        return Ok(None);
    };

    let mut issue = match db::find_issue_by_node_id(pool, node_id).await? {
        Some(issue) => issue,
        None => Issue::new(node_id),
    };

    if (issue.status == issue_status::DONE || issue.status == issue_status::IGNORED)
        && incoming_github_action != Some("reopened")
    {
        debug!(
            "Ignoring changes to issue {node_id} ({:?}) because status is {} and it is not being reopened: {}",
            inbound.number, issue.status, issue.title
        );
        return Ok(Some(issue));
    }

    if let Some(number) = inbound.number {
        issue.github_number = Some(number);
    }
    if let Some(title) = inbound.title.as_deref() {
        issue.title = utils::truncate_chars(title, 255).to_owned();
    }
    if let Some(body) = inbound.body.as_deref() {
        issue.body = Some(utils::truncate_chars(body, 500).to_owned());
    }
    issue.url = inbound.html_url.clone();

    let mut freelancer_id = freelancer.map(|f| f.id);
    if freelancer_id.is_none() {
        if let Some(&assignee_id) = inbound.assignee_ids.first() {
            match db::find_freelancer_by_github_id(pool, assignee_id).await? {
                Some(f) => freelancer_id = Some(f.id),
                None => {
                    return Err(SyncError::UnknownAssignee {
                        github_id: assignee_id,
                    })
                }
            }
        }
    }
    issue.freelancer_id = freelancer_id;

    // hours come from the stored (already truncated) body
    if let Some(hours) = tags::get_hours(issue.body.as_deref().unwrap_or_default()) {
        if issue.duration_in_hours != hours {
            debug!(
                "Updating issue {node_id} ({:?}) hrs with {hours}, found <hrs> tag on updated body",
                inbound.number
            );
            issue.duration_in_minutes = hours * 60.0;
            issue.duration_in_hours = hours;
        }
    }

    if let Some(comment) = comment {
        // evaluated after the body, so a comment's hours take precedence
        if let Some(hours) = tags::get_hours(&comment.body) {
            if issue.duration_in_hours != hours {
                debug!(
                    "Updating issue {node_id} ({:?}) hrs with {hours}, found <hrs> tag on new comment",
                    inbound.number
                );
                issue.duration_in_minutes = hours * 60.0;
                issue.duration_in_hours = hours;
            }
        }

        if let Some(status) = tags::get_status(&comment.body) {
            debug!(
                "Updating issue {node_id} ({:?}) status to {status}, found <status> tag on new comment",
                inbound.number
            );
            issue.status = status;
        }
    }

    db::save_issue(pool, &mut issue).await?;

    Ok(Some(issue))
}

/// Pull every open issue assigned to the freelancer's github account and
/// reconcile each one. Sequential, a failure mid-run leaves earlier issues
/// committed.
pub async fn sync_user_issues(
    state: &AppState,
    freelancer: &Freelancer,
) -> Result<usize, SyncError> {
    let Some(github_id) = freelancer.github_user_id else {
        return Err(SyncError::MissingGithubUser {
            freelancer_id: freelancer.id,
        });
    };

    let credentials = db::find_github_credentials(&state.pool, github_id)
        .await?
        .ok_or(SyncError::MissingCredentials { github_id })?;

    let open_issues = github::list_assigned_open_issues(state, &credentials.token).await?;

    let mut count = 0;
    for issue in &open_issues {
        sync_single_issue(&state.pool, issue, None, Some(freelancer), None).await?;
        count += 1;
    }
    debug!("{count} issues were synced for github user {github_id}");

    Ok(count)
}

/// Status an issue should move to after a github action.
// Possible github actions: opened, edited, deleted, pinned, unpinned, closed,
// reopened, assigned, unassigned, labeled, unlabeled, locked, unlocked,
// transferred, milestoned, demilestoned.
pub fn status_for_github_action(github_action: &str, issue: Option<&Issue>) -> String {
    let Some(issue) = issue else {
        return issue_status::DRAFT.to_owned();
    };

    // once ignored, stays ignored
    if issue.status == issue_status::IGNORED {
        return issue_status::IGNORED.to_owned();
    }

    match github_action {
        "reopened" => issue_status::TODO.to_owned(),
        "deleted" => issue_status::IGNORED.to_owned(),
        "closed" => issue_status::DONE.to_owned(),
        _ => issue.status.clone(),
    }
}

pub async fn change_status(pool: &SqlitePool, issue: &mut Issue, status: &str) -> sqlx::Result<()> {
    issue.status = status.to_owned();
    db::save_issue(pool, issue).await
}

/// Add one incoming webhook request to the log. Every delivery is recorded,
/// whatever happens to it downstream.
pub async fn add_webhook(
    pool: &SqlitePool,
    context: &serde_json::Value,
    academy_slug: &str,
) -> anyhow::Result<Option<RepositoryIssueWebhook>> {
    let Some(fields) = context.as_object() else {
        return Ok(None);
    };
    if fields.is_empty() {
        return Ok(None);
    }

    let action = fields
        .get("action")
        .and_then(|action| action.as_str())
        .ok_or_else(|| anyhow::anyhow!("webhook payload has no action"))?;

    let mut webhook = RepositoryIssueWebhook {
        id: 0,
        webhook_action: action.to_owned(),
        academy_slug: academy_slug.to_owned(),
        repository: context["repository"]["html_url"].as_str().map(str::to_owned),
        payload: serde_json::to_string(context)?,
        status: webhook_status::PENDING.to_owned(),
        created_at: chrono::Utc::now().naive_utc(),
    };
    db::insert_webhook(pool, &mut webhook).await?;

    Ok(Some(webhook))
}
