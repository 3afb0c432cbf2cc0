use std::str::FromStr;

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::models::{
    bill_status, issue_status, Bill, Freelancer, GithubCredentials, Issue, RepositoryIssueWebhook,
};

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    info!("Successfully connected to database");

    Ok(pool)
}

// The partial index on bills closes the race where two concurrent aggregation
// runs would each open a bill for the same freelancer.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS freelancers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    github_user_id INTEGER,
    price_per_hour REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS github_credentials (
    github_user_id INTEGER PRIMARY KEY,
    token TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    freelancer_id INTEGER NOT NULL REFERENCES freelancers (id),
    status TEXT NOT NULL DEFAULT 'DUE',
    total_duration_in_hours REAL NOT NULL DEFAULT 0.0,
    total_duration_in_minutes REAL NOT NULL DEFAULT 0.0,
    total_price REAL NOT NULL DEFAULT 0.0,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_one_open_per_freelancer
    ON bills (freelancer_id) WHERE status = 'DUE';

CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id TEXT NOT NULL UNIQUE,
    github_number INTEGER,
    title TEXT NOT NULL DEFAULT 'Untitled',
    body TEXT,
    url TEXT,
    status TEXT NOT NULL DEFAULT 'DRAFT',
    status_message TEXT,
    duration_in_minutes REAL NOT NULL DEFAULT 0.0,
    duration_in_hours REAL NOT NULL DEFAULT 0.0,
    freelancer_id INTEGER REFERENCES freelancers (id),
    bill_id INTEGER REFERENCES bills (id)
);

CREATE TABLE IF NOT EXISTS repository_issue_webhooks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    webhook_action TEXT NOT NULL,
    academy_slug TEXT NOT NULL,
    repository TEXT,
    payload TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    created_at TEXT NOT NULL
);
"#;

/// Initialize database
pub async fn migrate(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

pub async fn find_issue_by_node_id(pool: &SqlitePool, node_id: &str) -> sqlx::Result<Option<Issue>> {
    sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE node_id = ?")
        .bind(node_id)
        .fetch_optional(pool)
        .await
}

/// Insert the issue when it has never been saved (`id` 0), update it otherwise
pub async fn save_issue(pool: &SqlitePool, issue: &mut Issue) -> sqlx::Result<()> {
    if issue.id == 0 {
        let res = sqlx::query(
            "INSERT INTO issues (node_id, github_number, title, body, url, status, \
             status_message, duration_in_minutes, duration_in_hours, freelancer_id, bill_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&issue.node_id)
        .bind(issue.github_number)
        .bind(&issue.title)
        .bind(&issue.body)
        .bind(&issue.url)
        .bind(&issue.status)
        .bind(&issue.status_message)
        .bind(issue.duration_in_minutes)
        .bind(issue.duration_in_hours)
        .bind(issue.freelancer_id)
        .bind(issue.bill_id)
        .execute(pool)
        .await?;
        issue.id = res.last_insert_rowid();
    } else {
        sqlx::query(
            "UPDATE issues SET node_id = ?, github_number = ?, title = ?, body = ?, url = ?, \
             status = ?, status_message = ?, duration_in_minutes = ?, duration_in_hours = ?, \
             freelancer_id = ?, bill_id = ? WHERE id = ?",
        )
        .bind(&issue.node_id)
        .bind(issue.github_number)
        .bind(&issue.title)
        .bind(&issue.body)
        .bind(&issue.url)
        .bind(&issue.status)
        .bind(&issue.status_message)
        .bind(issue.duration_in_minutes)
        .bind(issue.duration_in_hours)
        .bind(issue.freelancer_id)
        .bind(issue.bill_id)
        .bind(issue.id)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn insert_freelancer(
    pool: &SqlitePool,
    github_user_id: Option<i64>,
    price_per_hour: f64,
) -> sqlx::Result<Freelancer> {
    let res = sqlx::query("INSERT INTO freelancers (github_user_id, price_per_hour) VALUES (?, ?)")
        .bind(github_user_id)
        .bind(price_per_hour)
        .execute(pool)
        .await?;
    Ok(Freelancer {
        id: res.last_insert_rowid(),
        github_user_id,
        price_per_hour,
    })
}

pub async fn get_freelancer(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Freelancer>> {
    sqlx::query_as::<_, Freelancer>("SELECT * FROM freelancers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_freelancer_by_github_id(
    pool: &SqlitePool,
    github_user_id: i64,
) -> sqlx::Result<Option<Freelancer>> {
    sqlx::query_as::<_, Freelancer>("SELECT * FROM freelancers WHERE github_user_id = ?")
        .bind(github_user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_freelancer_issues(
    pool: &SqlitePool,
    freelancer_id: i64,
) -> sqlx::Result<Vec<Issue>> {
    sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE freelancer_id = ? ORDER BY id")
        .bind(freelancer_id)
        .fetch_all(pool)
        .await
}

pub async fn upsert_github_credentials(
    pool: &SqlitePool,
    github_user_id: i64,
    token: &str,
) -> sqlx::Result<()> {
    sqlx::query("INSERT OR REPLACE INTO github_credentials (github_user_id, token) VALUES (?, ?)")
        .bind(github_user_id)
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find_github_credentials(
    pool: &SqlitePool,
    github_user_id: i64,
) -> sqlx::Result<Option<GithubCredentials>> {
    sqlx::query_as::<_, GithubCredentials>(
        "SELECT * FROM github_credentials WHERE github_user_id = ?",
    )
    .bind(github_user_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_open_bill(pool: &SqlitePool, freelancer_id: i64) -> sqlx::Result<Option<Bill>> {
    sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE freelancer_id = ? AND status = ?")
        .bind(freelancer_id)
        .bind(bill_status::DUE)
        .fetch_optional(pool)
        .await
}

pub async fn create_bill(pool: &SqlitePool, freelancer_id: i64) -> sqlx::Result<Bill> {
    let created_at = chrono::Utc::now().naive_utc();
    let res = sqlx::query("INSERT INTO bills (freelancer_id, created_at) VALUES (?, ?)")
        .bind(freelancer_id)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(Bill {
        id: res.last_insert_rowid(),
        freelancer_id,
        status: bill_status::DUE.to_owned(),
        total_duration_in_hours: 0.0,
        total_duration_in_minutes: 0.0,
        total_price: 0.0,
        created_at,
    })
}

pub async fn update_bill_totals(pool: &SqlitePool, bill: &Bill) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE bills SET total_duration_in_hours = ?, total_duration_in_minutes = ?, \
         total_price = ? WHERE id = ?",
    )
    .bind(bill.total_duration_in_hours)
    .bind(bill.total_duration_in_minutes)
    .bind(bill.total_price)
    .bind(bill.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// A bill may only hold issues that are presently DONE, anything that
/// regressed is detached before the next aggregation
pub async fn detach_unfinished_issues(pool: &SqlitePool, freelancer_id: i64) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE issues SET bill_id = NULL \
         WHERE freelancer_id = ? AND bill_id IS NOT NULL AND status != ?",
    )
    .bind(freelancer_id)
    .bind(issue_status::DONE)
    .execute(pool)
    .await?;
    Ok(())
}

/// DONE issues that are unbilled or attached to a still-open bill
pub async fn billable_issues(pool: &SqlitePool, freelancer_id: i64) -> sqlx::Result<Vec<Issue>> {
    sqlx::query_as::<_, Issue>(
        "SELECT issues.* FROM issues \
         LEFT JOIN bills ON issues.bill_id = bills.id \
         WHERE issues.freelancer_id = ? AND issues.status = ? \
         AND (issues.bill_id IS NULL OR bills.status = ?) \
         ORDER BY issues.id",
    )
    .bind(freelancer_id)
    .bind(issue_status::DONE)
    .bind(bill_status::DUE)
    .fetch_all(pool)
    .await
}

pub async fn insert_webhook(
    pool: &SqlitePool,
    webhook: &mut RepositoryIssueWebhook,
) -> sqlx::Result<()> {
    let res = sqlx::query(
        "INSERT INTO repository_issue_webhooks \
         (webhook_action, academy_slug, repository, payload, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&webhook.webhook_action)
    .bind(&webhook.academy_slug)
    .bind(&webhook.repository)
    .bind(&webhook.payload)
    .bind(&webhook.status)
    .bind(webhook.created_at)
    .execute(pool)
    .await?;
    webhook.id = res.last_insert_rowid();
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // a single connection so every query sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    migrate(&pool).await.expect("schema should apply");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_issue_inserts_then_updates() {
        let pool = test_pool().await;

        let mut issue = Issue::new("MDU6SXNzdWUx");
        save_issue(&pool, &mut issue).await.unwrap();
        assert_ne!(issue.id, 0);

        issue.title = "Renamed".to_owned();
        save_issue(&pool, &mut issue).await.unwrap();

        let stored = find_issue_by_node_id(&pool, "MDU6SXNzdWUx")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, issue.id);
        assert_eq!(stored.title, "Renamed");
    }

    #[tokio::test]
    async fn second_open_bill_for_freelancer_is_rejected() {
        let pool = test_pool().await;
        let freelancer = insert_freelancer(&pool, Some(1), 40.0).await.unwrap();

        create_bill(&pool, freelancer.id).await.unwrap();
        let second = create_bill(&pool, freelancer.id).await;

        assert!(second.is_err());
    }

    #[tokio::test]
    async fn freelancer_lookup_by_github_id() {
        let pool = test_pool().await;
        let freelancer = insert_freelancer(&pool, Some(4567), 25.0).await.unwrap();

        let found = find_freelancer_by_github_id(&pool, 4567)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, freelancer.id);

        assert!(find_freelancer_by_github_id(&pool, 999)
            .await
            .unwrap()
            .is_none());
    }
}
