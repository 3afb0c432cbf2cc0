//! Rolls a freelancer's finished work up into their open bill.

use log::debug;
use sqlx::SqlitePool;

use crate::{
    db,
    models::{issue_status, Bill, Freelancer},
};

/// Attach every billable DONE issue to the freelancer's open bill and refresh
/// the bill's totals. Safe to re-run, totals are recomputed from scratch.
pub async fn generate_freelancer_bill(
    pool: &SqlitePool,
    freelancer: &Freelancer,
) -> anyhow::Result<Bill> {
    // issues that regressed out of DONE leave their bill first
    db::detach_unfinished_issues(pool, freelancer.id).await?;

    let mut bill = match db::find_open_bill(pool, freelancer.id).await? {
        Some(bill) => bill,
        None => db::create_bill(pool, freelancer.id).await?,
    };

    let issues = db::billable_issues(pool, freelancer.id).await?;

    let mut total_hours = 0.0;
    let mut total_minutes = 0.0;
    for mut issue in issues {
        issue.bill_id = Some(bill.id);

        let mut status_message = String::new();
        if issue.status != issue_status::DONE {
            status_message.push_str(&format!("Issue is still {}", issue.status));
        }
        if issue.node_id.is_empty() {
            status_message.push_str("Github node id not found");
        }

        // only clean issues count towards the totals
        if status_message.is_empty() {
            total_hours += issue.duration_in_hours;
            total_minutes += issue.duration_in_minutes;
        } else {
            debug!(
                "Issue {} attached to bill {} with diagnostics: {status_message}",
                issue.id, bill.id
            );
        }
        issue.status_message = Some(status_message);

        db::save_issue(pool, &mut issue).await?;
    }

    bill.total_duration_in_hours = total_hours;
    bill.total_duration_in_minutes = total_minutes;
    bill.total_price = total_hours * freelancer.price_per_hour;
    db::update_bill_totals(pool, &bill).await?;

    Ok(bill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{bill_status, Issue};

    async fn insert_issue(
        pool: &SqlitePool,
        freelancer_id: i64,
        node_id: &str,
        status: &str,
        hours: f64,
    ) -> Issue {
        let mut issue = Issue::new(node_id);
        issue.status = status.to_owned();
        issue.duration_in_hours = hours;
        issue.duration_in_minutes = hours * 60.0;
        issue.freelancer_id = Some(freelancer_id);
        db::save_issue(pool, &mut issue).await.unwrap();
        issue
    }

    #[tokio::test]
    async fn totals_cover_all_done_issues() {
        let pool = db::test_pool().await;
        let freelancer = db::insert_freelancer(&pool, Some(1), 40.0).await.unwrap();

        insert_issue(&pool, freelancer.id, "n1", issue_status::DONE, 2.0).await;
        insert_issue(&pool, freelancer.id, "n2", issue_status::DONE, 1.5).await;
        // open work stays off the bill
        insert_issue(&pool, freelancer.id, "n3", issue_status::DOING, 5.0).await;

        let bill = generate_freelancer_bill(&pool, &freelancer).await.unwrap();

        assert_eq!(bill.status, bill_status::DUE);
        assert_eq!(bill.total_duration_in_hours, 3.5);
        assert_eq!(bill.total_duration_in_minutes, 210.0);
        assert_eq!(bill.total_price, 140.0);

        let attached = db::find_issue_by_node_id(&pool, "n1").await.unwrap().unwrap();
        assert_eq!(attached.bill_id, Some(bill.id));
        let skipped = db::find_issue_by_node_id(&pool, "n3").await.unwrap().unwrap();
        assert_eq!(skipped.bill_id, None);
    }

    #[tokio::test]
    async fn rerunning_does_not_double_count() {
        let pool = db::test_pool().await;
        let freelancer = db::insert_freelancer(&pool, Some(1), 40.0).await.unwrap();
        insert_issue(&pool, freelancer.id, "n1", issue_status::DONE, 2.0).await;

        let first = generate_freelancer_bill(&pool, &freelancer).await.unwrap();
        let second = generate_freelancer_bill(&pool, &freelancer).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.total_duration_in_hours, 2.0);
        assert_eq!(second.total_duration_in_minutes, 120.0);
        assert_eq!(second.total_price, 80.0);
    }

    #[tokio::test]
    async fn reuses_the_open_bill() {
        let pool = db::test_pool().await;
        let freelancer = db::insert_freelancer(&pool, Some(1), 40.0).await.unwrap();
        let existing = db::create_bill(&pool, freelancer.id).await.unwrap();

        let bill = generate_freelancer_bill(&pool, &freelancer).await.unwrap();

        assert_eq!(bill.id, existing.id);
    }

    #[tokio::test]
    async fn regressed_issues_are_detached_and_excluded() {
        let pool = db::test_pool().await;
        let freelancer = db::insert_freelancer(&pool, Some(1), 40.0).await.unwrap();

        insert_issue(&pool, freelancer.id, "n1", issue_status::DONE, 2.0).await;
        insert_issue(&pool, freelancer.id, "n2", issue_status::DONE, 1.0).await;

        let first = generate_freelancer_bill(&pool, &freelancer).await.unwrap();

        // the issue turns out not to be finished after all
        let mut regressed = db::find_issue_by_node_id(&pool, "n1").await.unwrap().unwrap();
        assert_eq!(regressed.bill_id, Some(first.id));
        regressed.status = issue_status::TODO.to_owned();
        db::save_issue(&pool, &mut regressed).await.unwrap();

        let bill = generate_freelancer_bill(&pool, &freelancer).await.unwrap();

        assert_eq!(bill.total_duration_in_hours, 1.0);
        assert_eq!(bill.total_price, 40.0);
        let detached = db::find_issue_by_node_id(&pool, "n1").await.unwrap().unwrap();
        assert_eq!(detached.bill_id, None);
    }

    #[tokio::test]
    async fn issues_without_node_id_get_a_diagnostic_and_no_total() {
        let pool = db::test_pool().await;
        let freelancer = db::insert_freelancer(&pool, Some(1), 40.0).await.unwrap();

        insert_issue(&pool, freelancer.id, "", issue_status::DONE, 3.0).await;
        insert_issue(&pool, freelancer.id, "n2", issue_status::DONE, 1.0).await;

        let bill = generate_freelancer_bill(&pool, &freelancer).await.unwrap();

        assert_eq!(bill.total_duration_in_hours, 1.0);

        let flagged = db::find_issue_by_node_id(&pool, "").await.unwrap().unwrap();
        assert_eq!(flagged.bill_id, Some(bill.id));
        assert_eq!(
            flagged.status_message.as_deref(),
            Some("Github node id not found")
        );

        let clean = db::find_issue_by_node_id(&pool, "n2").await.unwrap().unwrap();
        assert_eq!(clean.status_message.as_deref(), Some(""));
    }
}
