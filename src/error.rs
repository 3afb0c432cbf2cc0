use thiserror::Error;

/// Failures raised while reconciling issues against github
#[derive(Debug, Error)]
pub enum SyncError {
    /// The first assignee of an inbound issue does not map to any registered
    /// freelancer. Deliberately fatal, this signals a data integrity problem.
    #[error("assigned github user {github_id} is not a freelancer but is the main user associated to this issue")]
    UnknownAssignee { github_id: i64 },

    #[error("freelancer {freelancer_id} has no github user")]
    MissingGithubUser { freelancer_id: i64 },

    #[error("credentials for github user {github_id} not found")]
    MissingCredentials { github_id: i64 },

    #[error("unexpected response from github: {body}")]
    UnexpectedResponse { body: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Github(#[from] reqwest::Error),
}
