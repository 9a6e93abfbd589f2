use thiserror::Error;

/// Failure talking to the task backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend rejected the request: {0}")]
    Rejected(String),

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

/// Failure that stops a local mutation before anything is sent.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("task {0} is not in the local view")]
    TaskNotFound(u64),

    #[error("subtask {subtask_id} not found on task {task_id}")]
    SubtaskNotFound { task_id: u64, subtask_id: u64 },

    #[error(transparent)]
    Backend(#[from] BackendError),
}
