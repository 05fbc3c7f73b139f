use thiserror::Error;

/// Failures that abort the handling of one event. None of them are retried.
#[derive(Error, Debug)]
pub enum ChallengeError {
    /// The store could not be reached, timed out, or rejected a statement.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A row the operation depends on does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Persisted state disagrees with itself (e.g. ledger and tally drifted).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl ChallengeError {
    pub fn challenge_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "challenge",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<anyhow::Error> for ChallengeError {
    fn from(e: anyhow::Error) -> Self {
        Self::StoreUnavailable(format!("{:#}", e))
    }
}

pub type Result<T> = std::result::Result<T, ChallengeError>;
