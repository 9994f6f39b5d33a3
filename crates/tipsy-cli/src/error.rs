use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tipsy_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Entry not found for id/prefix: {0}")]
    EntryNotFound(String),
    #[error("{0}")]
    AmbiguousEntryId(String),
    #[error(
        "Cloud backup is not configured. Set TIPSY_SUPABASE_URL, TIPSY_SUPABASE_ANON_KEY, TIPSY_LOGIN_ENDPOINT and the R2_* variables."
    )]
    CloudNotConfigured,
}

impl CliError {
    /// The user backed out; not worth a failing exit code.
    pub const fn is_soft_cancellation(&self) -> bool {
        match self {
            Self::Core(error) => error.is_soft_cancellation(),
            _ => false,
        }
    }
}
