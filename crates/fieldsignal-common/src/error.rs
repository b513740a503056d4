use thiserror::Error;

/// Error taxonomy. Each variant is a distinct recoverable
/// kind; collaborator errors that don't need their own variant fall through
/// `Anyhow`.
#[derive(Error, Debug)]
pub enum FieldSignalError {
    /// Network/store timeout. Caller retries once locally, then downgrades
    /// the iteration to NO_PROGRESS.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// The LLM judge returned unparseable JSON.
    #[error("judge returned unparseable output: {0}")]
    JudgeParse(String),

    /// Surfaced once; terminates the entity run cleanly with a StoppingReason.
    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    /// Entity missing required fields. Entity is skipped, batch continues.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Writes failing after one retry. Aborts the entity run.
    #[error("store failure: {0}")]
    StoreFailure(String),

    /// Invalid budget or missing template paths. Fails fast at startup.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl FieldSignalError {
    /// Exit code: 0 complete, 2 partial-failure,
    /// 1 hard error (store unreachable, config invalid).
    pub fn exit_code(&self) -> i32 {
        match self {
            FieldSignalError::Config(_) | FieldSignalError::StoreFailure(_) => 1,
            _ => 2,
        }
    }
}
