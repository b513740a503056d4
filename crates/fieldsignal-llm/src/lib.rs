pub mod cascade;
pub mod client;
pub mod types;

pub use cascade::{CascadeHint, CascadeOutcome, JudgeCascade};
pub use client::{HttpLlmClient, LlmClient};
pub use types::{ConfidenceValidation, JudgeResponse, LlmTier, RawJudgeOutput};
