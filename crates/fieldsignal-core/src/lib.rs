pub mod budget;
pub mod context;
pub mod duplicate;
pub mod guardrails;
pub mod hypothesis;
pub mod ralph;
pub mod validation;
pub mod verifier;

pub use budget::{BudgetController, IterationCost, Remaining};
pub use context::{ContextBuilder, JudgeContext};
pub use hypothesis::HypothesisManager;
pub use ralph::{RalphLoop, RalphOutcome};
pub use validation::{SignalValidator, ValidationFailure};
pub use verifier::EvidenceVerifier;
