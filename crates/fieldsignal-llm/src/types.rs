use fieldsignal_common::Decision;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The three named judge tiers of.C7's LLM cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmTier {
    Cheap,
    Mid,
    Expensive,
}

impl LlmTier {
    pub fn next(self) -> Option<LlmTier> {
        match self {
            LlmTier::Cheap => Some(LlmTier::Mid),
            LlmTier::Mid => Some(LlmTier::Expensive),
            LlmTier::Expensive => None,
        }
    }

    /// Model id used at this tier. Concrete model names are the vendor's
    /// business — this is a default mapping a deployment can override.
    pub fn default_model_id(self) -> &'static str {
        match self {
            LlmTier::Cheap => "judge-cheap-v1",
            LlmTier::Mid => "judge-mid-v1",
            LlmTier::Expensive => "judge-expensive-v1",
        }
    }
}

/// Raw response from the LLM collaborator contract:
/// `LLM.judge(prompt) → {text, input_tokens, output_tokens, cost_usd, model_id}`.
#[derive(Debug, Clone)]
pub struct JudgeResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub model_id: String,
}

/// What the judge's `text` is expected to parse into.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawJudgeOutput {
    pub decision: Decision,
    pub confidence_delta: f64,
    pub justification: String,
    pub evidence_found: Vec<RawEvidence>,
    #[serde(default)]
    pub evidence_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawEvidence {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Pass-2 LLM adjudication record.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConfidenceValidation {
    pub original: f64,
    pub validated: f64,
    pub adjustment: f64,
    pub rationale: String,
    pub requires_manual_review: bool,
}

impl ConfidenceValidation {
    /// `|adjustment| ≤ 0.25` is enforced.
    pub fn clamp_adjustment(mut self) -> Self {
        self.adjustment = self.adjustment.clamp(-0.25, 0.25);
        self.validated = (self.original + self.adjustment).clamp(0.05, 0.95);
        self
    }
}
