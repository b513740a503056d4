use std::sync::Arc;

use anyhow::Result;
use fieldsignal_common::{Decision, FieldSignalError};
use tracing::warn;

use crate::client::LlmClient;
use crate::types::{JudgeResponse, LlmTier, RawJudgeOutput};

/// Context the cascade needs to decide whether to escalate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeHint {
    pub current_confidence: f64,
}

/// Everything downstream (Budget Controller, Ralph Loop) needs from one
/// cascade run: the winning parse, every tier actually called (for cost
/// accounting — "cost is accounted back to the Budget Controller in all
/// cases"), and an optional lock-in confirmation at the expensive tier.
pub struct CascadeOutcome {
    pub raw: RawJudgeOutput,
    pub tier_used: LlmTier,
    pub calls: Vec<JudgeResponse>,
    pub lock_in: Option<RawJudgeOutput>,
}

/// Tries the judge at `cheap → mid → expensive`, escalating on parse
/// failure or a low-confidence WEAK_ACCEPT, then optionally re-confirms
/// ACCEPT candidates near the confidence ceiling with the expensive tier.
pub struct JudgeCascade {
    client: Arc<dyn LlmClient>,
    model_ids: [String; 3],
}

impl JudgeCascade {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            model_ids: [
                LlmTier::Cheap.default_model_id().to_string(),
                LlmTier::Mid.default_model_id().to_string(),
                LlmTier::Expensive.default_model_id().to_string(),
            ],
        }
    }

    pub fn with_model_ids(mut self, cheap: &str, mid: &str, expensive: &str) -> Self {
        self.model_ids = [cheap.to_string(), mid.to_string(), expensive.to_string()];
        self
    }

    fn model_id(&self, tier: LlmTier) -> &str {
        match tier {
            LlmTier::Cheap => &self.model_ids[0],
            LlmTier::Mid => &self.model_ids[1],
            LlmTier::Expensive => &self.model_ids[2],
        }
    }

    pub async fn run(&self, prompt: &str, hint: CascadeHint) -> Result<CascadeOutcome, FieldSignalError> {
        let mut calls = Vec::new();
        let mut tier = LlmTier::Cheap;

        let raw = loop {
            let response = self
                .client
                .judge(prompt, self.model_id(tier))
                .await
                .map_err(|e| FieldSignalError::TransientIo(e.to_string()))?;
            calls.push(response.clone());

            match parse_decision(&response.text) {
                Ok(candidate) => {
                    let weak_low_confidence =
                        candidate.decision == Decision::WeakAccept && candidate.confidence_delta < 0.5;
                    if weak_low_confidence {
                        if let Some(next) = tier.next() {
                            tier = next;
                            continue;
                        }
                    }
                    break candidate;
                }
                Err(e) => {
                    warn!(tier = ?tier, error = %e, "judge output failed to parse");
                    if let Some(next) = tier.next() {
                        tier = next;
                        continue;
                    }
                    return Err(FieldSignalError::JudgeParse(e.to_string()));
                }
            }
        };

        let lock_in = if raw.decision == Decision::Accept && hint.current_confidence >= 0.70 {
            match self
                .client
                .judge(prompt, self.model_id(LlmTier::Expensive))
                .await
            {
                Ok(response) => {
                    let parsed = parse_decision(&response.text).ok();
                    calls.push(response);
                    parsed
                }
                Err(e) => {
                    warn!(error = %e, "lock-in validation call failed, keeping cheaper-tier decision");
                    None
                }
            }
        } else {
            None
        };

        Ok(CascadeOutcome {
            raw,
            tier_used: tier,
            calls,
            lock_in,
        })
    }
}

/// The single seam where a judge's raw text becomes structured data
///.
pub fn parse_decision(text: &str) -> Result<RawJudgeOutput, serde_json::Error> {
    let trimmed = extract_json_object(text);
    serde_json::from_str(trimmed)
}

/// Judges sometimes wrap JSON in prose or code fences; pull out the first
/// balanced `{...}` block.
fn extract_json_object(text: &str) -> &str {
    let start = match text.find('{') {
        Some(i) => i,
        None => return text,
    };
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[start..start + offset + 1];
                }
            }
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let text = r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"quote: we are issuing a tender","evidence_found":[{"text":"we are issuing a tender","url":"https://x.example/rfp"}]}"#;
        let parsed = parse_decision(text).expect("parse");
        assert_eq!(parsed.decision, Decision::Accept);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let text = "Here is my answer:\n```json\n{\"decision\":\"REJECT\",\"confidence_delta\":0.0,\"justification\":\"duplicate\",\"evidence_found\":[]}\n```\nThanks.";
        let parsed = parse_decision(text).expect("parse");
        assert_eq!(parsed.decision, Decision::Reject);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_decision("not json at all").is_err());
    }
}
