use chrono::Utc;
use fieldsignal_common::{Evidence, ValidatedSignal};
use fieldsignal_llm::types::ConfidenceValidation;
use fieldsignal_llm::{JudgeResponse, LlmClient};
use uuid::Uuid;

const MIN_EVIDENCE_COUNT: usize = 3;
const MIN_AGGREGATE_CONFIDENCE: f64 = 0.7;

/// Why a candidate failed to become a `ValidatedSignal`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    InsufficientEvidence { count: usize, aggregate_confidence: f64 },
    NoVerifiedEvidenceAfterFiltering,
    LlmAdjudicationUnavailable(String),
}

/// Three-pass validation for signal promotion. Only
/// candidates surviving all three passes become `ValidatedSignal`s.
pub struct SignalValidator<'a> {
    client: &'a dyn LlmClient,
    model_id: String,
}

impl<'a> SignalValidator<'a> {
    pub fn new(client: &'a dyn LlmClient, model_id: impl Into<String>) -> Self {
        Self { client, model_id: model_id.into() }
    }

    pub async fn validate(
        &self,
        entity_id: Uuid,
        signal_type: &str,
        subtype: &str,
        evidence: &[Evidence],
        aggregate_confidence: f64,
    ) -> Result<(ValidatedSignal, ConfidenceValidation, Vec<JudgeResponse>), ValidationFailure> {
        // Pass 1 - minimums.
        if evidence.len() < MIN_EVIDENCE_COUNT || aggregate_confidence < MIN_AGGREGATE_CONFIDENCE {
            return Err(ValidationFailure::InsufficientEvidence {
                count: evidence.len(),
                aggregate_confidence,
            });
        }

        // Pass 1.5 - verification: discard unverified evidence, re-check minima.
        let verified: Vec<&Evidence> = evidence.iter().filter(|e| e.verified).collect();
        if verified.len() < MIN_EVIDENCE_COUNT {
            return Err(ValidationFailure::NoVerifiedEvidenceAfterFiltering);
        }

        // Pass 2 - LLM adjudication.
        let prompt = adjudication_prompt(signal_type, subtype, aggregate_confidence, &verified);
        let response = self
            .client
            .judge(&prompt, &self.model_id)
            .await
            .map_err(|e| ValidationFailure::LlmAdjudicationUnavailable(e.to_string()))?;

        let validation: ConfidenceValidation = serde_json::from_str(&response.text).unwrap_or(ConfidenceValidation {
            original: aggregate_confidence,
            validated: aggregate_confidence,
            adjustment: 0.0,
            rationale: "adjudication response unparseable, no adjustment applied".to_string(),
            requires_manual_review: true,
        });
        let validation = validation.clamp_adjustment();

        let signal = ValidatedSignal {
            id: Uuid::new_v4(),
            signal_type: signal_type.to_string(),
            subtype: subtype.to_string(),
            entity_id,
            confidence: validation.validated,
            validation_pass: 3,
            first_seen: verified.iter().map(|e| e.date).min().unwrap_or_else(Utc::now),
            temporal_multiplier: 1.0,
            primary_reason: Some(validation.rationale.clone()),
            urgency: None,
            yp_fit_score: None,
        };

        Ok((signal, validation, vec![response]))
    }
}

fn adjudication_prompt(signal_type: &str, subtype: &str, aggregate_confidence: f64, evidence: &[&Evidence]) -> String {
    let quotes: Vec<String> = evidence.iter().map(|e| format!("- {} ({})", e.extracted_text, e.source_url)).collect();
    format!(
        "Adjudicate signal {signal_type}/{subtype} at aggregate confidence {aggregate_confidence:.2}.\n\
         Verified evidence:\n{}\n\n\
         Respond with JSON: {{original, validated, adjustment, rationale, requires_manual_review}}.",
        quotes.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn evidence(verified: bool) -> Evidence {
        Evidence {
            id: Uuid::new_v4(),
            signal_id: Uuid::new_v4(),
            source: "press".to_string(),
            source_url: "https://x.example".to_string(),
            date: Utc::now(),
            extracted_text: "quote".to_string(),
            credibility_score: 0.8,
            verified,
            accessible: true,
        }
    }

    struct FixedClient;

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn judge(&self, _prompt: &str, _model_id: &str) -> anyhow::Result<JudgeResponse> {
            Ok(JudgeResponse {
                text: r#"{"original":0.8,"validated":0.75,"adjustment":-0.05,"rationale":"minor downgrade","requires_manual_review":false}"#.to_string(),
                input_tokens: 1,
                output_tokens: 1,
                cost_usd: 0.01,
                model_id: "test".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn insufficient_evidence_fails_pass_one() {
        let client = FixedClient;
        let validator = SignalValidator::new(&client, "mid");
        let evidence = vec![evidence(true), evidence(true)];
        let result = validator.validate(Uuid::new_v4(), "rfp", "kit", &evidence, 0.8).await;
        assert!(matches!(result, Err(ValidationFailure::InsufficientEvidence { .. })));
    }

    #[tokio::test]
    async fn unverified_evidence_is_discarded_before_minima_recheck() {
        let client = FixedClient;
        let validator = SignalValidator::new(&client, "mid");
        let evidence = vec![evidence(true), evidence(false), evidence(false)];
        let result = validator.validate(Uuid::new_v4(), "rfp", "kit", &evidence, 0.8).await;
        assert!(matches!(result, Err(ValidationFailure::NoVerifiedEvidenceAfterFiltering)));
    }

    #[tokio::test]
    async fn candidate_surviving_all_passes_becomes_validated_signal() {
        let client = FixedClient;
        let validator = SignalValidator::new(&client, "mid");
        let evidence = vec![evidence(true), evidence(true), evidence(true)];
        let (signal, validation, calls) = validator.validate(Uuid::new_v4(), "rfp", "kit", &evidence, 0.8).await.unwrap();
        assert_eq!(signal.confidence, 0.75);
        assert!(validation.adjustment.abs() <= 0.25);
        assert_eq!(calls.len(), 1);
    }
}
