use fieldsignal_common::{clamp_confidence, Decision, EvidenceItem, RalphDecision, RalphState};
use fieldsignal_llm::cascade::CascadeHint;
use fieldsignal_llm::{JudgeCascade, JudgeResponse};
use tracing::warn;

use crate::duplicate::is_duplicate;
use crate::guardrails::{category_multiplier, damping, NoveltyBounds};

/// Everything the Discovery Orchestrator needs from one Ralph Loop
/// iteration: the typed decision plus the raw LLM calls made, so cost can
/// be charged back to the Budget Controller in all cases.
pub struct RalphOutcome {
    pub decision: RalphDecision,
    pub llm_calls: Vec<JudgeResponse>,
}

/// The judge-and-update state machine. Holds only the
/// collaborator (the LLM cascade) and the novelty calibration — all
/// mutable state lives in the caller-owned `RalphState`.
pub struct RalphLoop {
    cascade: JudgeCascade,
    novelty_bounds: NoveltyBounds,
}

impl RalphLoop {
    pub fn new(cascade: JudgeCascade) -> Self {
        Self {
            cascade,
            novelty_bounds: NoveltyBounds::default(),
        }
    }

    pub fn with_novelty_bounds(mut self, bounds: NoveltyBounds) -> Self {
        self.novelty_bounds = bounds;
        self
    }

    /// Runs one iteration. `category` identifies the hypothesis's category
    /// for saturation bookkeeping; `previous_evidence` is `(text, url)`
    /// pairs accumulated so far for duplicate detection.
    pub async fn run(
        &self,
        prompt: &str,
        category: &str,
        state: &mut RalphState,
        previous_evidence: &[(String, Option<String>)],
    ) -> RalphOutcome {
        let iteration = state.iterations_completed + 1;

        if state.category(category).is_saturated() {
            let decision = RalphDecision {
                decision: Decision::Saturated,
                raw_delta: 0.0,
                applied_delta: 0.0,
                justification: "category saturated: three consecutive REJECT/NO_PROGRESS".to_string(),
                evidence_items: Vec::new(),
                category_saturated: true,
            };
            state.category(category).record(Decision::Saturated);
            state.iterations_completed = iteration;
            return RalphOutcome { decision, llm_calls: Vec::new() };
        }

        let hint = CascadeHint { current_confidence: state.current_confidence };
        let (mut decision_label, mut evidence_items, justification, llm_calls) = match self.cascade.run(prompt, hint).await {
            Ok(outcome) => {
                let raw = outcome.lock_in.unwrap_or(outcome.raw);
                let items: Vec<EvidenceItem> = raw
                    .evidence_found
                    .into_iter()
                    .map(|e| EvidenceItem {
                        text: e.text,
                        url: e.url,
                        evidence_type: raw.evidence_type.clone(),
                    })
                    .collect();
                (raw.decision, items, raw.justification, outcome.calls)
            }
            Err(e) => {
                warn!(error = %e, "judge cascade exhausted, downgrading to NO_PROGRESS");
                (Decision::NoProgress, Vec::new(), format!("judge parse failure: {e}"), Vec::new())
            }
        };

        if decision_label.is_accept_like() && !has_verifiable_citation(&evidence_items) {
            warn!("judge returned {decision_label} without a quote or URL, downgrading");
            decision_label = Decision::NoProgress;
        }

        if decision_label.is_accept_like() {
            if let Some(primary) = evidence_items.first() {
                if is_duplicate(&primary.text, primary.url.as_deref(), previous_evidence) {
                    decision_label = Decision::Reject;
                    evidence_items.clear();
                }
            }
        }

        let novelty = self.novelty_bounds.novelty(iteration);
        if novelty == 0.0 {
            decision_label = Decision::NoProgress;
        }

        let prior_weak_accept_count = state.category(category).weak_accept_count;
        let category_mult = if decision_label == Decision::WeakAccept {
            category_multiplier(prior_weak_accept_count)
        } else {
            1.0
        };
        let damp = damping(state.current_confidence, state.confidence_ceiling);

        let raw_delta = decision_label.raw_delta();
        let applied_delta = raw_delta * novelty * damp * category_mult;

        state.category(category).record(decision_label);
        let category_saturated = state.category(category).is_saturated();
        state.current_confidence = clamp_confidence(state.current_confidence + applied_delta);
        state.iterations_completed = iteration;

        let decision = RalphDecision {
            decision: decision_label,
            raw_delta,
            applied_delta,
            justification,
            evidence_items,
            category_saturated,
        };

        RalphOutcome { decision, llm_calls }
    }
}

fn has_verifiable_citation(items: &[EvidenceItem]) -> bool {
    items.iter().any(|i| !i.text.trim().is_empty() || i.url.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fieldsignal_common::CategoryStats;
    use fieldsignal_llm::client::LlmClient;
    use std::sync::Arc;

    struct ScriptedClient {
        responses: std::sync::Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn judge(&self, _prompt: &str, _model_id: &str) -> anyhow::Result<JudgeResponse> {
            let mut responses = self.responses.lock().unwrap();
            let text = if responses.is_empty() { "{}".to_string() } else { responses.remove(0).to_string() };
            Ok(JudgeResponse {
                text,
                input_tokens: 10,
                output_tokens: 10,
                cost_usd: 0.03,
                model_id: "test".to_string(),
            })
        }
    }

    fn cascade_with(responses: Vec<&'static str>) -> JudgeCascade {
        JudgeCascade::new(Arc::new(ScriptedClient { responses: std::sync::Mutex::new(responses) }))
    }

    #[tokio::test]
    async fn accept_with_quote_applies_full_delta_at_iteration_one() {
        let cascade = cascade_with(vec![
            r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"we are issuing a tender","evidence_found":[{"text":"we are issuing a tender","url":"https://x.example/rfp"}]}"#,
        ]);
        let ralph = RalphLoop::new(cascade);
        let mut state = RalphState::default();
        let outcome = ralph.run("prompt", "procurement", &mut state, &[]).await;
        assert_eq!(outcome.decision.decision, Decision::Accept);
        assert!((outcome.decision.applied_delta - 0.06).abs() < 1e-9);
    }

    #[tokio::test]
    async fn duplicate_evidence_forces_reject() {
        let cascade = cascade_with(vec![
            r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"team wins match","evidence_found":[{"text":"Team wins match","url":null}]}"#,
        ]);
        let ralph = RalphLoop::new(cascade);
        let mut state = RalphState::default();
        let previous = vec![("Team wins match".to_string(), None)];
        let outcome = ralph.run("prompt", "news", &mut state, &previous).await;
        assert_eq!(outcome.decision.decision, Decision::Reject);
        assert_eq!(outcome.decision.raw_delta, 0.0);
    }

    #[tokio::test]
    async fn saturated_category_short_circuits_without_calling_judge() {
        let cascade = cascade_with(vec![]);
        let ralph = RalphLoop::new(cascade);
        let mut state = RalphState::default();
        let mut stats = CategoryStats::default();
        stats.record(Decision::Reject);
        stats.record(Decision::Reject);
        stats.record(Decision::Reject);
        state.category_stats.insert("careers".to_string(), stats);

        let outcome = ralph.run("prompt", "careers", &mut state, &[]).await;
        assert_eq!(outcome.decision.decision, Decision::Saturated);
        assert!(outcome.llm_calls.is_empty());
    }

    #[tokio::test]
    async fn novelty_zero_forces_no_progress_past_iteration_eighteen() {
        let cascade = cascade_with(vec![
            r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"quote","evidence_found":[{"text":"quote","url":"https://x.example"}]}"#,
        ]);
        let ralph = RalphLoop::new(cascade);
        let mut state = RalphState { iterations_completed: 19, ..RalphState::default() };
        let outcome = ralph.run("prompt", "news", &mut state, &[]).await;
        assert_eq!(outcome.decision.decision, Decision::NoProgress);
        assert_eq!(outcome.decision.applied_delta, 0.0);
    }
}
