use chrono::Utc;
use fieldsignal_common::{
    clamp_confidence, Clock, ConfidenceHistoryEntry, Entity, FieldSignalError, Hypothesis, HypothesisState,
    RalphDecision, Template,
};
use uuid::Uuid;

const RESOLVED_CONSECUTIVE_HIGH_CONFIDENCE: u32 = 3;
const RESOLVED_CONFIDENCE_THRESHOLD: f64 = 0.85;
const INACTIVE_CONSECUTIVE_REJECTS: u32 = 3;

/// CRUD + state transitions for hypotheses.
pub struct HypothesisManager;

impl HypothesisManager {
    /// `initialise(template, entity) -> [Hypothesis]`: one hypothesis per
    /// template signal pattern, starting confidence 0.50, state ACTIVE.
    /// Duplicate statements for the same entity are rejected.
    pub fn initialise(template: &Template, entity: &Entity, clock: &dyn Clock) -> Result<Vec<Hypothesis>, FieldSignalError> {
        let mut seen = std::collections::HashSet::new();
        let mut hypotheses = Vec::with_capacity(template.signal_patterns.len());

        for pattern in &template.signal_patterns {
            if !seen.insert(pattern.clone()) {
                return Err(FieldSignalError::InvalidInput(format!(
                    "duplicate hypothesis statement for entity {}: {pattern}",
                    entity.entity_id
                )));
            }
            hypotheses.push(Hypothesis {
                hypothesis_id: Uuid::new_v4(),
                entity_id: entity.entity_id,
                template_id: template.template_id,
                statement: pattern.clone(),
                category: category_for_pattern(pattern),
                target_entity_type: entity.entity_type.clone(),
                confidence: 0.50,
                state: HypothesisState::Active,
                iterations: 0,
                reinforcement_count: 0,
                created_at: clock.now(),
                last_tested_at: None,
                metadata: serde_json::Value::Null,
                confidence_history: Vec::new(),
            });
        }

        Ok(hypotheses)
    }

    /// Applies a Ralph Loop decision to a hypothesis: confidence delta,
    /// append-only history entry, iteration/reinforcement counters, and
    /// state recomputation.
    pub fn update(hypothesis: &mut Hypothesis, decision: &RalphDecision, source_url: Option<String>, clock: &dyn Clock) {
        hypothesis.confidence = clamp_confidence(hypothesis.confidence + decision.applied_delta);
        hypothesis.iterations += 1;
        hypothesis.last_tested_at = Some(clock.now());

        if decision.decision == fieldsignal_common::Decision::Accept {
            hypothesis.reinforcement_count += 1;
        }

        hypothesis.confidence_history.push(ConfidenceHistoryEntry {
            iteration: hypothesis.iterations,
            raw_delta: decision.raw_delta,
            applied_delta: decision.applied_delta,
            decision: decision.decision,
            category: hypothesis.category.clone(),
            source_url,
            reason: decision.justification.clone(),
        });

        hypothesis.state = next_state(hypothesis);
    }
}

fn next_state(hypothesis: &Hypothesis) -> HypothesisState {
    if hypothesis.state != HypothesisState::Active {
        return hypothesis.state;
    }

    let history = &hypothesis.confidence_history;

    if history.len() as u32 >= RESOLVED_CONSECUTIVE_HIGH_CONFIDENCE {
        // Replay the append-only delta history to recover the running
        // confidence at each iteration, since only the deltas (not the
        // resulting confidence) are recorded per entry.
        let mut running = 0.50;
        let confidences: Vec<f64> = history
            .iter()
            .map(|entry| {
                running = clamp_confidence(running + entry.applied_delta);
                running
            })
            .collect();
        let window = &confidences[confidences.len() - RESOLVED_CONSECUTIVE_HIGH_CONFIDENCE as usize..];
        if window.iter().all(|&c| c >= RESOLVED_CONFIDENCE_THRESHOLD) {
            return HypothesisState::Resolved;
        }
    }

    let reject_streak = history
        .iter()
        .rev()
        .take(INACTIVE_CONSECUTIVE_REJECTS as usize)
        .all(|e| matches!(e.decision, fieldsignal_common::Decision::Reject | fieldsignal_common::Decision::NoProgress));
    if reject_streak && history.len() as u32 >= INACTIVE_CONSECUTIVE_REJECTS {
        return HypothesisState::Inactive;
    }

    HypothesisState::Active
}

/// Derives a bookkeeping category from a signal pattern string. Patterns
/// are opaque; this only needs to be a
/// stable, low-cardinality key for category saturation tracking.
fn category_for_pattern(pattern: &str) -> String {
    pattern
        .split_whitespace()
        .next()
        .unwrap_or(pattern)
        .to_lowercase()
}
