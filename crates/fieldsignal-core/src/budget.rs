use fieldsignal_common::{BudgetConfig, Clock, StoppingReason};

/// Per-iteration cost inputs, charged back to the controller after an
/// iteration completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterationCost {
    pub llm_calls: u32,
    pub validation_calls: u32,
    pub scrape_calls: u32,
    pub evidence_delta: u32,
}

/// Remaining headroom on each axis the controller tracks.
#[derive(Debug, Clone, Copy)]
pub struct Remaining {
    pub cost_usd: f64,
    pub time_seconds: f64,
    pub iterations: u32,
}

/// Sole arbiter of "may I run another iteration?". One
/// instance per entity run — the Discovery Orchestrator is strictly
/// sequential within a run, so plain `&mut self` state is
/// sufficient; no atomics needed.
pub struct BudgetController {
    config: BudgetConfig,
    total_iterations: u32,
    iterations_in_category: std::collections::HashMap<String, u32>,
    total_cost_usd: f64,
    total_evidence_count: u32,
    start_monotonic: f64,
    consecutive_high_confidence: u32,
}

impl BudgetController {
    pub fn new(config: BudgetConfig, clock: &dyn Clock) -> Self {
        Self {
            config,
            total_iterations: 0,
            iterations_in_category: std::collections::HashMap::new(),
            total_cost_usd: 0.0,
            total_evidence_count: 0,
            start_monotonic: clock.monotonic(),
            consecutive_high_confidence: 0,
        }
    }

    /// Checked in the order fixed by.C1: the entity cap always
    /// wins over `max_per_category × max_categories`.
    pub fn can_continue(&self, category: &str, current_confidence: f64, clock: &dyn Clock) -> (bool, Option<StoppingReason>) {
        if self.total_iterations >= self.config.max_iterations_per_entity {
            return (false, Some(StoppingReason::MaxIterationsReached));
        }
        let in_category = self.iterations_in_category.get(category).copied().unwrap_or(0);
        if in_category >= self.config.max_iterations_per_category {
            return (false, Some(StoppingReason::MaxIterationsReached));
        }
        if self.total_cost_usd >= self.config.cost_cap_usd {
            return (false, Some(StoppingReason::CostLimitReached));
        }
        let elapsed = clock.monotonic() - self.start_monotonic;
        if elapsed >= self.config.time_limit_seconds {
            return (false, Some(StoppingReason::TimeLimitReached));
        }
        let high_confidence_now = current_confidence >= self.config.confidence_threshold;
        let prior_streak_needed = self.config.consecutive_high_confidence.saturating_sub(1);
        if high_confidence_now && self.consecutive_high_confidence >= prior_streak_needed {
            return (false, Some(StoppingReason::ConsecutiveHighConfidence));
        }
        if self.total_evidence_count >= self.config.evidence_count_threshold {
            return (false, Some(StoppingReason::EvidenceCountMet));
        }
        (true, None)
    }

    pub fn record_iteration(&mut self, category: &str, cost: IterationCost, current_confidence: f64) {
        self.total_iterations += 1;
        *self.iterations_in_category.entry(category.to_string()).or_insert(0) += 1;
        self.total_cost_usd += cost.llm_calls as f64 * self.config.cost_per_llm_call_usd
            + cost.validation_calls as f64 * self.config.cost_per_validation_call_usd
            + cost.scrape_calls as f64 * self.config.cost_per_scrape_usd;
        self.total_evidence_count += cost.evidence_delta;

        if current_confidence >= self.config.confidence_threshold {
            self.consecutive_high_confidence += 1;
        } else {
            self.consecutive_high_confidence = 0;
        }
    }

    pub fn remaining(&self, clock: &dyn Clock) -> Remaining {
        Remaining {
            cost_usd: (self.config.cost_cap_usd - self.total_cost_usd).max(0.0),
            time_seconds: (self.config.time_limit_seconds - (clock.monotonic() - self.start_monotonic)).max(0.0),
            iterations: self.config.max_iterations_per_entity.saturating_sub(self.total_iterations),
        }
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_usd
    }

    pub fn total_iterations(&self) -> u32 {
        self.total_iterations
    }

    /// One LLM-call worth of cost, for the "one in-flight iteration can
    /// overshoot by at most its own cost" invariant.
    pub fn one_iteration_cost_usd(&self) -> f64 {
        self.config.cost_per_llm_call_usd + self.config.cost_per_validation_call_usd + self.config.cost_per_scrape_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fieldsignal_common::clock::FixedClock;

    fn controller() -> (BudgetController, FixedClock) {
        let clock = FixedClock::new(Utc::now());
        let controller = BudgetController::new(BudgetConfig::default(), &clock);
        (controller, clock)
    }

    #[test]
    fn entity_cap_fires_before_category_cap_product() {
        // Every iteration uses a distinct category so the per-category cap
        // (max_per_category * max_categories = 24) never binds on its own;
        // only the entity-wide cap of 26 should stop the run, confirming
        // check (a) is evaluated ahead of check (b).
        let (mut controller, clock) = controller();
        for i in 0..26 {
            let category = format!("category-{i}");
            let (ok, reason) = controller.can_continue(&category, 0.5, &clock);
            assert!(ok, "iteration {i} should be allowed, got {reason:?}");
            controller.record_iteration(&category, IterationCost { llm_calls: 1, ..Default::default() }, 0.5);
        }
        let (ok, reason) = controller.can_continue("category-26", 0.5, &clock);
        assert!(!ok);
        assert_eq!(reason, Some(StoppingReason::MaxIterationsReached));
        assert_eq!(controller.total_iterations(), 26);
    }

    #[test]
    fn per_category_cap_fires_before_entity_cap_when_it_binds_first() {
        let (mut controller, clock) = controller();
        for _ in 0..3 {
            controller.record_iteration("a", IterationCost { llm_calls: 1, ..Default::default() }, 0.5);
        }
        let (ok, reason) = controller.can_continue("a", 0.5, &clock);
        assert!(!ok);
        assert_eq!(reason, Some(StoppingReason::MaxIterationsReached));
        assert_eq!(controller.total_iterations(), 3);
    }

    #[test]
    fn cost_cap_stops_exploration() {
        let clock = FixedClock::new(Utc::now());
        let mut config = BudgetConfig::default();
        config.cost_cap_usd = 0.10;
        let mut controller = BudgetController::new(config, &clock);
        for _ in 0..4 {
            controller.record_iteration("a", IterationCost { llm_calls: 1, ..Default::default() }, 0.5);
        }
        let (ok, reason) = controller.can_continue("a", 0.5, &clock);
        assert!(!ok);
        assert_eq!(reason, Some(StoppingReason::CostLimitReached));
        assert!(controller.total_cost_usd() <= 0.10 + controller.one_iteration_cost_usd());
    }

    #[test]
    fn time_limit_stops_exploration() {
        let (controller, clock) = controller();
        clock.advance(301.0);
        let (ok, reason) = controller.can_continue("a", 0.5, &clock);
        assert!(!ok);
        assert_eq!(reason, Some(StoppingReason::TimeLimitReached));
    }

    #[test]
    fn consecutive_high_confidence_stops_exploration() {
        let (mut controller, clock) = controller();
        for _ in 0..3 {
            controller.record_iteration("a", IterationCost::default(), 0.9);
        }
        let (ok, reason) = controller.can_continue("a", 0.9, &clock);
        assert!(!ok);
        assert_eq!(reason, Some(StoppingReason::ConsecutiveHighConfidence));
    }
}
