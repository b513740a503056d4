/// Novelty step boundaries are calibrated values, kept configurable rather
/// than hard-coded constants scattered through the loop.
#[derive(Debug, Clone, Copy)]
pub struct NoveltyBounds {
    pub full_until: u32,
    pub mid_until: u32,
    pub low_until: u32,
}

impl Default for NoveltyBounds {
    fn default() -> Self {
        Self {
            full_until: 5,
            mid_until: 12,
            low_until: 18,
        }
    }
}

impl NoveltyBounds {
    /// `novelty ∈ {1.0 (1-5), 0.6 (6-12), 0.3 (13-18), 0.0 (>=19)}`.
    /// `iteration` is 1-indexed.
    pub fn novelty(&self, iteration: u32) -> f64 {
        if iteration <= self.full_until {
            1.0
        } else if iteration <= self.mid_until {
            0.6
        } else if iteration <= self.low_until {
            0.3
        } else {
            0.0
        }
    }
}

/// Guardrail 2 — damping: `max(0.1, 1 - (current_confidence / ceiling)^2)`.
/// Prevents runaway accumulation near the confidence ceiling.
pub fn damping(current_confidence: f64, confidence_ceiling: f64) -> f64 {
    let ratio = current_confidence / confidence_ceiling;
    (1.0 - ratio * ratio).max(0.1)
}

/// Guardrail 3 — category saturation multiplier for WEAK_ACCEPT:
/// `1 / (1 + 0.5 * weak_accept_count)`, where `weak_accept_count` is the
/// count *before* this decision is recorded (the first WEAK_ACCEPT in a
/// category gets the full delta).
pub fn category_multiplier(prior_weak_accept_count: u32) -> f64 {
    1.0 / (1.0 + 0.5 * prior_weak_accept_count as f64)
}

/// Guardrail 1 — WEAK_ACCEPT confidence ceiling: if no category has
/// recorded an ACCEPT across the whole run, clamp `final_confidence` to
/// `0.70`. Applied once, after run completion.
pub fn apply_weak_accept_ceiling(final_confidence: f64, total_accept_count: u32) -> f64 {
    if total_accept_count == 0 {
        final_confidence.min(0.70)
    } else {
        final_confidence
    }
}
