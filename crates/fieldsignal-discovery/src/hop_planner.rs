use std::collections::HashMap;

use fieldsignal_common::{Hypothesis, HypothesisState};
use fieldsignal_core::guardrails::category_multiplier;

/// A chosen `(hypothesis, hop_type)` pair to explore next.
#[derive(Debug, Clone, Copy)]
pub struct HopPlan {
    pub hypothesis_index: usize,
    pub hop_type: fieldsignal_common::HopType,
    pub eig: f64,
}

/// Picks the next hop via Expected Information Gain:
/// `EIG = hypothesis.confidence_gap * category_multiplier * hop_type_prior`,
/// tied-broken by lowest `iterations_in_category`. `confidence_gap` is the
/// room left to `confidence_ceiling`; `category_multiplier` reuses the
/// Ralph Loop's saturation-decay shape, applied to how many iterations the
/// category has already spent, so heavily-explored categories are
/// deprioritised in favour of less-explored ones. Only `ACTIVE` hypotheses
/// are considered; `None` only if every hypothesis is non-ACTIVE.
pub fn plan_next_hop(
    hypotheses: &[Hypothesis],
    iterations_in_category: &HashMap<String, u32>,
    confidence_ceiling: f64,
) -> Option<HopPlan> {
    let mut best: Option<HopPlan> = None;
    let mut best_category_iterations = u32::MAX;

    for (idx, hypothesis) in hypotheses.iter().enumerate() {
        if hypothesis.state != HypothesisState::Active {
            continue;
        }
        let category_iterations = iterations_in_category.get(&hypothesis.category).copied().unwrap_or(0);
        let confidence_gap = (confidence_ceiling - hypothesis.confidence).max(0.0);
        let multiplier = category_multiplier(category_iterations);

        for hop_type in fieldsignal_common::HopType::ALL {
            let eig = confidence_gap * multiplier * hop_type.prior();
            let is_better = match &best {
                None => true,
                Some(current) => {
                    eig > current.eig
                        || (eig == current.eig && category_iterations < best_category_iterations)
                }
            };
            if is_better {
                best = Some(HopPlan { hypothesis_index: idx, hop_type, eig });
                best_category_iterations = category_iterations;
            }
        }
    }

    best
}
