use chrono::{DateTime, Utc};
use fieldsignal_common::{BindingState, RuntimeBinding};

const PROMOTE_USAGE: u32 = 3;
const PROMOTE_SUCCESS_RATE: f64 = 0.75;
const RETIRE_USAGE: u32 = 5;
const RETIRE_SUCCESS_RATE: f64 = 0.30;
const FROZEN_IDLE_DAYS: i64 = 7;
const DEMOTE_SUCCESS_RATE: f64 = 0.50;

/// Applies the binding state machine after a binding's
/// `usage_count`/`success_rate` have been updated for the current use.
/// `now` drives the idle-time check for `PROMOTED -> FROZEN`.
pub fn advance_state(binding: &mut RuntimeBinding, now: DateTime<Utc>) {
    match binding.state {
        BindingState::Exploring => {
            if binding.usage_count >= PROMOTE_USAGE && binding.success_rate >= PROMOTE_SUCCESS_RATE {
                binding.state = BindingState::Promoted;
                binding.promoted_at = Some(now);
            } else if binding.usage_count >= RETIRE_USAGE && binding.success_rate < RETIRE_SUCCESS_RATE {
                binding.state = BindingState::Retired;
            }
        }
        BindingState::Promoted => {
            let idle_days = binding
                .last_used_at
                .map(|last| (now - last).num_days())
                .unwrap_or(0);
            if idle_days >= FROZEN_IDLE_DAYS {
                binding.state = BindingState::Frozen;
            } else if binding.success_rate < DEMOTE_SUCCESS_RATE {
                binding.state = BindingState::Exploring;
                binding.promoted_at = None;
            }
        }
        BindingState::Frozen => {
            // Re-entry on any use is handled by the caller recording the use
            // before calling `advance_state`; a frozen binding that is used
            // re-validates straight to PROMOTED.
            binding.state = BindingState::Promoted;
            binding.promoted_at = Some(now);
        }
        BindingState::Retired => {
            // terminal
        }
    }
}

/// Records one use of a binding: bumps `usage_count`, folds `success` into
/// `success_rate` as a simple running mean over the last `RATE_WINDOW` uses,
/// refreshes `last_used_at`, and runs the state machine.
pub fn record_use(binding: &mut RuntimeBinding, success: bool, now: DateTime<Utc>) {
    const RATE_WINDOW: f64 = 5.0;
    let prior_weight = (binding.usage_count as f64).min(RATE_WINDOW - 1.0);
    let outcome = if success { 1.0 } else { 0.0 };
    binding.success_rate = if binding.usage_count == 0 {
        outcome
    } else {
        (binding.success_rate * prior_weight + outcome) / (prior_weight + 1.0)
    };
    binding.usage_count += 1;
    binding.last_used_at = Some(now);
    advance_state(binding, now);
}

/// Merges newly discovered channel URLs and pattern examples into a binding,
/// deduplicating both.
pub fn merge_discovery(
    binding: &mut RuntimeBinding,
    channel: &str,
    url: &str,
    pattern: Option<(&str, &str)>,
) {
    let urls = binding.discovered_channels.entry(channel.to_string()).or_default();
    if !urls.iter().any(|u| u == url) {
        urls.push(url.to_string());
    }
    if !binding.discovered_domains.iter().any(|d| d == url) {
        if let Ok(parsed) = url::Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                if !binding.discovered_domains.iter().any(|d| d == host) {
                    binding.discovered_domains.push(host.to_string());
                }
            }
        }
    }
    if let Some((pattern_key, example)) = pattern {
        let examples = binding.enriched_patterns.entry(pattern_key.to_string()).or_default();
        if !examples.iter().any(|e| e == example) {
            examples.push(example.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn binding() -> RuntimeBinding {
        RuntimeBinding::new(Uuid::new_v4(), Uuid::new_v4(), "Arsenal FC")
    }

    #[test]
    fn promotes_after_three_successful_uses() {
        let mut b = binding();
        let now = Utc::now();
        for _ in 0..3 {
            record_use(&mut b, true, now);
        }
        assert_eq!(b.state, BindingState::Promoted);
        assert!(b.promoted_at.is_some());
    }

    #[test]
    fn retires_after_five_mostly_failed_uses() {
        let mut b = binding();
        let now = Utc::now();
        for _ in 0..5 {
            record_use(&mut b, false, now);
        }
        assert_eq!(b.state, BindingState::Retired);
    }

    #[test]
    fn promoted_binding_freezes_after_seven_idle_days() {
        let mut b = binding();
        let now = Utc::now();
        for _ in 0..3 {
            record_use(&mut b, true, now);
        }
        assert_eq!(b.state, BindingState::Promoted);
        advance_state(&mut b, now + chrono::Duration::days(8));
        assert_eq!(b.state, BindingState::Frozen);
    }

    #[test]
    fn frozen_binding_revalidates_to_promoted_on_use() {
        let mut b = binding();
        let now = Utc::now();
        for _ in 0..3 {
            record_use(&mut b, true, now);
        }
        advance_state(&mut b, now + chrono::Duration::days(8));
        assert_eq!(b.state, BindingState::Frozen);
        record_use(&mut b, true, now + chrono::Duration::days(9));
        assert_eq!(b.state, BindingState::Promoted);
    }

    #[test]
    fn merge_discovery_deduplicates_urls_and_patterns() {
        let mut b = binding();
        merge_discovery(&mut b, "rfp", "https://arsenal.com/rfp", Some(("kit supplier rfp", "example 1")));
        merge_discovery(&mut b, "rfp", "https://arsenal.com/rfp", Some(("kit supplier rfp", "example 1")));
        assert_eq!(b.discovered_channels["rfp"].len(), 1);
        assert_eq!(b.enriched_patterns["kit supplier rfp"].len(), 1);
    }
}
