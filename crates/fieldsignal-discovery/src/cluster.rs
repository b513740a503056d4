use std::collections::HashMap;

use chrono::Utc;
use fieldsignal_common::{BindingState, ClusterStats, RuntimeBinding};

/// Rolls up `PROMOTED` bindings for a cluster into channel-effectiveness and
/// signal-reliability scores. Plain, store-independent
/// arithmetic over whatever the caller already fetched — grounded on the
/// shape of `Clusterer::run`'s staged roll-up without its graph-database
/// specifics.
pub fn rollup(cluster_id: &str, bindings: &[RuntimeBinding]) -> ClusterStats {
    let promoted: Vec<&RuntimeBinding> = bindings
        .iter()
        .filter(|b| b.state == BindingState::Promoted)
        .collect();

    let mut channel_effectiveness: HashMap<String, f64> = HashMap::new();
    let mut channel_weight: HashMap<String, f64> = HashMap::new();
    for binding in &promoted {
        for channel in binding.discovered_channels.keys() {
            *channel_effectiveness.entry(channel.clone()).or_insert(0.0) +=
                binding.success_rate * binding.usage_count as f64;
            *channel_weight.entry(channel.clone()).or_insert(0.0) += binding.usage_count as f64;
        }
    }
    for (channel, weight) in &channel_weight {
        if *weight > 0.0 {
            if let Some(score) = channel_effectiveness.get_mut(channel) {
                *score /= weight;
            }
        }
    }

    let mut pattern_success: HashMap<String, Vec<f64>> = HashMap::new();
    for binding in &promoted {
        for pattern in binding.enriched_patterns.keys() {
            pattern_success.entry(pattern.clone()).or_default().push(binding.success_rate);
        }
    }
    let signal_reliability: HashMap<String, f64> = pattern_success
        .into_iter()
        .map(|(pattern, rates)| {
            let count = rates.len();
            let mean = rates.iter().sum::<f64>() / count as f64;
            (pattern, mean + (0.1f64).min(0.01 * count as f64))
        })
        .collect();

    let mut discovery_shortcuts: Vec<(String, f64)> = channel_effectiveness.iter().map(|(c, s)| (c.clone(), *s)).collect();
    discovery_shortcuts.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ClusterStats {
        cluster_id: cluster_id.to_string(),
        channel_effectiveness,
        signal_reliability,
        discovery_shortcuts: discovery_shortcuts.into_iter().map(|(c, _)| c).collect(),
        total_bindings: promoted.len() as u32,
        last_updated: Utc::now(),
    }
}

/// Returns the shortcut channel list for a cluster, rolling up lazily if
/// `stats` is absent or empty`).
pub fn priority(cluster_id: &str, stats: Option<&ClusterStats>, bindings: &[RuntimeBinding]) -> ClusterStats {
    match stats {
        Some(s) if !s.discovery_shortcuts.is_empty() => s.clone(),
        _ => rollup(cluster_id, bindings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn promoted_binding(channel: &str, success_rate: f64, usage_count: u32) -> RuntimeBinding {
        let mut b = RuntimeBinding::new(Uuid::new_v4(), Uuid::new_v4(), "Entity");
        b.state = BindingState::Promoted;
        b.success_rate = success_rate;
        b.usage_count = usage_count;
        b.discovered_channels.insert(channel.to_string(), vec!["https://example.com".to_string()]);
        b
    }

    #[test]
    fn rollup_ignores_non_promoted_bindings() {
        let mut exploring = RuntimeBinding::new(Uuid::new_v4(), Uuid::new_v4(), "Entity");
        exploring.discovered_channels.insert("rfp".to_string(), vec!["x".to_string()]);
        let stats = rollup("cluster-a", &[exploring]);
        assert!(stats.channel_effectiveness.is_empty());
        assert_eq!(stats.total_bindings, 0);
    }

    #[test]
    fn channel_effectiveness_is_usage_weighted_mean_success_rate() {
        let bindings = vec![promoted_binding("rfp", 1.0, 10), promoted_binding("rfp", 0.0, 2)];
        let stats = rollup("cluster-a", &bindings);
        let expected = (1.0 * 10.0 + 0.0 * 2.0) / 12.0;
        assert!((stats.channel_effectiveness["rfp"] - expected).abs() < 1e-9);
    }

    #[test]
    fn discovery_shortcuts_sorted_descending_by_effectiveness() {
        let bindings = vec![promoted_binding("careers", 0.2, 5), promoted_binding("rfp", 0.9, 5)];
        let stats = rollup("cluster-a", &bindings);
        assert_eq!(stats.discovery_shortcuts[0], "rfp");
    }
}
