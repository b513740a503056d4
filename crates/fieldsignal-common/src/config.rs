use std::env;

/// Application configuration loaded from environment variables, with the
/// budget knob defaults baked in (overridable via the
/// `exploration-budget.json` configuration file — see `fieldsignal-batch`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    // LLM providers
    pub anthropic_api_key: String,

    // Search / scrape
    pub search_api_key: String,
    pub scrape_base_url: String,
    pub scrape_token: String,

    // Store
    pub database_url: String,

    // Budget
    pub budget: BudgetConfig,

    // Batch
    pub checkpoint_path: String,
    pub progress_log_every: u32,
    pub max_concurrent_entities: u32,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BudgetConfig {
    pub max_iterations_per_entity: u32,
    pub max_iterations_per_category: u32,
    pub max_categories: u32,
    pub cost_cap_usd: f64,
    pub time_limit_seconds: f64,
    pub confidence_threshold: f64,
    pub consecutive_high_confidence: u32,
    pub evidence_count_threshold: u32,
    /// Cost per LLM call, cents-denominated to avoid float drift across
    /// many accumulations.
    pub cost_per_llm_call_usd: f64,
    pub cost_per_validation_call_usd: f64,
    pub cost_per_scrape_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_iterations_per_entity: 26,
            max_iterations_per_category: 3,
            max_categories: 8,
            cost_cap_usd: 0.50,
            time_limit_seconds: 300.0,
            confidence_threshold: 0.85,
            consecutive_high_confidence: 3,
            evidence_count_threshold: 5,
            cost_per_llm_call_usd: 0.03,
            cost_per_validation_call_usd: 0.01,
            cost_per_scrape_usd: 0.001,
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Panics with a clear
    /// message if required vars are missing — fail-fast, ahead of the
    /// `ConfigError` policy; the binary turns this panic into exit code 1
    /// before any entity processing starts.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            search_api_key: required_env("SEARCH_API_KEY"),
            scrape_base_url: env::var("SCRAPE_BASE_URL")
                .unwrap_or_else(|_| "https://scrape.invalid".to_string()),
            scrape_token: env::var("SCRAPE_TOKEN").unwrap_or_default(),
            database_url: required_env("DATABASE_URL"),
            budget: BudgetConfig::default(),
            checkpoint_path: env::var("CHECKPOINT_PATH")
                .unwrap_or_else(|_| "checkpoint.json".to_string()),
            progress_log_every: env::var("PROGRESS_LOG_EVERY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_concurrent_entities: env::var("MAX_CONCURRENT_ENTITIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }

    /// Log the first few characters' length of each sensitive env var for
    /// debugging, never the value itself.
    pub fn log_redacted(&self) {
        let vars = [
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
            ("SEARCH_API_KEY", &self.search_api_key),
            ("SCRAPE_TOKEN", &self.scrape_token),
            ("DATABASE_URL", &self.database_url),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_matches_documented_defaults() {
        let budget = BudgetConfig::default();
        assert_eq!(budget.max_iterations_per_entity, 26);
        assert_eq!(budget.max_iterations_per_category, 3);
        assert_eq!(budget.max_categories, 8);
        assert_eq!(budget.cost_cap_usd, 0.50);
        assert_eq!(budget.time_limit_seconds, 300.0);
        assert_eq!(budget.confidence_threshold, 0.85);
        assert_eq!(budget.consecutive_high_confidence, 3);
        assert_eq!(budget.evidence_count_threshold, 5);
    }
}
