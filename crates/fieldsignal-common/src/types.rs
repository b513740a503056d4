use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Entity / Template
// ---------------------------------------------------------------------------

/// Immutable input record, created by the ingestion collaborator (out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: Uuid,
    pub name: String,
    pub entity_type: EntityType,
    pub sport: String,
    pub country: String,
    pub cluster_id: String,
    pub priority_tier: u8,
    pub digital_maturity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    SportClub,
    SportFederation,
    SportLeague,
    Other(String),
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SportClub => write!(f, "SPORT_CLUB"),
            Self::SportFederation => write!(f, "SPORT_FEDERATION"),
            Self::SportLeague => write!(f, "SPORT_LEAGUE"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Immutable versioned record describing what evidence to look for.
/// Selected by entity priority tier + type; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: Uuid,
    pub version: u32,
    pub cluster_id: String,
    pub signal_channels: Vec<String>,
    pub signal_patterns: Vec<String>,
    pub negative_filters: Vec<String>,
    pub verification_rules: Vec<String>,
}

// ---------------------------------------------------------------------------
// Hypothesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HypothesisState {
    Active,
    Resolved,
    Inactive,
}

impl fmt::Display for HypothesisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// One append-only entry in a hypothesis's confidence history. Invariant 4:
/// never mutated or removed once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceHistoryEntry {
    pub iteration: u32,
    pub raw_delta: f64,
    pub applied_delta: f64,
    pub decision: Decision,
    pub category: String,
    pub source_url: Option<String>,
    pub reason: String,
}

/// Created from a template at discovery start; mutated only by the Ralph
/// Loop and Hypothesis Manager. A duplicate statement for the same entity
/// is forbidden — see `HypothesisManager::initialise`'s dedup pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub hypothesis_id: Uuid,
    pub entity_id: Uuid,
    pub template_id: Uuid,
    pub statement: String,
    pub category: String,
    pub target_entity_type: EntityType,
    pub confidence: f64,
    pub state: HypothesisState,
    pub iterations: u32,
    pub reinforcement_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_tested_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub confidence_history: Vec<ConfidenceHistoryEntry>,
}

// ---------------------------------------------------------------------------
// Evidence / SignalCandidate / ValidatedSignal
// ---------------------------------------------------------------------------

/// Produced by the Verifier; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub source: String,
    pub source_url: String,
    pub date: DateTime<Utc>,
    pub extracted_text: String,
    pub credibility_score: f64,
    pub verified: bool,
    pub accessible: bool,
}

/// Transient — accumulated across iterations, never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub category: String,
    pub evidence: Vec<Evidence>,
    pub raw_confidence: f64,
    pub temporal_multiplier: f64,
    pub discovered_at: DateTime<Utc>,
}

/// Produced once the Ralph Loop promotes a candidate through all three
/// validation passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedSignal {
    pub id: Uuid,
    pub signal_type: String,
    pub subtype: String,
    pub entity_id: Uuid,
    pub confidence: f64,
    pub validation_pass: u8,
    pub first_seen: DateTime<Utc>,
    pub temporal_multiplier: f64,
    pub primary_reason: Option<String>,
    pub urgency: Option<String>,
    pub yp_fit_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// Ralph Loop types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Accept,
    WeakAccept,
    Reject,
    NoProgress,
    Saturated,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::WeakAccept => write!(f, "WEAK_ACCEPT"),
            Self::Reject => write!(f, "REJECT"),
            Self::NoProgress => write!(f, "NO_PROGRESS"),
            Self::Saturated => write!(f, "SATURATED"),
        }
    }
}

impl Decision {
    /// Raw delta table from.C7's decision rubric, before any
    /// guardrail multiplier is applied.
    pub fn raw_delta(self) -> f64 {
        match self {
            Decision::Accept => 0.06,
            Decision::WeakAccept => 0.02,
            Decision::Reject | Decision::NoProgress | Decision::Saturated => 0.0,
        }
    }

    pub fn is_accept_like(self) -> bool {
        matches!(self, Decision::Accept | Decision::WeakAccept)
    }
}

/// A single piece of text/URL evidence the judge pointed to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EvidenceItem {
    pub text: String,
    pub url: Option<String>,
    pub evidence_type: Option<String>,
}

/// Output of one Ralph Loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RalphDecision {
    pub decision: Decision,
    pub raw_delta: f64,
    pub applied_delta: f64,
    pub justification: String,
    pub evidence_items: Vec<EvidenceItem>,
    pub category_saturated: bool,
}

/// Per-category iteration bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total_iterations: u32,
    pub accept_count: u32,
    pub weak_accept_count: u32,
    pub reject_count: u32,
    pub no_progress_count: u32,
    pub saturated_count: u32,
    pub consecutive_rejects: u32,
    pub last_decision: Option<Decision>,
}

impl CategoryStats {
    pub fn is_saturated(&self) -> bool {
        self.consecutive_rejects >= 3
    }

    pub fn record(&mut self, decision: Decision) {
        self.total_iterations += 1;
        match decision {
            Decision::Accept => {
                self.accept_count += 1;
                self.consecutive_rejects = 0;
            }
            Decision::WeakAccept => {
                self.weak_accept_count += 1;
                self.consecutive_rejects = 0;
            }
            Decision::Reject => {
                self.reject_count += 1;
                self.consecutive_rejects += 1;
            }
            Decision::NoProgress => {
                self.no_progress_count += 1;
                self.consecutive_rejects += 1;
            }
            Decision::Saturated => {
                self.saturated_count += 1;
            }
        }
        self.last_decision = Some(decision);
    }
}

/// Transient per-run state; summary rolled into hypothesis +
/// binding updates, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RalphState {
    pub current_confidence: f64,
    pub confidence_ceiling: f64,
    pub iterations_completed: u32,
    pub category_stats: HashMap<String, CategoryStats>,
    pub confidence_saturated: bool,
    pub novelty_pool: u32,
}

impl Default for RalphState {
    fn default() -> Self {
        Self {
            current_confidence: 0.50,
            confidence_ceiling: 0.95,
            iterations_completed: 0,
            category_stats: HashMap::new(),
            confidence_saturated: false,
            novelty_pool: 0,
        }
    }
}

impl RalphState {
    pub fn category(&mut self, category: &str) -> &mut CategoryStats {
        self.category_stats.entry(category.to_string()).or_default()
    }

    pub fn total_accept_count(&self) -> u32 {
        self.category_stats.values().map(|c| c.accept_count).sum()
    }
}

// ---------------------------------------------------------------------------
// Runtime Binding + Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingState {
    Exploring,
    Promoted,
    Frozen,
    Retired,
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exploring => write!(f, "EXPLORING"),
            Self::Promoted => write!(f, "PROMOTED"),
            Self::Frozen => write!(f, "FROZEN"),
            Self::Retired => write!(f, "RETIRED"),
        }
    }
}

/// Per-(entity, template) learned channel/signal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeBinding {
    pub template_id: Uuid,
    pub entity_id: Uuid,
    pub entity_name: String,
    pub discovered_domains: Vec<String>,
    pub discovered_channels: HashMap<String, Vec<String>>,
    pub enriched_patterns: HashMap<String, Vec<String>>,
    pub confidence_adjustment: f64,
    pub usage_count: u32,
    pub success_rate: f64,
    pub state: BindingState,
    pub promoted_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RuntimeBinding {
    pub fn new(template_id: Uuid, entity_id: Uuid, entity_name: impl Into<String>) -> Self {
        Self {
            template_id,
            entity_id,
            entity_name: entity_name.into(),
            discovered_domains: Vec::new(),
            discovered_channels: HashMap::new(),
            enriched_patterns: HashMap::new(),
            confidence_adjustment: 0.0,
            usage_count: 0,
            success_rate: 0.0,
            state: BindingState::Exploring,
            promoted_at: None,
            last_used_at: None,
        }
    }
}

/// Cross-entity statistical roll-up of PROMOTED bindings in a cluster
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStats {
    pub cluster_id: String,
    pub channel_effectiveness: HashMap<String, f64>,
    pub signal_reliability: HashMap<String, f64>,
    pub discovery_shortcuts: Vec<String>,
    pub total_bindings: u32,
    pub last_updated: DateTime<Utc>,
}

impl ClusterStats {
    pub fn empty(cluster_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            channel_effectiveness: HashMap::new(),
            signal_reliability: HashMap::new(),
            discovery_shortcuts: Vec::new(),
            total_bindings: 0,
            last_updated: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Episode
// ---------------------------------------------------------------------------

/// Append-only persisted record. Compression (episode
/// clustering) produces new derived records and never mutates originals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub episode_type: String,
    pub subtype: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub source_refs: Vec<String>,
}

/// A derived, compressed grouping of episodes within a time window. Never
/// mutates the originals it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredEpisode {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub member_episode_ids: Vec<Uuid>,
    pub description: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Hop planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HopType {
    RfpPage,
    CareersPage,
    PressRelease,
    PartnerSite,
    OfficialNews,
    JobsBoard,
}

impl fmt::Display for HopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RfpPage => write!(f, "RFP_PAGE"),
            Self::CareersPage => write!(f, "CAREERS_PAGE"),
            Self::PressRelease => write!(f, "PRESS_RELEASE"),
            Self::PartnerSite => write!(f, "PARTNER_SITE"),
            Self::OfficialNews => write!(f, "OFFICIAL_NEWS"),
            Self::JobsBoard => write!(f, "JOBS_BOARD"),
        }
    }
}

impl HopType {
    pub const ALL: [HopType; 6] = [
        HopType::RfpPage,
        HopType::CareersPage,
        HopType::PressRelease,
        HopType::PartnerSite,
        HopType::OfficialNews,
        HopType::JobsBoard,
    ];

    /// Search-engine fallback preference: RFP-type hops
    /// favor google → bing → duckduckgo; other hops share the same order.
    pub fn engine_preference(self) -> &'static [&'static str] {
        &["google", "bing", "duckduckgo"]
    }

    /// Keyword table used by the URL Scorer.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            HopType::RfpPage => &["tender", "procurement", "rfp", "request for proposal"],
            HopType::CareersPage => &["careers", "jobs", "vacancy", "hiring"],
            HopType::PressRelease => &["press release", "announcement", "news"],
            HopType::PartnerSite => &["partner", "sponsor", "sponsorship"],
            HopType::OfficialNews => &["news", "official", "statement"],
            HopType::JobsBoard => &["jobs", "careers", "apply", "vacancy"],
        }
    }

    /// Prior weight used in Expected Information Gain hop planning
    ///. RFP hops are weighted highest since they are the
    /// most direct procurement signal.
    pub fn prior(self) -> f64 {
        match self {
            HopType::RfpPage => 1.0,
            HopType::PressRelease => 0.8,
            HopType::OfficialNews => 0.7,
            HopType::JobsBoard => 0.6,
            HopType::CareersPage => 0.5,
            HopType::PartnerSite => 0.4,
        }
    }
}

// ---------------------------------------------------------------------------
// Budget / stopping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoppingReason {
    MaxIterationsReached,
    CostLimitReached,
    TimeLimitReached,
    ConsecutiveHighConfidence,
    EvidenceCountMet,
    CategorySaturated,
    AllHypothesesResolved,
}

impl fmt::Display for StoppingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MaxIterationsReached => "MAX_ITERATIONS_REACHED",
            Self::CostLimitReached => "COST_LIMIT_REACHED",
            Self::TimeLimitReached => "TIME_LIMIT_REACHED",
            Self::ConsecutiveHighConfidence => "CONSECUTIVE_HIGH_CONFIDENCE",
            Self::EvidenceCountMet => "EVIDENCE_COUNT_MET",
            Self::CategorySaturated => "CATEGORY_SATURATED",
            Self::AllHypothesesResolved => "ALL_HYPOTHESES_RESOLVED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    Exploratory,
    Informed,
    Confident,
    Actionable,
}

impl ConfidenceBand {
    pub fn for_confidence(confidence: f64) -> Self {
        if confidence < 0.30 {
            Self::Exploratory
        } else if confidence < 0.60 {
            Self::Informed
        } else if confidence < 0.80 {
            Self::Confident
        } else {
            Self::Actionable
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exploratory => "EXPLORATORY",
            Self::Informed => "INFORMED",
            Self::Confident => "CONFIDENT",
            Self::Actionable => "ACTIONABLE",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Search / scrape collaborator types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrapeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub content: String,
    pub status: ScrapeStatus,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Dossier / checkpoint
// ---------------------------------------------------------------------------

/// Stable envelope emitted per entity run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dossier {
    pub entity_id: Uuid,
    pub entity_name: String,
    pub template_id: Uuid,
    pub final_confidence: f64,
    pub confidence_band: ConfidenceBand,
    pub is_actionable: bool,
    pub iterations_completed: u32,
    pub total_cost_usd: f64,
    pub validated_signals: Vec<ValidatedSignal>,
    pub hypotheses: Vec<Hypothesis>,
    pub category_stats: HashMap<String, CategoryStats>,
    pub stopping_reason: StoppingReason,
    pub failed_steps: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Batch checkpoint file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_processed_index: i64,
    pub processed_entity_ids: Vec<Uuid>,
    pub timestamp: Option<DateTime<Utc>>,
    pub failed_entities: Vec<FailedEntity>,
    pub discovery_results_summary: HashMap<Uuid, DossierSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntity {
    pub entity_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DossierSummary {
    pub final_confidence: f64,
    pub is_actionable: bool,
    pub stopping_reason: StoppingReason,
}

impl From<&Dossier> for DossierSummary {
    fn from(d: &Dossier) -> Self {
        Self {
            final_confidence: d.final_confidence,
            is_actionable: d.is_actionable,
            stopping_reason: d.stopping_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_stats_saturate_after_three_consecutive_rejects() {
        let mut stats = CategoryStats::default();
        stats.record(Decision::Reject);
        assert!(!stats.is_saturated());
        stats.record(Decision::NoProgress);
        assert!(!stats.is_saturated());
        stats.record(Decision::Reject);
        assert!(stats.is_saturated());
    }

    #[test]
    fn accept_resets_consecutive_rejects() {
        let mut stats = CategoryStats::default();
        stats.record(Decision::Reject);
        stats.record(Decision::Reject);
        stats.record(Decision::Accept);
        assert_eq!(stats.consecutive_rejects, 0);
        assert!(!stats.is_saturated());
    }

    #[test]
    fn confidence_band_boundaries() {
        assert_eq!(ConfidenceBand::for_confidence(0.10), ConfidenceBand::Exploratory);
        assert_eq!(ConfidenceBand::for_confidence(0.30), ConfidenceBand::Informed);
        assert_eq!(ConfidenceBand::for_confidence(0.60), ConfidenceBand::Confident);
        assert_eq!(ConfidenceBand::for_confidence(0.80), ConfidenceBand::Actionable);
    }
}
