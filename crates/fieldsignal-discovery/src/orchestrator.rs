use std::collections::HashMap;

use fieldsignal_common::{
    clamp_confidence, CategoryStats, Clock, ConfidenceBand, Decision, Entity, Episode, Evidence, Hypothesis,
    HypothesisState, RalphState, RuntimeBinding, StoppingReason, Template, ValidatedSignal,
};
use fieldsignal_core::guardrails::apply_weak_accept_ceiling;
use fieldsignal_core::{BudgetController, ContextBuilder, EvidenceVerifier, HypothesisManager, IterationCost, RalphLoop, SignalValidator};
use fieldsignal_llm::LlmClient;
use fieldsignal_search::{pick_best, MultiEngineSearchClient};
use tracing::info;
use uuid::Uuid;

use crate::binding;
use crate::hop_planner::plan_next_hop;

const URL_SCORE_FLOOR: f64 = 0.2;

/// Everything one entity run produces: the assembled dossier, the episodes
/// it logged, and the runtime binding as it stood at the end of the run.
/// Persistence is the caller's job — stores are injected, not owned here.
pub struct DiscoveryRunOutput {
    pub hypotheses: Vec<Hypothesis>,
    pub binding: Option<RuntimeBinding>,
    pub episodes: Vec<Episode>,
    pub validated_signals: Vec<ValidatedSignal>,
    pub final_confidence: f64,
    pub confidence_band: ConfidenceBand,
    pub is_actionable: bool,
    pub iterations_completed: u32,
    pub category_stats: HashMap<String, CategoryStats>,
    pub total_cost_usd: f64,
    pub stopping_reason: StoppingReason,
    pub failed_steps: Vec<String>,
}

/// Per-entity, per-iteration loop. Holds only
/// stateless collaborators; all mutable run state (`RalphState`,
/// `BudgetController`, hypotheses, binding) is caller-owned and threaded
/// through `run`.
pub struct DiscoveryOrchestrator<'a> {
    search: &'a MultiEngineSearchClient,
    scrape: &'a dyn fieldsignal_search::ScrapeClient,
    ralph: RalphLoop,
    context_builder: ContextBuilder,
    verifier: EvidenceVerifier,
}

impl<'a> DiscoveryOrchestrator<'a> {
    pub fn new(search: &'a MultiEngineSearchClient, scrape: &'a dyn fieldsignal_search::ScrapeClient, ralph: RalphLoop) -> Self {
        Self {
            search,
            scrape,
            ralph,
            context_builder: ContextBuilder::new(),
            verifier: EvidenceVerifier::new(),
        }
    }

    /// Runs the full iteration loop for one entity against one template,
    /// starting from `hypotheses` (already `HypothesisManager::initialise`d)
    /// and an optional existing `binding`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        entity: &Entity,
        template: &Template,
        mut hypotheses: Vec<Hypothesis>,
        mut binding: Option<RuntimeBinding>,
        cluster_shortcuts: &[String],
        mut budget: BudgetController,
        judge_model_id: &str,
        llm_client: &dyn LlmClient,
        clock: &dyn Clock,
    ) -> DiscoveryRunOutput {
        let mut ralph_state = RalphState::default();
        let mut episodes = Vec::new();
        let mut evidence_by_category: HashMap<String, Vec<Evidence>> = HashMap::new();
        let mut failed_steps = Vec::new();
        let mut stopping_reason = StoppingReason::AllHypothesesResolved;

        loop {
            if hypotheses.iter().all(|h| h.state != HypothesisState::Active) {
                stopping_reason = StoppingReason::AllHypothesesResolved;
                break;
            }

            let iterations_in_category = category_iteration_counts(&ralph_state.category_stats);
            let Some(plan) = plan_next_hop(&hypotheses, &iterations_in_category, ralph_state.confidence_ceiling) else {
                stopping_reason = StoppingReason::AllHypothesesResolved;
                break;
            };
            let hypothesis = &hypotheses[plan.hypothesis_index];
            let category = hypothesis.category.clone();

            let (may_continue, reason) = budget.can_continue(&category, ralph_state.current_confidence, clock);
            if !may_continue {
                stopping_reason = reason.unwrap_or(StoppingReason::MaxIterationsReached);
                break;
            }

            let preferred_channel = cluster_shortcuts.first().cloned();
            let (url, title, used_shortcut) = match self
                .resolve_url(entity, plan.hop_type, preferred_channel.as_deref())
                .await
            {
                Some(found) => found,
                None => {
                    let decision = no_progress_decision("no URL scored above the selection floor");
                    self.apply_decision(
                        &mut hypotheses,
                        plan.hypothesis_index,
                        &decision,
                        None,
                        &mut ralph_state,
                        &mut episodes,
                        entity,
                        clock,
                    );
                    budget.record_iteration(&category, IterationCost::default(), ralph_state.current_confidence);
                    continue;
                }
            };
            let _ = used_shortcut;

            let scraped = self.scrape.scrape(&url).await;
            if scraped.status == fieldsignal_common::ScrapeStatus::Error {
                failed_steps.push(format!("scrape failed for {url}"));
                let decision = no_progress_decision("scrape failed");
                self.apply_decision(
                    &mut hypotheses,
                    plan.hypothesis_index,
                    &decision,
                    Some(url),
                    &mut ralph_state,
                    &mut episodes,
                    entity,
                    clock,
                );
                budget.record_iteration(&category, IterationCost { scrape_calls: 1, ..Default::default() }, ralph_state.current_confidence);
                continue;
            }

            let previous_evidence: Vec<(String, Option<String>)> = evidence_by_category
                .values()
                .flatten()
                .map(|e| (e.extracted_text.clone(), Some(e.source_url.clone())))
                .collect();

            let context = self.context_builder.build(
                &entity.name,
                entity.entity_type.clone(),
                &template.signal_patterns,
                plan.hop_type,
                &hypothesis.statement,
                ralph_state.current_confidence,
                &previous_evidence.iter().map(|(t, _)| t.clone()).collect::<Vec<_>>(),
                &scraped.content,
                &template.signal_patterns,
            );
            let prompt = self.context_builder.render_prompt(&context);

            let outcome = self.ralph.run(&prompt, &category, &mut ralph_state, &previous_evidence).await;
            let llm_call_count = outcome.llm_calls.len() as u32;

            for item in &outcome.decision.evidence_items {
                let evidence = self
                    .verifier
                    .verify(hypothesis.hypothesis_id, &title, item.url.as_deref().unwrap_or(&url), &item.text)
                    .await;
                evidence_by_category.entry(category.clone()).or_default().push(evidence);
            }

            if let Some(b) = binding.as_mut() {
                let success = outcome.decision.decision.is_accept_like();
                binding::record_use(b, success, clock.now());
                if success {
                    binding::merge_discovery(b, &plan.hop_type.to_string(), &url, Some((&category, &hypothesis.statement)));
                }
            }

            self.apply_decision(
                &mut hypotheses,
                plan.hypothesis_index,
                &outcome.decision,
                Some(url),
                &mut ralph_state,
                &mut episodes,
                entity,
                clock,
            );

            let evidence_delta = outcome.decision.evidence_items.len() as u32;
            budget.record_iteration(
                &category,
                IterationCost { llm_calls: llm_call_count, scrape_calls: 1, evidence_delta, ..Default::default() },
                ralph_state.current_confidence,
            );
        }

        let validated_signals = self.validate_categories(entity, &evidence_by_category, llm_client, judge_model_id).await;

        let total_accept_count = ralph_state.total_accept_count();
        let final_confidence = apply_weak_accept_ceiling(ralph_state.current_confidence, total_accept_count);

        DiscoveryRunOutput {
            hypotheses,
            binding,
            episodes,
            validated_signals,
            final_confidence,
            confidence_band: ConfidenceBand::for_confidence(final_confidence),
            is_actionable: ConfidenceBand::for_confidence(final_confidence) == ConfidenceBand::Actionable,
            iterations_completed: ralph_state.iterations_completed,
            category_stats: ralph_state.category_stats,
            total_cost_usd: budget.total_cost_usd(),
            stopping_reason,
            failed_steps,
        }
    }

    /// Search client -> URL scorer -> argmax. A
    /// cluster shortcut channel, when present, is tried as an extra search
    /// term ahead of the plain hop-type query.
    async fn resolve_url(
        &self,
        entity: &Entity,
        hop_type: fieldsignal_common::HopType,
        preferred_channel: Option<&str>,
    ) -> Option<(String, String, bool)> {
        let keyword = hop_type.keywords().first().copied().unwrap_or("");
        let query = match preferred_channel {
            Some(channel) => format!("{} {} {}", entity.name, channel, keyword),
            None => format!("{} {}", entity.name, keyword),
        };
        let results = self.search.search_for_hop(&query, hop_type, &entity.name, 10).await.ok()?;
        let best = pick_best(&results, hop_type, &entity.name)?;
        let score = fieldsignal_search::score_url(&best.url, hop_type, &entity.name, &best.title, &best.snippet);
        if score <= URL_SCORE_FLOOR {
            return None;
        }
        Some((best.url.clone(), best.title.clone(), preferred_channel.is_some()))
    }

    fn apply_decision(
        &self,
        hypotheses: &mut [Hypothesis],
        hypothesis_index: usize,
        decision: &fieldsignal_common::RalphDecision,
        source_url: Option<String>,
        ralph_state: &mut RalphState,
        episodes: &mut Vec<Episode>,
        entity: &Entity,
        clock: &dyn Clock,
    ) {
        let hypothesis = &mut hypotheses[hypothesis_index];
        HypothesisManager::update(hypothesis, decision, source_url.clone(), clock);
        ralph_state.current_confidence = clamp_confidence(hypothesis.confidence);

        episodes.push(Episode {
            id: Uuid::new_v4(),
            entity_id: entity.entity_id,
            episode_type: "discovery".to_string(),
            subtype: hypothesis.category.clone(),
            description: decision.justification.clone(),
            timestamp: clock.now(),
            confidence: hypothesis.confidence,
            source_refs: source_url.into_iter().collect(),
        });

        info!(
            entity = %entity.name,
            hypothesis = %hypothesis.statement,
            decision = %decision.decision,
            confidence = hypothesis.confidence,
            "discovery hop complete"
        );
    }

    /// Attempts three-pass validation once per category that accumulated
    /// evidence during the run.
    async fn validate_categories(
        &self,
        entity: &Entity,
        evidence_by_category: &HashMap<String, Vec<Evidence>>,
        llm_client: &dyn LlmClient,
        judge_model_id: &str,
    ) -> Vec<ValidatedSignal> {
        let validator = SignalValidator::new(llm_client, judge_model_id.to_string());
        let mut signals = Vec::new();
        for (category, evidence) in evidence_by_category {
            let aggregate_confidence =
                evidence.iter().map(|e| e.credibility_score).sum::<f64>() / evidence.len().max(1) as f64;
            match validator.validate(entity.entity_id, category, category, evidence, aggregate_confidence).await {
                Ok((signal, _, _)) => signals.push(signal),
                Err(e) => {
                    tracing::debug!(category, error = ?e, "signal candidate did not pass validation");
                }
            }
        }
        signals
    }
}

fn category_iteration_counts(category_stats: &HashMap<String, CategoryStats>) -> HashMap<String, u32> {
    category_stats.iter().map(|(k, v)| (k.clone(), v.total_iterations)).collect()
}

fn no_progress_decision(reason: &str) -> fieldsignal_common::RalphDecision {
    fieldsignal_common::RalphDecision {
        decision: Decision::NoProgress,
        raw_delta: 0.0,
        applied_delta: 0.0,
        justification: reason.to_string(),
        evidence_items: Vec::new(),
        category_saturated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use fieldsignal_common::clock::FixedClock;
    use fieldsignal_common::{BudgetConfig, EntityType, ScrapeStatus, ScrapedContent, SearchResult};
    use fieldsignal_core::BudgetController;
    use fieldsignal_llm::{JudgeCascade, JudgeResponse};
    use fieldsignal_search::{ScrapeClient, SearchEngine};
    use std::sync::Mutex;

    struct HitEngine;

    #[async_trait]
    impl SearchEngine for HitEngine {
        fn name(&self) -> &str {
            "google"
        }

        async fn search(&self, _query: &str, _n: usize) -> anyhow::Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                url: "https://www.arsenal.com/procurement/tender".to_string(),
                title: "Arsenal FC Procurement Tender".to_string(),
                snippet: "open tender for kit supplier".to_string(),
                rank: 1,
            }])
        }
    }

    struct StubScrapeClient;

    #[async_trait]
    impl ScrapeClient for StubScrapeClient {
        async fn scrape(&self, _url: &str) -> ScrapedContent {
            ScrapedContent {
                content: "Arsenal FC is issuing a tender for a kit supplier partner".to_string(),
                status: ScrapeStatus::Success,
                error: None,
            }
        }
    }

    struct ScriptedLlmClient {
        responses: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlmClient {
        async fn judge(&self, _prompt: &str, model_id: &str) -> anyhow::Result<JudgeResponse> {
            let mut responses = self.responses.lock().unwrap();
            let text = if responses.is_empty() { "{}".to_string() } else { responses.remove(0).to_string() };
            Ok(JudgeResponse { text, input_tokens: 10, output_tokens: 10, cost_usd: 0.03, model_id: model_id.to_string() })
        }
    }

    fn arsenal() -> Entity {
        Entity {
            entity_id: Uuid::new_v4(),
            name: "Arsenal FC".to_string(),
            entity_type: EntityType::SportClub,
            sport: "football".to_string(),
            country: "GB".to_string(),
            cluster_id: "tier_1_club_centralized_procurement".to_string(),
            priority_tier: 1,
            digital_maturity: "high".to_string(),
        }
    }

    fn rfp_template() -> Template {
        Template {
            template_id: Uuid::new_v4(),
            version: 1,
            cluster_id: "tier_1_club_centralized_procurement".to_string(),
            signal_channels: vec!["rfp".to_string()],
            signal_patterns: vec!["procurement tender".to_string()],
            negative_filters: vec![],
            verification_rules: vec![],
        }
    }

    /// Every iteration finds the same high-scoring URL and the judge
    /// returns a distinct ACCEPT quote each time, so the run should make
    /// steady forward progress and stop only once the entity's iteration
    /// cap is spent — never via a search, scrape, or parse failure.
    #[tokio::test]
    async fn full_run_accumulates_confidence_and_stops_at_max_iterations() {
        let clock = FixedClock::new(Utc::now());
        let clock_arc: std::sync::Arc<dyn Clock> = std::sync::Arc::new(clock);
        let search = MultiEngineSearchClient::new(clock_arc.clone()).with_engine(std::sync::Arc::new(HitEngine));
        let scrape = StubScrapeClient;
        let llm_client = ScriptedLlmClient {
            responses: Mutex::new(vec![
                r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"issuing a tender","evidence_found":[{"text":"Arsenal FC is issuing a tender for a kit supplier partner","url":"https://www.arsenal.com/procurement/tender"}]}"#,
                r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"second quote","evidence_found":[{"text":"second distinct piece of evidence","url":"https://www.arsenal.com/procurement/tender"}]}"#,
                r#"{"decision":"ACCEPT","confidence_delta":0.06,"justification":"third quote","evidence_found":[{"text":"third distinct piece of evidence","url":"https://www.arsenal.com/procurement/tender"}]}"#,
            ]),
        };
        let cascade = JudgeCascade::new(std::sync::Arc::new(llm_client));
        let ralph = RalphLoop::new(cascade);
        let orchestrator = DiscoveryOrchestrator::new(&search, &scrape, ralph);

        let entity = arsenal();
        let template = rfp_template();
        let hypotheses = HypothesisManager::initialise(&template, &entity, clock_arc.as_ref()).unwrap();

        let budget_config = BudgetConfig {
            max_iterations_per_entity: 3,
            max_iterations_per_category: 3,
            max_categories: 8,
            cost_cap_usd: 10.0,
            time_limit_seconds: 60.0,
            confidence_threshold: 0.99,
            consecutive_high_confidence: 3,
            evidence_count_threshold: 100,
            cost_per_llm_call_usd: 0.03,
            cost_per_validation_call_usd: 0.01,
            cost_per_scrape_usd: 0.001,
        };
        let budget = BudgetController::new(budget_config, clock_arc.as_ref());
        let judge_client = NullJudgeClient;

        let output = orchestrator
            .run(&entity, &template, hypotheses, None, &[], budget, "test-model", &judge_client, clock_arc.as_ref())
            .await;

        assert_eq!(output.iterations_completed, 3);
        assert_eq!(output.stopping_reason, StoppingReason::MaxIterationsReached);
        assert!(output.final_confidence > 0.50, "got {}", output.final_confidence);
        assert!(output.episodes.len() == 3);
    }

    struct NullJudgeClient;

    #[async_trait]
    impl LlmClient for NullJudgeClient {
        async fn judge(&self, _prompt: &str, model_id: &str) -> anyhow::Result<JudgeResponse> {
            Ok(JudgeResponse {
                text: r#"{"valid":false,"reason":"insufficient evidence for three-pass validation in this test"}"#.to_string(),
                input_tokens: 0,
                output_tokens: 0,
                cost_usd: 0.0,
                model_id: model_id.to_string(),
            })
        }
    }
}
