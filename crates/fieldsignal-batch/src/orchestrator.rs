use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use fieldsignal_common::{
    BudgetConfig, Clock, Dossier, DossierSummary, Entity, FailedEntity, FieldSignalError, RuntimeBinding, Template,
};
use fieldsignal_core::{BudgetController, HypothesisManager};
use fieldsignal_discovery::DiscoveryOrchestrator;
use fieldsignal_llm::LlmClient;
use fieldsignal_search::{MultiEngineSearchClient, ScrapeClient};
use fieldsignal_store::{BindingStore, ClusterStatsStore, EpisodeStore, HypothesisStore};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::checkpoint;

/// Hard ceiling on batch concurrency regardless of configuration.
const MAX_CONCURRENT_ENTITIES: u32 = 10;

/// One entity paired with the template selected for it. Template selection
/// by entity priority tier + type is the ingestion collaborator's job (out
/// of scope) — the batch runner only consumes the resolved pair.
pub struct BatchJob {
    pub entity: Entity,
    pub template: Template,
}

/// Everything one batch invocation needs beyond the job list.
pub struct RunOptions {
    pub batch_size: Option<usize>,
    pub resume: bool,
    pub entity_filter: Option<HashSet<Uuid>>,
    pub checkpoint_path: PathBuf,
    pub progress_log_every: u32,
    pub max_concurrent_entities: u32,
}

/// Outcome of one batch invocation, for the binary's exit-code decision
///.
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Stateless collaborators one entity run needs; shared read-only across
/// concurrently running entities.
pub struct Collaborators {
    pub search: MultiEngineSearchClient,
    pub scrape: Arc<dyn ScrapeClient>,
    pub llm_client: Arc<dyn LlmClient>,
    pub judge_model_id: String,
    pub budget_config: BudgetConfig,
    pub binding_store: Arc<dyn BindingStore>,
    pub hypothesis_store: Arc<dyn HypothesisStore>,
    pub episode_store: Arc<dyn EpisodeStore>,
    pub cluster_stats_store: Arc<dyn ClusterStatsStore>,
    pub clock: Arc<dyn Clock>,
}

/// Sequential-by-default, optionally concurrent, checkpointed entity batch
/// runner. Failure on one entity never aborts the batch —
/// it is isolated into `Checkpoint.failed_entities` and the run continues.
pub struct BatchRunner {
    collaborators: Arc<Collaborators>,
}

impl BatchRunner {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators: Arc::new(collaborators) }
    }

    pub async fn run(&self, jobs: Vec<BatchJob>, opts: RunOptions) -> anyhow::Result<BatchSummary> {
        let checkpoint = if opts.resume {
            checkpoint::load(&opts.checkpoint_path)?
        } else {
            fieldsignal_common::Checkpoint::default()
        };
        let already_processed: HashSet<Uuid> = checkpoint.processed_entity_ids.iter().copied().collect();
        let start_idx = if opts.resume { usize::try_from(checkpoint.last_processed_index + 1).unwrap_or(0) } else { 0 };

        let mut candidates: Vec<(usize, BatchJob)> = jobs
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| *idx >= start_idx)
            .filter(|(_, job)| !already_processed.contains(&job.entity.entity_id))
            .filter(|(_, job)| opts.entity_filter.as_ref().map_or(true, |f| f.contains(&job.entity.entity_id)))
            .collect();
        if let Some(n) = opts.batch_size {
            candidates.truncate(n);
        }

        let permits = opts.max_concurrent_entities.clamp(1, MAX_CONCURRENT_ENTITIES);
        let semaphore = Arc::new(Semaphore::new(permits as usize));
        let checkpoint_state = Arc::new(Mutex::new(checkpoint.clone()));
        let completed_count = Arc::new(Mutex::new(0u32));
        let mut join_set = tokio::task::JoinSet::new();

        let total = candidates.len();
        for (idx, job) in candidates {
            let semaphore = semaphore.clone();
            let collaborators = self.collaborators.clone();
            let checkpoint_state = checkpoint_state.clone();
            let checkpoint_path = opts.checkpoint_path.clone();
            let completed_count = completed_count.clone();
            let progress_log_every = opts.progress_log_every.max(1);

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let entity_id = job.entity.entity_id;
                let entity_name = job.entity.name.clone();
                let outcome = process_entity(&job.entity, &job.template, collaborators.as_ref()).await;

                let mut state = checkpoint_state.lock().await;
                match outcome {
                    Ok(dossier) => {
                        state.processed_entity_ids.push(entity_id);
                        state.discovery_results_summary.insert(entity_id, DossierSummary::from(&dossier));
                    }
                    Err(e) => {
                        warn!(entity = %entity_name, error = %e, "entity run failed, isolating and continuing batch");
                        state.failed_entities.push(FailedEntity { entity_id, reason: e.to_string() });
                    }
                }
                state.last_processed_index = state.last_processed_index.max(idx as i64);
                state.timestamp = Some(collaborators.clock.now());
                if let Err(e) = checkpoint::save(&checkpoint_path, &state) {
                    warn!(error = %e, "failed to persist checkpoint");
                }
                drop(state);

                let mut completed = completed_count.lock().await;
                *completed += 1;
                if *completed % progress_log_every == 0 || *completed as usize == total {
                    info!(completed = *completed, total, "batch progress");
                }
            });
        }

        while join_set.join_next().await.is_some() {}

        let final_state = checkpoint_state.lock().await;
        let succeeded = final_state.processed_entity_ids.len();
        let failed = final_state.failed_entities.len();

        Ok(BatchSummary { attempted: total, succeeded, failed })
    }
}

async fn process_entity(entity: &Entity, template: &Template, collaborators: &Collaborators) -> Result<Dossier, FieldSignalError> {
    let clock = collaborators.clock.as_ref();
    let started_at = clock.now();

    let existing_binding = collaborators
        .binding_store
        .get(entity.entity_id, template.template_id)
        .await
        .map_err(|e| FieldSignalError::StoreFailure(e.to_string()))?;
    let binding = Some(existing_binding.unwrap_or_else(|| RuntimeBinding::new(template.template_id, entity.entity_id, entity.name.clone())));

    let hypotheses = HypothesisManager::initialise(template, entity, clock)?;

    let cluster_bindings = collaborators
        .binding_store
        .list(template.template_id)
        .await
        .map_err(|e| FieldSignalError::StoreFailure(e.to_string()))?;
    let cluster_stats = collaborators
        .cluster_stats_store
        .get(&entity.cluster_id)
        .await
        .map_err(|e| FieldSignalError::StoreFailure(e.to_string()))?;
    let shortcuts = fieldsignal_discovery::priority(&entity.cluster_id, cluster_stats.as_ref(), &cluster_bindings).discovery_shortcuts;

    let budget = BudgetController::new(collaborators.budget_config, clock);
    let orchestrator = DiscoveryOrchestrator::new(&collaborators.search, collaborators.scrape.as_ref(), make_ralph_loop(collaborators));

    let output = orchestrator
        .run(
            entity,
            template,
            hypotheses,
            binding,
            &shortcuts,
            budget,
            &collaborators.judge_model_id,
            collaborators.llm_client.as_ref(),
            clock,
        )
        .await;

    for hypothesis in &output.hypotheses {
        collaborators
            .hypothesis_store
            .put(hypothesis.clone())
            .await
            .map_err(|e| FieldSignalError::StoreFailure(e.to_string()))?;
    }
    for episode in &output.episodes {
        collaborators.episode_store.put(episode.clone()).await.map_err(|e| FieldSignalError::StoreFailure(e.to_string()))?;
    }
    if let Some(binding) = &output.binding {
        collaborators.binding_store.put(binding.clone()).await.map_err(|e| FieldSignalError::StoreFailure(e.to_string()))?;
    }

    Ok(Dossier {
        entity_id: entity.entity_id,
        entity_name: entity.name.clone(),
        template_id: template.template_id,
        final_confidence: output.final_confidence,
        confidence_band: output.confidence_band,
        is_actionable: output.is_actionable,
        iterations_completed: output.iterations_completed,
        total_cost_usd: output.total_cost_usd,
        validated_signals: output.validated_signals,
        hypotheses: output.hypotheses,
        category_stats: output.category_stats,
        stopping_reason: output.stopping_reason,
        failed_steps: output.failed_steps,
        started_at,
        completed_at: clock.now(),
    })
}

fn make_ralph_loop(collaborators: &Collaborators) -> fieldsignal_core::RalphLoop {
    let cascade = fieldsignal_llm::JudgeCascade::new(collaborators.llm_client.clone());
    fieldsignal_core::RalphLoop::new(cascade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fieldsignal_common::{clock::SystemClock, EntityType, ScrapeStatus, ScrapedContent};
    use fieldsignal_llm::JudgeResponse;
    use fieldsignal_store::{InMemoryBindingStore, InMemoryClusterStatsStore, InMemoryEpisodeStore, InMemoryHypothesisStore};

    struct NullScrapeClient;

    #[async_trait]
    impl ScrapeClient for NullScrapeClient {
        async fn scrape(&self, _url: &str) -> ScrapedContent {
            ScrapedContent { content: String::new(), status: ScrapeStatus::Success, error: None }
        }
    }

    struct NullLlmClient;

    #[async_trait]
    impl LlmClient for NullLlmClient {
        async fn judge(&self, _prompt: &str, model_id: &str) -> anyhow::Result<JudgeResponse> {
            Ok(JudgeResponse {
                text: "{}".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                cost_usd: 0.0,
                model_id: model_id.to_string(),
            })
        }
    }

    fn test_entity(name: &str, cluster_id: &str) -> Entity {
        Entity {
            entity_id: Uuid::new_v4(),
            name: name.to_string(),
            entity_type: EntityType::SportClub,
            sport: "football".to_string(),
            country: "NL".to_string(),
            cluster_id: cluster_id.to_string(),
            priority_tier: 1,
            digital_maturity: "low".to_string(),
        }
    }

    fn test_template() -> Template {
        Template {
            template_id: Uuid::new_v4(),
            version: 1,
            cluster_id: "cluster-a".to_string(),
            signal_channels: vec!["careers".to_string()],
            signal_patterns: vec!["seeking a digital transformation partner".to_string()],
            negative_filters: vec![],
            verification_rules: vec![],
        }
    }

    /// With no search engines registered, `resolve_url` never finds a URL,
    /// so every iteration is a NO_PROGRESS no-op — with
    /// `max_iterations_per_entity = 1` the run stops after exactly one
    /// iteration via `MaxIterationsReached`, never touching scrape or LLM.
    fn minimal_collaborators() -> Collaborators {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
        Collaborators {
            search: MultiEngineSearchClient::new(clock.clone()),
            scrape: Arc::new(NullScrapeClient),
            llm_client: Arc::new(NullLlmClient),
            judge_model_id: "test-model".to_string(),
            budget_config: BudgetConfig {
                max_iterations_per_entity: 1,
                max_iterations_per_category: 1,
                max_categories: 1,
                cost_cap_usd: 10.0,
                time_limit_seconds: 60.0,
                confidence_threshold: 0.85,
                consecutive_high_confidence: 3,
                evidence_count_threshold: 5,
                cost_per_llm_call_usd: 0.03,
                cost_per_validation_call_usd: 0.01,
                cost_per_scrape_usd: 0.001,
            },
            binding_store: Arc::new(InMemoryBindingStore::default()),
            hypothesis_store: Arc::new(InMemoryHypothesisStore::default()),
            episode_store: Arc::new(InMemoryEpisodeStore::default()),
            cluster_stats_store: Arc::new(InMemoryClusterStatsStore::default()),
            clock,
        }
    }

    fn opts(checkpoint_path: std::path::PathBuf) -> RunOptions {
        RunOptions {
            batch_size: None,
            resume: false,
            entity_filter: None,
            checkpoint_path,
            progress_log_every: 10,
            max_concurrent_entities: 1,
        }
    }

    #[tokio::test]
    async fn runs_every_job_and_checkpoints_all_as_processed() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let template = test_template();
        let jobs = vec![
            BatchJob { entity: test_entity("Alpha FC", "cluster-a"), template: template.clone() },
            BatchJob { entity: test_entity("Beta FC", "cluster-a"), template: template.clone() },
        ];

        let runner = BatchRunner::new(minimal_collaborators());
        let summary = runner.run(jobs, opts(checkpoint_path.clone())).await.unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);

        let checkpoint = checkpoint::load(&checkpoint_path).unwrap();
        assert_eq!(checkpoint.processed_entity_ids.len(), 2);
        assert_eq!(checkpoint.last_processed_index, 1);
    }

    #[tokio::test]
    async fn batch_size_truncates_the_candidate_list() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let template = test_template();
        let jobs = vec![
            BatchJob { entity: test_entity("Alpha FC", "cluster-a"), template: template.clone() },
            BatchJob { entity: test_entity("Beta FC", "cluster-a"), template: template.clone() },
            BatchJob { entity: test_entity("Gamma FC", "cluster-a"), template },
        ];

        let mut run_opts = opts(checkpoint_path);
        run_opts.batch_size = Some(1);

        let runner = BatchRunner::new(minimal_collaborators());
        let summary = runner.run(jobs, run_opts).await.unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn resume_skips_entity_ids_already_in_the_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let template = test_template();
        let already_done = test_entity("Alpha FC", "cluster-a");
        let fresh = test_entity("Beta FC", "cluster-a");

        let seed = fieldsignal_common::Checkpoint {
            last_processed_index: 0,
            processed_entity_ids: vec![already_done.entity_id],
            ..fieldsignal_common::Checkpoint::default()
        };
        checkpoint::save(&checkpoint_path, &seed).unwrap();

        let jobs = vec![
            BatchJob { entity: already_done.clone(), template: template.clone() },
            BatchJob { entity: fresh.clone(), template },
        ];

        let mut run_opts = opts(checkpoint_path.clone());
        run_opts.resume = true;

        let runner = BatchRunner::new(minimal_collaborators());
        let summary = runner.run(jobs, run_opts).await.unwrap();

        // Only the fresh entity (index 1, not yet processed) should run.
        assert_eq!(summary.attempted, 1);

        let checkpoint = checkpoint::load(&checkpoint_path).unwrap();
        assert!(checkpoint.processed_entity_ids.contains(&fresh.entity_id));
    }

    #[tokio::test]
    async fn entity_filter_restricts_to_named_ids() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let template = test_template();
        let wanted = test_entity("Alpha FC", "cluster-a");
        let unwanted = test_entity("Beta FC", "cluster-a");
        let wanted_id = wanted.entity_id;

        let jobs = vec![
            BatchJob { entity: wanted, template: template.clone() },
            BatchJob { entity: unwanted, template },
        ];

        let mut run_opts = opts(checkpoint_path.clone());
        run_opts.entity_filter = Some(std::iter::once(wanted_id).collect());

        let runner = BatchRunner::new(minimal_collaborators());
        let summary = runner.run(jobs, run_opts).await.unwrap();

        assert_eq!(summary.attempted, 1);
        let checkpoint = checkpoint::load(&checkpoint_path).unwrap();
        assert_eq!(checkpoint.processed_entity_ids, vec![wanted_id]);
    }
}
