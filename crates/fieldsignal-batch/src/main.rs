use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fieldsignal_batch::{BatchJob, BatchRunner, Cli, Collaborators, RunOptions};
use fieldsignal_common::{Clock, Config, Entity, SystemClock, Template};
use fieldsignal_llm::{HttpLlmClient, LlmTier};
use fieldsignal_search::{HttpScrapeClient, MultiEngineSearchClient, SerperSearchEngine};
use fieldsignal_store::{migrate, PgBindingStore, PgClusterStatsStore, PgEpisodeStore, PgHypothesisStore};
use tracing_subscriber::EnvFilter;

/// One entity/template pair as it appears in the entity-list input file.
/// Assembly of that list is the ingestion collaborator's job; the batch
/// entry point only reads it.
#[derive(Debug, serde::Deserialize)]
struct JobInput {
    entity: Entity,
    template: Template,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fieldsignal=info".parse()?))
        .init();

    let cli = Cli::parse();
    let exit_code = run(cli).await.unwrap_or_else(|e| {
        tracing::error!(error = ?e, "batch run failed");
        e.downcast_ref::<fieldsignal_common::FieldSignalError>().map(|fe| fe.exit_code()).unwrap_or(1)
    });
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::from_env();
    config.log_redacted();

    if let Some(max_iterations) = cli.max_iterations {
        config.budget.max_iterations_per_entity = max_iterations;
    }
    if let Some(cost_cap) = cli.cost_cap {
        config.budget.cost_cap_usd = cost_cap;
    }

    tracing::info!(config = %cli.config.display(), "using exploration budget config");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connecting to store")
        .map_err(|e| fieldsignal_common::FieldSignalError::StoreFailure(e.to_string()))?;
    migrate(&pool).await.map_err(|e| fieldsignal_common::FieldSignalError::StoreFailure(e.to_string()))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());

    let search = MultiEngineSearchClient::new(clock.clone())
        .with_engine(Arc::new(SerperSearchEngine::new(config.search_api_key.clone())));

    let collaborators = Collaborators {
        search,
        scrape: Arc::new(HttpScrapeClient::new()),
        llm_client: Arc::new(HttpLlmClient::new(config.anthropic_api_key.clone())),
        judge_model_id: LlmTier::Mid.default_model_id().to_string(),
        budget_config: config.budget,
        binding_store: Arc::new(PgBindingStore::new(pool.clone())),
        hypothesis_store: Arc::new(PgHypothesisStore::new(pool.clone())),
        episode_store: Arc::new(PgEpisodeStore::new(pool.clone())),
        cluster_stats_store: Arc::new(PgClusterStatsStore::new(pool.clone())),
        clock,
    };

    let jobs = load_jobs(&entities_path())?;
    tracing::info!(count = jobs.len(), "loaded entity batch");

    let opts = RunOptions {
        batch_size: cli.batch_size,
        resume: cli.resume,
        entity_filter: cli.entities.map(|ids| ids.into_iter().collect::<HashSet<_>>()),
        checkpoint_path: PathBuf::from(config.checkpoint_path),
        progress_log_every: config.progress_log_every,
        max_concurrent_entities: config.max_concurrent_entities,
    };

    let runner = BatchRunner::new(collaborators);
    let summary = runner.run(jobs, opts).await?;

    tracing::info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "batch run complete"
    );

    Ok(if summary.failed > 0 { 2 } else { 0 })
}

fn entities_path() -> PathBuf {
    std::env::var("ENTITIES_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("entities.json"))
}

fn load_jobs(path: &std::path::Path) -> Result<Vec<BatchJob>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading entity list {}", path.display()))
        .map_err(|e| fieldsignal_common::FieldSignalError::Config(e.to_string()))?;
    let inputs: Vec<JobInput> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing entity list {}", path.display()))
        .map_err(|e| fieldsignal_common::FieldSignalError::Config(e.to_string()))?;
    Ok(inputs.into_iter().map(|i| BatchJob { entity: i.entity, template: i.template }).collect())
}
