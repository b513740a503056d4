use std::path::PathBuf;

use clap::Parser;
use uuid::Uuid;

/// CLI surface for batch discovery runs.
#[derive(Parser, Debug)]
#[command(name = "fieldsignal-batch", about = "Hypothesis-driven procurement-signal discovery, run over a batch of entities")]
pub struct Cli {
    /// Max number of entities to process in this invocation.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Resume from the checkpoint file instead of starting fresh.
    #[arg(long, default_value_t = false)]
    pub resume: bool,

    /// Comma-separated entity ids to process, instead of the full ordered list.
    #[arg(long, value_delimiter = ',')]
    pub entities: Option<Vec<Uuid>>,

    /// Override `BudgetConfig::max_iterations_per_entity` for this run.
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Override `BudgetConfig::cost_cap_usd` for this run.
    #[arg(long)]
    pub cost_cap: Option<f64>,

    /// Path to the `exploration-budget.json` configuration file.
    #[arg(long, default_value = "exploration-budget.json")]
    pub config: PathBuf,
}
