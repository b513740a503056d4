pub mod checkpoint;
pub mod cli;
pub mod orchestrator;

pub use cli::Cli;
pub use orchestrator::{BatchJob, BatchRunner, BatchSummary, Collaborators, RunOptions};
