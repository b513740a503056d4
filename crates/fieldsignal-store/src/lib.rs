pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{InMemoryBindingStore, InMemoryClusterStatsStore, InMemoryEpisodeStore, InMemoryHypothesisStore};
pub use postgres::{migrate, PgBindingStore, PgClusterStatsStore, PgEpisodeStore, PgHypothesisStore};
pub use traits::{BindingStore, ClusterStatsStore, EpisodeStore, HypothesisStore};
