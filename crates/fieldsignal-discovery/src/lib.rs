pub mod binding;
pub mod cluster;
pub mod embedder;
pub mod episode_clustering;
pub mod hop_planner;
pub mod orchestrator;

pub use binding::{advance_state, merge_discovery, record_use};
pub use cluster::{priority, rollup};
pub use embedder::{cosine_similarity, TextEmbedder, VoyageEmbedder};
pub use episode_clustering::{cluster_episodes, ClusteringResult};
pub use hop_planner::{plan_next_hop, HopPlan};
pub use orchestrator::{DiscoveryOrchestrator, DiscoveryRunOutput};
