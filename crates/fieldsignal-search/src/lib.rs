pub mod cache;
pub mod engine;
pub mod multi_engine;
pub mod scorer;
pub mod scrape;
pub mod traits;

pub use cache::SearchCache;
pub use engine::SerperSearchEngine;
pub use multi_engine::MultiEngineSearchClient;
pub use scorer::{pick_best, score_url};
pub use scrape::{HttpScrapeClient, ScrapeClient};
pub use traits::{SearchClient, SearchEngine};
