use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use fieldsignal_common::{Clock, HopType, SearchResult};
use tracing::{debug, warn};

use crate::cache::SearchCache;
use crate::traits::{SearchClient, SearchEngine};

/// Fans a query out across named engines, falling through a per-hop-type
/// preference list on an empty result or an error, and caching hits for 24h
///. Grounded on the single-engine `SerperFetcher` shape from
/// the archive fetchers, generalised to multiple named engines.
pub struct MultiEngineSearchClient {
    engines: HashMap<String, Arc<dyn SearchEngine>>,
    cache: SearchCache,
    clock: Arc<dyn Clock>,
}

impl MultiEngineSearchClient {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            engines: HashMap::new(),
            cache: SearchCache::new(),
            clock,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.engines.insert(engine.name().to_string(), engine);
        self
    }

    /// Tries each engine in `hop_type`'s preference order, falling through
    /// on an empty result set or an engine error, with a cache lookup ahead
    /// of each attempt.
    pub async fn search_for_hop(
        &self,
        query: &str,
        hop_type: HopType,
        entity_name: &str,
        n: usize,
    ) -> Result<Vec<SearchResult>> {
        for engine_name in hop_type.engine_preference() {
            if let Some(cached) = self.cache.get(query, engine_name, entity_name, self.clock.as_ref()) {
                if !cached.is_empty() {
                    debug!(engine = engine_name, "search cache hit");
                    return Ok(cached);
                }
            }

            let Some(engine) = self.engines.get(*engine_name) else {
                continue;
            };

            match engine.search(query, n).await {
                Ok(results) if !results.is_empty() => {
                    self.cache.put(query, engine_name, entity_name, results.clone(), self.clock.as_ref());
                    return Ok(results);
                }
                Ok(_) => {
                    debug!(engine = engine_name, "empty result, falling through");
                    continue;
                }
                Err(e) => {
                    warn!(engine = engine_name, error = %e, "search engine failed, falling through");
                    continue;
                }
            }
        }
        Ok(Vec::new())
    }
}

#[async_trait::async_trait]
impl SearchClient for MultiEngineSearchClient {
    async fn search(&self, query: &str, engine: &str, n: usize) -> Result<Vec<SearchResult>> {
        if let Some(cached) = self.cache.get(query, engine, "", self.clock.as_ref()) {
            return Ok(cached);
        }
        let Some(handle) = self.engines.get(engine) else {
            return Ok(Vec::new());
        };
        let results = handle.search(query, n).await?;
        self.cache.put(query, engine, "", results.clone(), self.clock.as_ref());
        Ok(results)
    }
}
