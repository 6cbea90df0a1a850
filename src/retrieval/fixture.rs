//! Search backend serving precomputed hits from a JSON file.

use super::{SearchBackend, SearchHit};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Serves recorded search results keyed by query text.
///
/// File format: a JSON object mapping each query to its hit list,
/// `{"<query>": [{"content": "...", "id": "...", "distance": 0.3}, ...]}`.
/// Unknown queries yield no hits.
#[derive(Debug, Clone, Default)]
pub struct FixtureSearchBackend {
    results: HashMap<String, Vec<SearchHit>>,
}

impl FixtureSearchBackend {
    pub fn new(results: HashMap<String, Vec<SearchHit>>) -> Self {
        Self { results }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        let results: HashMap<String, Vec<SearchHit>> = serde_json::from_str(&content)
            .map_err(|e| EvalError::Serialization(format!("Failed to parse search fixtures: {e}")))?;
        Ok(Self::new(results))
    }

    pub fn insert(&mut self, query: impl Into<String>, hits: Vec<SearchHit>) {
        self.results.insert(query.into(), hits);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl SearchBackend for FixtureSearchBackend {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .results
            .get(query)
            .map(|hits| hits.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }
}
