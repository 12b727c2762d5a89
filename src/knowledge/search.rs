//! KnowledgeSearch — one query, one wholly replaced result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::model::SearchHit;
use crate::backend::{Backend, SearchResponse};

/// Outcome of a search. Backend rejections are carried as `Error`, never
/// raised past the component.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchResult {
    /// No query, or the query was cleared.
    #[default]
    Empty,
    Hits {
        query: String,
        hits: Vec<SearchHit>,
        /// Set when the backend answered without semantic search.
        advisory: Option<String>,
    },
    Error {
        query: String,
        error: String,
    },
}

impl SearchResult {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            Self::Hits { hits, .. } => hits,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

pub struct KnowledgeSearch {
    backend: Arc<dyn Backend>,
    /// Sequence number of the most recently issued query.
    issued: AtomicU64,
    current: RwLock<(u64, SearchResult)>,
}

impl KnowledgeSearch {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            issued: AtomicU64::new(0),
            current: RwLock::new((0, SearchResult::Empty)),
        }
    }

    /// The result currently on display.
    pub async fn current(&self) -> SearchResult {
        self.current.read().await.1.clone()
    }

    /// Run `query` and replace the displayed result.
    ///
    /// A blank query issues no call and clears the result. If a newer query
    /// (or clear) was issued while this one was in flight, the response is
    /// dropped and the result still on display is returned instead.
    pub async fn search(&self, query: &str) -> SearchResult {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim();
        if query.is_empty() {
            return self.apply(seq, SearchResult::Empty).await;
        }

        debug!(seq, query, "Knowledge search issued");
        let result = match self.backend.search(query).await {
            Ok(SearchResponse::Hits {
                hits,
                embedding_available,
                ..
            }) => SearchResult::Hits {
                query: query.to_string(),
                hits,
                advisory: (!embedding_available).then(|| {
                    "Semantic search is unavailable right now (embedding service offline).".to_string()
                }),
            },
            Ok(SearchResponse::Error { error }) => SearchResult::Error {
                query: query.to_string(),
                error,
            },
            Err(e) => {
                warn!(query, error = %e, "Knowledge search failed");
                SearchResult::Error {
                    query: query.to_string(),
                    error: e.to_string(),
                }
            }
        };

        self.apply(seq, result).await
    }

    /// Install `result` unless it is stale; returns what is on display.
    async fn apply(&self, seq: u64, result: SearchResult) -> SearchResult {
        let mut current = self.current.write().await;
        if seq < current.0 || seq < self.issued.load(Ordering::SeqCst) {
            warn!(seq, latest = self.issued.load(Ordering::SeqCst), "Discarding stale search result");
        } else {
            *current = (seq, result);
        }
        current.1.clone()
    }
}
