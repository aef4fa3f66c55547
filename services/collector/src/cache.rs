//! Caller-owned cache of the normalized dataset.
//!
//! The cache holds at most one entry: the canonical table for the configured
//! source, or the reason it could not be produced. Nothing is refetched
//! implicitly after a failure; callers trigger [`DatasetCache::reload`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cvm_parser::normalize::{normalize_or_empty, NormalizeReport};
use cvm_parser::CanonicalTable;
use serde::Serialize;
use uuid::Uuid;

use crate::error::FetchError;
use crate::source::{fetch_source, RawArtifact, SourceLocation};

/// What a payload is memoized by: where it came from and what it contained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceIdentity {
    pub source: SourceLocation,
    pub content_hash: String,
}

#[derive(Debug, PartialEq)]
pub struct Dataset {
    pub table: CanonicalTable,
    pub report: NormalizeReport,
    pub identity: SourceIdentity,
    pub size_bytes: usize,
}

#[derive(Debug, Clone)]
pub enum DatasetState {
    Ready(Arc<Dataset>),
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub load_id: Uuid,
    pub source: SourceLocation,
    /// When the current state was produced.
    pub loaded_at: DateTime<Utc>,
    /// When the source was last fetched, even if nothing changed.
    pub checked_at: DateTime<Utc>,
    pub state: DatasetState,
}

impl CacheEntry {
    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        match &self.state {
            DatasetState::Ready(dataset) => Some(dataset),
            DatasetState::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            DatasetState::Ready(_) => None,
            DatasetState::Failed { reason } => Some(reason),
        }
    }
}

#[derive(Debug)]
pub struct DatasetCache {
    location: SourceLocation,
    entry: Option<Arc<CacheEntry>>,
}

impl DatasetCache {
    pub fn new(location: SourceLocation) -> Self {
        Self { location, entry: None }
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn current(&self) -> Option<Arc<CacheEntry>> {
        self.entry.clone()
    }

    /// Return the cached entry, fetching only when nothing is cached yet.
    /// A cached failure is returned as-is.
    pub async fn get_or_load(&mut self, client: &reqwest::Client) -> Arc<CacheEntry> {
        if let Some(entry) = &self.entry {
            return entry.clone();
        }
        self.reload(client).await
    }

    /// Always refetch. The result replaces whatever was cached.
    pub async fn reload(&mut self, client: &reqwest::Client) -> Arc<CacheEntry> {
        let fetched = fetch_source(client, &self.location).await;
        self.install(fetched)
    }

    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            tracing::info!(source = %self.location, "dataset cache invalidated");
        }
    }

    /// Turn a fetch outcome into the cached entry. A payload identical to the
    /// cached one keeps the existing table instead of normalizing it again.
    pub fn install(&mut self, fetched: Result<RawArtifact, FetchError>) -> Arc<CacheEntry> {
        let now = Utc::now();

        let artifact = match fetched {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!(source = %self.location, error = %e, "failed to fetch source");
                return self.store(now, DatasetState::Failed {
                    reason: e.to_string(),
                });
            }
        };

        let identity = SourceIdentity {
            source: artifact.source.clone(),
            content_hash: artifact.content_hash.clone(),
        };

        if let Some(entry) = &self.entry {
            if entry.dataset().is_some_and(|d| d.identity == identity) {
                tracing::info!(hash = %identity.content_hash, "source unchanged, keeping cached table");
                let entry = Arc::new(CacheEntry {
                    checked_at: now,
                    ..CacheEntry::clone(entry)
                });
                self.entry = Some(entry.clone());
                return entry;
            }
        }

        let normalized = normalize_or_empty(&artifact.bytes);
        let state = if let Some(reason) = normalized.report.failure.clone() {
            DatasetState::Failed { reason }
        } else if normalized.table.is_empty() {
            tracing::warn!(source = %artifact.source, "source parsed but has no rows");
            DatasetState::Failed {
                reason: "no data available: the source has no rows".to_string(),
            }
        } else {
            DatasetState::Ready(Arc::new(Dataset {
                table: normalized.table,
                report: normalized.report,
                identity,
                size_bytes: artifact.size_bytes,
            }))
        };

        self.store(now, state)
    }

    fn store(&mut self, now: DateTime<Utc>, state: DatasetState) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            load_id: Uuid::new_v4(),
            source: self.location.clone(),
            loaded_at: now,
            checked_at: now,
            state,
        });
        if let Some(dataset) = entry.dataset() {
            tracing::info!(
                load_id = %entry.load_id,
                rows = dataset.table.len(),
                hash = %dataset.identity.content_hash,
                "dataset loaded"
            );
        }
        self.entry = Some(entry.clone());
        entry
    }
}
