//! Metadata provider abstraction.
//!
//! The collaboration graph is never stored; it is pulled on demand from an
//! external source that can resolve names to IDs and list credits. `TmdbProvider`
//! talks to The Movie Database, `InMemoryProvider` is a scripted fake.

pub mod mock;
pub mod tmdb;

pub use mock::InMemoryProvider;
pub use tmdb::TmdbProvider;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{PersonId, WorkId};

/// A credited work (e.g. a film) as listed on a person's credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: WorkId,
    pub title: String,
}

impl Work {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id: WorkId(id),
            title: title.into(),
        }
    }
}

/// Cast of a work: person ID to display name.
pub type Cast = BTreeMap<PersonId, String>;

/// Failures a provider call can report. Not-found is never an error: lookups
/// return `None` or an empty collection instead.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Rate limits, timeouts, network failures and 5xx responses may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited
            | ProviderError::Timeout(_)
            | ProviderError::Network(_) => true,
            ProviderError::Status { status, .. } => *status >= 500,
            ProviderError::Malformed(_) => false,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Source of people, works and credits.
///
/// Implementations must be cheap to share behind an `Arc`; the graph builder
/// calls them from several tasks at once.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Best match for a person's name, if any.
    async fn resolve_person_id(&self, name: &str) -> ProviderResult<Option<PersonId>>;

    /// Works the person is credited on, with canonical work IDs.
    async fn list_works_for_person(&self, person: PersonId) -> ProviderResult<Vec<Work>>;

    /// Best match for a work title. Titles are ambiguous; prefer the IDs
    /// returned by [`MetadataProvider::list_works_for_person`].
    async fn resolve_work_id(&self, title: &str) -> ProviderResult<Option<WorkId>>;

    /// Everyone credited on the work.
    async fn list_cast_for_work(&self, work: WorkId) -> ProviderResult<Cast>;

    /// Display name for a person ID.
    async fn resolve_person_name(&self, person: PersonId) -> ProviderResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderError::Network("reset".to_string()).is_retryable());
        assert!(ProviderError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!ProviderError::Status { status: 401, body: String::new() }.is_retryable());
        assert!(!ProviderError::Malformed("missing cast".to_string()).is_retryable());
    }
}
