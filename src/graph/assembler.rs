//! Render a path of person IDs as "Name -- Work --> Name" steps.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::NameCache;
use crate::graph::{GraphStore, PersonId};
use crate::provider::{MetadataProvider, ProviderError};
use crate::{Result, SixDegreesError};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub const UNKNOWN_NAME: &str = "Unknown name";
pub const UNKNOWN_WORK: &str = "Unknown work";

/// Turns person-ID paths into readable connection steps.
pub struct PathAssembler {
    provider: Arc<dyn MetadataProvider>,
    names: Option<Arc<NameCache>>,
    call_timeout: Duration,
}

impl PathAssembler {
    /// Create an assembler that looks names up through `provider`
    ///
    /// # Arguments
    ///
    /// * `provider` - Source of display names missing from the name cache
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            names: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Bound each name lookup; an expired lookup fails as a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Look names up in `cache` before asking the provider.
    pub fn with_name_cache(mut self, cache: Arc<NameCache>) -> Self {
        self.names = Some(cache);
        self
    }

    /// One step per consecutive pair; a single-person path yields no steps.
    ///
    /// Every consecutive pair must already be an edge in `store`.
    pub async fn assemble(&self, path: &[PersonId], store: &GraphStore) -> Result<Vec<String>> {
        let mut steps = Vec::with_capacity(path.len().saturating_sub(1));
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let work = store.connecting_work(from, to).ok_or_else(|| {
                SixDegreesError::Internal(format!("no edge between {} and {}", from, to))
            })?;
            let title = store
                .work_title(work)
                .unwrap_or_else(|| UNKNOWN_WORK.to_string());
            let from_name = self.display_name(from).await?;
            let to_name = self.display_name(to).await?;
            steps.push(format!("{} -- {} --> {}", from_name, title, to_name));
        }
        Ok(steps)
    }

    async fn display_name(&self, person: PersonId) -> Result<String> {
        if let Some(names) = &self.names {
            if let Some(name) = names.get(person).filter(|n| !n.trim().is_empty()) {
                return Ok(name);
            }
        }
        let name = tokio::time::timeout(self.call_timeout, self.provider.resolve_person_name(person))
            .await
            .map_err(|_| ProviderError::Timeout(self.call_timeout))??
            .filter(|n| !n.trim().is_empty());
        match name {
            Some(name) => {
                if let Some(names) = &self.names {
                    names.put(person, name.clone());
                }
                Ok(name)
            }
            None => Ok(UNKNOWN_NAME.to_string()),
        }
    }
}

/// Convenience wrapper: assemble without a name cache.
pub async fn assemble_path(
    provider: Arc<dyn MetadataProvider>,
    path: &[PersonId],
    store: &GraphStore,
) -> Result<Vec<String>> {
    PathAssembler::new(provider).assemble(path, store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WorkId;
    use crate::provider::InMemoryProvider;

    fn store_with_chain() -> GraphStore {
        let store = GraphStore::new();
        store.add_edge(PersonId(1), PersonId(2), WorkId(10));
        store.add_edge(PersonId(2), PersonId(3), WorkId(20));
        store.record_work_title(WorkId(10), "W1");
        store.record_work_title(WorkId(20), "W2");
        store
    }

    fn provider() -> Arc<InMemoryProvider> {
        Arc::new(
            InMemoryProvider::new()
                .with_person(1, "A")
                .with_person(2, "B")
                .with_person(3, "C"),
        )
    }

    #[tokio::test]
    async fn test_assemble_chain() {
        let provider = provider();
        let store = store_with_chain();
        let path = [PersonId(1), PersonId(2), PersonId(3)];

        let steps = assemble_path(provider.clone(), &path, &store).await.unwrap();
        assert_eq!(steps, vec!["A -- W1 --> B", "B -- W2 --> C"]);
    }

    #[tokio::test]
    async fn test_zero_hop_path_is_empty() {
        let provider = provider();
        let store = GraphStore::new();

        let steps = assemble_path(provider.clone(), &[PersonId(1)], &store).await.unwrap();
        assert!(steps.is_empty());
        assert_eq!(provider.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_cached_names_skip_provider() {
        let provider = provider();
        let names = Arc::new(NameCache::new(8));
        names.put(PersonId(1), "Alpha".to_string());
        names.put(PersonId(2), "Beta".to_string());
        let assembler = PathAssembler::new(provider.clone()).with_name_cache(names);

        let steps = assembler
            .assemble(&[PersonId(1), PersonId(2)], &store_with_chain())
            .await
            .unwrap();
        assert_eq!(steps, vec!["Alpha -- W1 --> Beta"]);
        assert_eq!(provider.calls().resolve_person_name, 0);
    }

    #[tokio::test]
    async fn test_unknown_name_and_title_fallbacks() {
        let provider = provider();
        let store = GraphStore::new();
        store.add_edge(PersonId(3), PersonId(99), WorkId(77));

        let steps = assemble_path(provider.clone(), &[PersonId(3), PersonId(99)], &store)
            .await
            .unwrap();
        assert_eq!(steps, vec![format!("C -- {} --> {}", UNKNOWN_WORK, UNKNOWN_NAME)]);
    }

    #[tokio::test]
    async fn test_blank_cast_name_falls_back_to_lookup() {
        let provider = provider();
        let names = Arc::new(NameCache::new(8));
        names.put(PersonId(99), String::new());
        let store = GraphStore::new();
        store.add_edge(PersonId(1), PersonId(99), WorkId(10));
        store.record_work_title(WorkId(10), "W1");

        let steps = PathAssembler::new(provider.clone())
            .with_name_cache(names)
            .assemble(&[PersonId(1), PersonId(99)], &store)
            .await
            .unwrap();
        assert_eq!(steps, vec![format!("A -- W1 --> {}", UNKNOWN_NAME)]);
    }

    #[tokio::test]
    async fn test_slow_name_lookup_times_out() {
        let provider = Arc::new(
            InMemoryProvider::new()
                .with_person(1, "A")
                .with_person(2, "B")
                .with_latency(Duration::from_millis(300)),
        );
        let assembler = PathAssembler::new(provider.clone()).with_timeout(Duration::from_millis(20));

        let err = assembler
            .assemble(&[PersonId(1), PersonId(2)], &store_with_chain())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SixDegreesError::ProviderUnavailable(ProviderError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_edge_is_internal_error() {
        let provider = provider();
        let err = assemble_path(provider.clone(), &[PersonId(1), PersonId(3)], &GraphStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SixDegreesError::Internal(_)));
    }
}
