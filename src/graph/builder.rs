//! Lazy, idempotent node expansion.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};

use crate::cache::NameCache;
use crate::graph::{GraphStore, PersonId};
use crate::provider::{Cast, MetadataProvider, ProviderError, ProviderResult, Work};
use crate::{Result, SixDegreesError};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CAST_CONCURRENCY: usize = 4;

/// Pulls a person's credits from the provider and writes the resulting edges
/// into a [`GraphStore`].
///
/// Cloning is cheap; clones share the provider, the store and the name cache.
#[derive(Clone)]
pub struct GraphBuilder {
    provider: Arc<dyn MetadataProvider>,
    store: Arc<GraphStore>,
    names: Option<Arc<NameCache>>,
    call_timeout: Duration,
    cast_concurrency: usize,
}

impl GraphBuilder {
    /// Create a builder that writes into `store`
    ///
    /// # Arguments
    ///
    /// * `provider` - Source of works and cast lists
    /// * `store` - Graph receiving the edges; may be shared with other builders
    pub fn new(provider: Arc<dyn MetadataProvider>, store: Arc<GraphStore>) -> Self {
        Self {
            provider,
            store,
            names: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cast_concurrency: DEFAULT_CAST_CONCURRENCY,
        }
    }

    /// Bound every provider call; an expired call fails as a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Number of cast lookups in flight during one expansion (minimum 1).
    pub fn with_cast_concurrency(mut self, concurrency: usize) -> Self {
        self.cast_concurrency = concurrency.max(1);
        self
    }

    /// Feed co-star names from cast lists into `cache`.
    pub fn with_name_cache(mut self, cache: Arc<NameCache>) -> Self {
        self.names = Some(cache);
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    /// Expand `person`: list their works, fetch each work's cast, add an edge
    /// to every co-star.
    ///
    /// At most once per person: an Expanded person returns immediately, and
    /// concurrent callers wait on the one expansion in flight. A failed work
    /// listing leaves the person Unexpanded so a later call retries; a failed
    /// cast lookup only skips that work. The expansion runs on its own task,
    /// so dropping the caller does not abandon a half-written node.
    pub async fn expand(&self, person: PersonId) -> Result<()> {
        let cell = self.store.expansion_cell(person);
        if cell.initialized() {
            return Ok(());
        }

        let builder = self.clone();
        let task = tokio::spawn(async move {
            cell.get_or_try_init(|| builder.pull_credits(person))
                .await
                .map(|_| ())
        });

        match task.await {
            Ok(outcome) => outcome.map_err(SixDegreesError::from),
            Err(e) => Err(SixDegreesError::Internal(format!(
                "expansion of {} aborted: {}",
                person, e
            ))),
        }
    }

    async fn pull_credits(&self, person: PersonId) -> ProviderResult<()> {
        let start = Instant::now();
        let works = self
            .bounded(self.provider.list_works_for_person(person))
            .await?;
        log::debug!("Expanding {}: {} works", person, works.len());

        let casts: Vec<(Work, ProviderResult<Cast>)> = stream::iter(works)
            .map(|work| async move {
                let cast = self.bounded(self.provider.list_cast_for_work(work.id)).await;
                (work, cast)
            })
            .buffered(self.cast_concurrency)
            .collect()
            .await;

        let mut added = 0usize;
        let mut skipped = 0usize;
        // Works are applied in listing order so the first connecting work wins
        for (work, cast) in casts {
            let cast = match cast {
                Ok(cast) => cast,
                Err(e) => {
                    log::warn!(
                        "Skipping {} ({}) while expanding {}: {}",
                        work.id,
                        work.title,
                        person,
                        e
                    );
                    skipped += 1;
                    continue;
                }
            };
            self.store.record_work_title(work.id, &work.title);
            if let Some(names) = &self.names {
                names.put_many(&cast);
            }
            for co_star in cast.keys().copied().filter(|id| *id != person) {
                if self.store.add_edge(person, co_star, work.id) {
                    added += 1;
                }
            }
        }

        log::debug!(
            "Expanded {} in {:?}: {} new edges, {} works skipped",
            person,
            start.elapsed(),
            added,
            skipped
        );
        Ok(())
    }

    async fn bounded<T>(&self, call: impl Future<Output = ProviderResult<T>>) -> ProviderResult<T> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.call_timeout))?
    }
}
