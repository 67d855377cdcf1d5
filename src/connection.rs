//! The "connect two people" operation: resolve names, search, render.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cache::NameCache;
use crate::config::Config;
use crate::graph::{
    GraphBuilder, GraphStore, PathAssembler, PathFinder, PersonId, SearchLimits, SearchOutcome,
    SearchStats, StopReason,
};
use crate::provider::{MetadataProvider, ProviderError};
use crate::{Result, SixDegreesError};

const DEFAULT_NAME_CAPACITY: usize = 10_000;

/// Result of a connection query. Only provider failures are errors; every
/// variant here is an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Shortest chain found; `steps` is empty when both names are the same person
    Connected {
        steps: Vec<String>,
        path: Vec<PersonId>,
        stats: SearchStats,
    },
    /// These names matched nobody; no search was run
    NotResolved { names: Vec<String> },
    /// Both people exist but nothing connects them
    NoPath {
        from: String,
        to: String,
        stats: SearchStats,
    },
    /// A search limit was reached before an answer
    Inconclusive {
        from: String,
        to: String,
        reason: StopReason,
        stats: SearchStats,
    },
}

impl ConnectionOutcome {
    /// Render as the list of lines returned to a caller: the connection
    /// steps, or a single explanatory message.
    pub fn into_messages(self) -> Vec<String> {
        match self {
            ConnectionOutcome::Connected { steps, .. } => steps,
            ConnectionOutcome::NotResolved { names } => vec![format!(
                "One or both people could not be found: {}.",
                names.join(", ")
            )],
            ConnectionOutcome::NoPath { from, to, .. } => {
                vec![format!("No connection found between {} and {}.", from, to)]
            }
            ConnectionOutcome::Inconclusive {
                from, to, reason, ..
            } => {
                let limit = match reason {
                    StopReason::DepthLimit(hops) => format!("within {} hops", hops),
                    StopReason::ExpansionBudget(n) => format!("after exploring {} people", n),
                };
                vec![format!(
                    "No connection found between {} and {} {}; a longer chain may exist.",
                    from, to, limit
                )]
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionOutcome::Connected { .. })
    }
}

/// Graph kept between queries, restarted once it outgrows `max_nodes`.
struct SharedGraph {
    store: Mutex<Arc<GraphStore>>,
    max_nodes: usize,
}

/// Finds the shortest collaboration chain between two named people.
pub struct ConnectionService {
    provider: Arc<dyn MetadataProvider>,
    limits: SearchLimits,
    call_timeout: Duration,
    cast_concurrency: usize,
    names: Arc<NameCache>,
    shared_graph: Option<SharedGraph>,
}

impl ConnectionService {
    /// Each query starts from an empty graph.
    pub fn new(provider: Arc<dyn MetadataProvider>, limits: SearchLimits) -> Self {
        Self {
            provider,
            limits,
            call_timeout: Duration::from_secs(10),
            cast_concurrency: 4,
            names: Arc::new(NameCache::new(DEFAULT_NAME_CAPACITY)),
            shared_graph: None,
        }
    }

    pub fn from_config(provider: Arc<dyn MetadataProvider>, config: &Config) -> Self {
        let service = Self::new(provider, config.search_limits())
            .with_timeout(config.provider_timeout())
            .with_cast_concurrency(config.provider.cast_concurrency)
            .with_name_capacity(config.graph_cache.name_capacity);
        if config.graph_cache.shared {
            service.with_shared_graph(config.graph_cache.max_nodes)
        } else {
            service
        }
    }

    /// Keep one graph across queries; it is replaced by an empty one when a
    /// query starts and it holds more than `max_nodes` people.
    pub fn with_shared_graph(mut self, max_nodes: usize) -> Self {
        self.shared_graph = Some(SharedGraph {
            store: Mutex::new(Arc::new(GraphStore::new())),
            max_nodes,
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_cast_concurrency(mut self, concurrency: usize) -> Self {
        self.cast_concurrency = concurrency.max(1);
        self
    }

    pub fn with_name_capacity(mut self, capacity: usize) -> Self {
        self.names = Arc::new(NameCache::new(capacity));
        self
    }

    /// Resolve both names and search for the shortest chain between them.
    ///
    /// Unresolvable names short-circuit before any expansion. A provider
    /// outage during resolution or search is `ProviderUnavailable`, never
    /// `NoPath`.
    pub async fn find_connection(&self, name_a: &str, name_b: &str) -> Result<ConnectionOutcome> {
        let (name_a, name_b) = (name_a.trim(), name_b.trim());
        if name_a.is_empty() || name_b.is_empty() {
            return Err(SixDegreesError::InvalidInput(
                "two non-empty names are required".to_string(),
            ));
        }

        let (id_a, id_b) = tokio::try_join!(self.resolve(name_a), self.resolve(name_b))?;
        let (source, target) = match (id_a, id_b) {
            (Some(a), Some(b)) => (a, b),
            (a, b) => {
                let names = [(a, name_a), (b, name_b)]
                    .into_iter()
                    .filter(|(id, _)| id.is_none())
                    .map(|(_, name)| name.to_string())
                    .collect();
                log::info!("Unresolved names in query {:?} / {:?}", name_a, name_b);
                return Ok(ConnectionOutcome::NotResolved { names });
            }
        };
        log::debug!("Resolved {:?} -> {}, {:?} -> {}", name_a, source, name_b, target);

        let store = self.graph_for_query();
        let builder = GraphBuilder::new(Arc::clone(&self.provider), Arc::clone(&store))
            .with_timeout(self.call_timeout)
            .with_cast_concurrency(self.cast_concurrency)
            .with_name_cache(Arc::clone(&self.names));
        let finder = PathFinder::new(builder, self.limits);

        let (outcome, stats) = finder.shortest_path(source, target).await?;
        let (from, to) = (name_a.to_string(), name_b.to_string());
        Ok(match outcome {
            SearchOutcome::Found(path) => {
                let steps = PathAssembler::new(Arc::clone(&self.provider))
                    .with_timeout(self.call_timeout)
                    .with_name_cache(Arc::clone(&self.names))
                    .assemble(&path, &store)
                    .await?;
                ConnectionOutcome::Connected { steps, path, stats }
            }
            SearchOutcome::NoPath => ConnectionOutcome::NoPath { from, to, stats },
            SearchOutcome::Inconclusive(reason) => ConnectionOutcome::Inconclusive {
                from,
                to,
                reason,
                stats,
            },
        })
    }

    /// Size of the shared graph, if one is kept.
    pub fn shared_graph_nodes(&self) -> Option<usize> {
        self.shared_graph.as_ref().map(|shared| {
            shared
                .store
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .node_count()
        })
    }

    async fn resolve(&self, name: &str) -> Result<Option<PersonId>> {
        let id = tokio::time::timeout(self.call_timeout, self.provider.resolve_person_id(name))
            .await
            .map_err(|_| ProviderError::Timeout(self.call_timeout))??;
        Ok(id)
    }

    fn graph_for_query(&self) -> Arc<GraphStore> {
        let Some(shared) = &self.shared_graph else {
            return Arc::new(GraphStore::new());
        };
        let mut store = shared.store.lock().unwrap_or_else(PoisonError::into_inner);
        if store.node_count() > shared.max_nodes {
            log::info!(
                "Shared graph holds {} people (limit {}), starting a new one",
                store.node_count(),
                shared.max_nodes
            );
            // Queries still running keep their own Arc to the old graph
            *store = Arc::new(GraphStore::new());
        }
        Arc::clone(&store)
    }
}
