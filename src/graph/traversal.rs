//! BFS shortest-path search over a lazily expanded graph.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures_util::future::try_join_all;

use crate::graph::{GraphBuilder, PersonId};
use crate::Result;

/// Ceilings on how far a search may grow the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Maximum hops from the source; `None` = unbounded
    pub max_depth: Option<usize>,
    /// Maximum nodes taken from the frontier and expanded; `None` = unbounded
    pub max_expanded: Option<usize>,
    /// Frontier nodes expanded concurrently
    pub parallelism: usize,
}

impl SearchLimits {
    pub fn new(max_depth: Option<usize>, max_expanded: Option<usize>, parallelism: usize) -> Self {
        Self {
            max_depth,
            max_expanded,
            parallelism: parallelism.max(1),
        }
    }

    /// Exhaustive search: runs until the target is found or the reachable
    /// component is fully expanded.
    pub fn unbounded() -> Self {
        Self::new(None, None, 4)
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::new(Some(6), Some(2000), 4)
    }
}

/// Which limit stopped an inconclusive search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DepthLimit(usize),
    ExpansionBudget(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Shortest path, source first, target last
    Found(Vec<PersonId>),
    /// The reachable component was exhausted without meeting the target
    NoPath,
    /// A limit was hit first; a longer path may still exist
    Inconclusive(StopReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes_expanded: usize,
    pub depth_reached: usize,
    pub duration_ms: u64,
}

/// Breadth-first search that grows the graph only as far as it explores.
pub struct PathFinder {
    builder: GraphBuilder,
    limits: SearchLimits,
}

impl PathFinder {
    /// Create a path finder
    ///
    /// # Arguments
    ///
    /// * `builder` - Expands nodes on demand as the search reaches them
    /// * `limits` - Depth, expansion budget and parallelism for each search
    pub fn new(builder: GraphBuilder, limits: SearchLimits) -> Self {
        Self { builder, limits }
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Find the fewest-hop chain of people from `source` to `target`.
    ///
    /// Each frontier node is expanded just before its neighbors are enqueued;
    /// neighbors are marked visited when enqueued and visited in ascending ID
    /// order, so ties resolve the same way on every run. Up to `parallelism`
    /// frontier nodes are expanded at once, but neighbors are still consumed in
    /// frontier order. A provider failure aborts the search with
    /// `ProviderUnavailable`; nodes that were not expanded stay retryable.
    pub async fn shortest_path(
        &self,
        source: PersonId,
        target: PersonId,
    ) -> Result<(SearchOutcome, SearchStats)> {
        let start = Instant::now();
        let mut stats = SearchStats::default();

        if source == target {
            return Ok((SearchOutcome::Found(vec![source]), stats));
        }

        let store = self.builder.store();
        let mut parents: HashMap<PersonId, PersonId> = HashMap::new();
        let mut visited: HashSet<PersonId> = HashSet::new();
        visited.insert(source);
        let mut frontier = vec![source];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            if let Some(max_depth) = self.limits.max_depth {
                if depth >= max_depth {
                    stats.duration_ms = start.elapsed().as_millis() as u64;
                    log::info!("Search {} -> {} stopped at depth {}", source, target, max_depth);
                    return Ok((
                        SearchOutcome::Inconclusive(StopReason::DepthLimit(max_depth)),
                        stats,
                    ));
                }
            }

            log::debug!("BFS depth {}: frontier of {}", depth, frontier.len());
            let mut next = Vec::new();

            for chunk in frontier.chunks(self.limits.parallelism) {
                let remaining = self
                    .limits
                    .max_expanded
                    .map(|max| max.saturating_sub(stats.nodes_expanded));
                let batch = match remaining {
                    Some(remaining) => &chunk[..chunk.len().min(remaining)],
                    None => chunk,
                };

                try_join_all(batch.iter().map(|person| self.builder.expand(*person))).await?;
                stats.nodes_expanded += batch.len();

                for &current in batch {
                    for neighbor in store.neighbors(current).into_keys() {
                        if !visited.insert(neighbor) {
                            continue;
                        }
                        parents.insert(neighbor, current);
                        if neighbor == target {
                            let path = walk_back(&parents, source, target);
                            stats.depth_reached = depth + 1;
                            stats.duration_ms = start.elapsed().as_millis() as u64;
                            log::info!(
                                "Found {} -> {} in {} hops ({} nodes expanded)",
                                source,
                                target,
                                path.len() - 1,
                                stats.nodes_expanded
                            );
                            return Ok((SearchOutcome::Found(path), stats));
                        }
                        next.push(neighbor);
                    }
                }

                if batch.len() < chunk.len() {
                    let max = self.limits.max_expanded.unwrap_or(stats.nodes_expanded);
                    stats.duration_ms = start.elapsed().as_millis() as u64;
                    log::info!(
                        "Search {} -> {} exhausted its budget of {} expansions",
                        source,
                        target,
                        max
                    );
                    return Ok((
                        SearchOutcome::Inconclusive(StopReason::ExpansionBudget(max)),
                        stats,
                    ));
                }
            }

            frontier = next;
            depth += 1;
            stats.depth_reached = depth;
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "No path {} -> {} ({} nodes expanded)",
            source,
            target,
            stats.nodes_expanded
        );
        Ok((SearchOutcome::NoPath, stats))
    }
}

fn walk_back(
    parents: &HashMap<PersonId, PersonId>,
    source: PersonId,
    target: PersonId,
) -> Vec<PersonId> {
    let mut path = vec![target];
    let mut current = target;
    while current != source {
        match parents.get(&current) {
            Some(parent) => {
                path.push(*parent);
                current = *parent;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
