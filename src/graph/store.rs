//! In-memory undirected collaboration graph with per-node expansion state.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::OnceCell;

use crate::graph::{PersonId, WorkId};

/// Discovered people, the work connecting each adjacent pair, and which
/// people have had their credits pulled.
///
/// Adjacency is symmetric: both directions of an edge are written under one
/// write lock, so readers never see half an edge. Neighbor maps are ordered by
/// ID, which makes BFS tie-breaks reproducible.
#[derive(Default)]
pub struct GraphStore {
    adjacency: RwLock<HashMap<PersonId, BTreeMap<PersonId, WorkId>>>,
    titles: RwLock<HashMap<WorkId, String>>,
    /// One cell per person; initialized means Expanded. Concurrent expanders
    /// of the same person wait on the same cell.
    expansions: Mutex<HashMap<PersonId, Arc<OnceCell<()>>>>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if at least one edge touches `person`.
    pub fn has_neighbors(&self, person: PersonId) -> bool {
        self.adjacency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&person)
            .map(|n| !n.is_empty())
            .unwrap_or(false)
    }

    /// Neighbors of `person` with the connecting work, ascending by ID.
    /// Empty if the person is unknown.
    pub fn neighbors(&self, person: PersonId) -> BTreeMap<PersonId, WorkId> {
        self.adjacency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&person)
            .cloned()
            .unwrap_or_default()
    }

    /// The work retained for the edge between `a` and `b`, if any.
    pub fn connecting_work(&self, a: PersonId, b: PersonId) -> Option<WorkId> {
        self.adjacency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&a)
            .and_then(|n| n.get(&b))
            .copied()
    }

    /// Add the undirected edge (a, b) annotated with `work`.
    ///
    /// First discovered work wins: if either direction already exists the call
    /// is a no-op. Self-loops are ignored. Returns true if the edge was inserted.
    pub fn add_edge(&self, a: PersonId, b: PersonId, work: WorkId) -> bool {
        if a == b {
            return false;
        }
        let mut adjacency = self
            .adjacency
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let exists = adjacency.get(&a).map_or(false, |n| n.contains_key(&b))
            || adjacency.get(&b).map_or(false, |n| n.contains_key(&a));
        if exists {
            return false;
        }
        adjacency.entry(a).or_default().insert(b, work);
        adjacency.entry(b).or_default().insert(a, work);
        true
    }

    /// True once the person's credits have been pulled successfully.
    pub fn is_expanded(&self, person: PersonId) -> bool {
        self.expansions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&person)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Mark the person Expanded without pulling anything.
    pub fn mark_expanded(&self, person: PersonId) {
        // Ignored if already Expanded or an expansion is in flight; the
        // in-flight one decides the final state.
        let _ = self.expansion_cell(person).set(());
    }

    /// Shared expansion cell for `person`, created on first use.
    pub(crate) fn expansion_cell(&self, person: PersonId) -> Arc<OnceCell<()>> {
        let mut expansions = self
            .expansions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(expansions.entry(person).or_default())
    }

    /// Remember the display title of a work. The first title seen is kept;
    /// blank titles are ignored.
    pub fn record_work_title(&self, work: WorkId, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        self.titles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(work)
            .or_insert_with(|| title.to_string());
    }

    /// Display title of a work, if it has been seen.
    pub fn work_title(&self, work: WorkId) -> Option<String> {
        self.titles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&work)
            .cloned()
    }

    /// Number of people with at least one edge.
    pub fn node_count(&self) -> usize {
        self.adjacency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        let adjacency = self
            .adjacency
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        adjacency.values().map(|n| n.len()).sum::<usize>() / 2
    }

    /// Number of people marked Expanded.
    pub fn expanded_count(&self) -> usize {
        self.expansions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u64) -> PersonId {
        PersonId(id)
    }

    #[test]
    fn test_add_edge_is_symmetric() {
        let store = GraphStore::new();
        assert!(store.add_edge(p(1), p(2), WorkId(10)));

        assert_eq!(store.neighbors(p(1)).get(&p(2)), Some(&WorkId(10)));
        assert_eq!(store.neighbors(p(2)).get(&p(1)), Some(&WorkId(10)));
        assert_eq!(store.connecting_work(p(2), p(1)), Some(WorkId(10)));
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_first_work_wins() {
        let store = GraphStore::new();
        assert!(store.add_edge(p(1), p(2), WorkId(10)));
        // Same pair, either direction, different work
        assert!(!store.add_edge(p(1), p(2), WorkId(11)));
        assert!(!store.add_edge(p(2), p(1), WorkId(12)));

        assert_eq!(store.connecting_work(p(1), p(2)), Some(WorkId(10)));
        assert_eq!(store.connecting_work(p(2), p(1)), Some(WorkId(10)));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_self_loop_ignored() {
        let store = GraphStore::new();
        assert!(!store.add_edge(p(1), p(1), WorkId(10)));
        assert!(!store.has_neighbors(p(1)));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_unknown_person_has_no_neighbors() {
        let store = GraphStore::new();
        assert!(!store.has_neighbors(p(42)));
        assert!(store.neighbors(p(42)).is_empty());
        assert_eq!(store.connecting_work(p(42), p(1)), None);
    }

    #[test]
    fn test_neighbors_ascending_order() {
        let store = GraphStore::new();
        store.add_edge(p(5), p(9), WorkId(1));
        store.add_edge(p(5), p(3), WorkId(2));
        store.add_edge(p(5), p(7), WorkId(3));

        let order: Vec<u64> = store.neighbors(p(5)).keys().map(|id| id.0).collect();
        assert_eq!(order, vec![3, 7, 9]);
    }

    #[test]
    fn test_expansion_state() {
        let store = GraphStore::new();
        assert!(!store.is_expanded(p(1)));

        store.mark_expanded(p(1));
        assert!(store.is_expanded(p(1)));
        // Idempotent
        store.mark_expanded(p(1));
        assert!(store.is_expanded(p(1)));
        assert_eq!(store.expanded_count(), 1);

        // Touching a cell does not expand the person
        let _ = store.expansion_cell(p(2));
        assert!(!store.is_expanded(p(2)));
        assert_eq!(store.expanded_count(), 1);
    }

    #[test]
    fn test_work_titles_first_seen_kept() {
        let store = GraphStore::new();
        assert_eq!(store.work_title(WorkId(1)), None);

        store.record_work_title(WorkId(1), "Apollo 13");
        store.record_work_title(WorkId(1), "Apolo 13");
        assert_eq!(store.work_title(WorkId(1)).as_deref(), Some("Apollo 13"));
    }

    #[test]
    fn test_blank_work_title_is_not_recorded() {
        let store = GraphStore::new();

        store.record_work_title(WorkId(2), "   ");
        assert_eq!(store.work_title(WorkId(2)), None);

        store.record_work_title(WorkId(2), "Big");
        assert_eq!(store.work_title(WorkId(2)).as_deref(), Some("Big"));
    }
}
