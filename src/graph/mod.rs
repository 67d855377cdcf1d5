//! Collaboration graph: lazy construction and BFS shortest-path search.
//!
//! People are nodes, shared works are edges. Nothing is known up front; the
//! builder pulls credits from a [`crate::provider::MetadataProvider`] only for
//! the nodes the search actually reaches.

mod assembler;
mod builder;
mod store;
mod traversal;

pub use assembler::{assemble_path, PathAssembler, UNKNOWN_NAME, UNKNOWN_WORK};
pub use builder::GraphBuilder;
pub use store::GraphStore;
pub use traversal::{PathFinder, SearchLimits, SearchOutcome, SearchStats, StopReason};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider-assigned person identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub u64);

/// Provider-assigned work identifier. Titles are never used as identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(pub u64);

impl From<u64> for PersonId {
    fn from(id: u64) -> Self {
        PersonId(id)
    }
}

impl From<u64> for WorkId {
    fn from(id: u64) -> Self {
        WorkId(id)
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "person:{}", self.0)
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work:{}", self.0)
    }
}
