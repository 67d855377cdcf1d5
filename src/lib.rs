pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod graph;
pub mod provider;

pub use config::Config;
pub use connection::{ConnectionOutcome, ConnectionService};
pub use error::{Result, SixDegreesError};
pub use graph::{GraphBuilder, GraphStore, PathAssembler, PathFinder, PersonId, WorkId};
pub use provider::{MetadataProvider, ProviderError};
