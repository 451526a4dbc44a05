pub mod error;
pub mod executor;
pub mod graph;

pub use error::CascadeError;
pub use executor::{soft_delete_patch, CascadeExecutor, CascadeOutcome};
pub use graph::{inbound_edges, ReferenceEdge, REFERENCE_EDGES};
