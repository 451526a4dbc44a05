use thiserror::Error;

use crate::database::StoreError;
use crate::entities::EntityKind;

#[derive(Debug, Error)]
pub enum CascadeError {
    /// Any store failure aborts the whole cascade; steps already executed are
    /// only undone when the cascade runs against a transaction-backed store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Recursion passed the configured bound. Audit chains are expected to be
    /// shallow, so this almost always means cyclic reference data.
    #[error("cascade depth exceeded at {kind} (depth {depth}); reference data may contain a cycle")]
    DepthExceeded { kind: EntityKind, depth: u32 },

    #[error("soft-delete patch must be a JSON object")]
    InvalidPatch,
}
