use std::collections::{BTreeMap, HashMap, HashSet};

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::cascade::error::CascadeError;
use crate::cascade::graph;
use crate::config;
use crate::database::EntityStore;
use crate::entities::EntityKind;

/// Result of a mutating cascade at the root.
///
/// `NoMatch` means the root filter resolved to zero records and nothing was
/// touched anywhere; it is deliberately distinct from `Affected(0)`, which
/// means the cascade ran but the final root statement reported no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    NoMatch,
    Affected(u64),
}

impl CascadeOutcome {
    pub fn is_no_match(&self) -> bool {
        matches!(self, CascadeOutcome::NoMatch)
    }
}

enum CascadeAction {
    Delete,
    SoftDelete(Value),
}

/// Conventional soft-delete body: flips `isDeleted` and stamps the actor.
/// Without an actor the stamp is left out entirely, so an existing
/// `updatedBy` keeps its value instead of being nulled.
pub fn soft_delete_patch(updated_by: Option<i64>) -> Value {
    let mut fields = Map::new();
    fields.insert("isDeleted".to_string(), Value::Bool(true));
    if let Some(actor) = updated_by {
        fields.insert("updatedBy".to_string(), json!(actor));
    }
    Value::Object(fields)
}

/// Walks the reference graph and applies a delete, soft-delete, or dry-run
/// count from a root entity kind outward to everything that references it,
/// directly or transitively.
///
/// The store is injected at construction; the executor has no global state.
/// Atomicity is the store's concern: run against a transaction-backed store
/// to make a whole cascade commit or roll back as one unit.
pub struct CascadeExecutor<S> {
    store: S,
    max_depth: u32,
}

impl<S: EntityStore> CascadeExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_depth: config::config().cascade.max_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to commit a transaction-backed one.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Hard-delete all records matching `filter` plus everything that
    /// references them, children before parents.
    pub async fn cascade_delete(
        &self,
        kind: EntityKind,
        filter: &Value,
    ) -> Result<CascadeOutcome, CascadeError> {
        self.cascade_root(kind, filter, CascadeAction::Delete).await
    }

    /// Same traversal as [`cascade_delete`](Self::cascade_delete), but marks
    /// records instead of removing them. `patch` usually comes from
    /// [`soft_delete_patch`]; whatever it contains, `isDeleted` is forced to
    /// `true` so this path can never resurrect a record.
    pub async fn cascade_soft_delete(
        &self,
        kind: EntityKind,
        filter: &Value,
        patch: &Value,
    ) -> Result<CascadeOutcome, CascadeError> {
        let patch = sanitize_patch(patch)?;
        self.cascade_root(kind, filter, CascadeAction::SoftDelete(patch))
            .await
    }

    /// Dry-run blast-radius preview: per entity kind, how many records
    /// directly reference the roots matched by `filter`.
    ///
    /// This counts one level only — dependents of the roots, not dependents
    /// of dependents. The mutating cascades above are transitive; the legacy
    /// service had the same asymmetry and callers treat the counter as a
    /// cheap direct-dependent summary, so the behavior is kept (and pinned by
    /// tests) rather than widened to a closure count.
    ///
    /// Returns `{root: 0}` when nothing matches the filter. A kind with no
    /// inbound edges has no dependents to report, so the map carries the
    /// matched roots' own count instead.
    pub async fn cascade_count(
        &self,
        kind: EntityKind,
        filter: &Value,
    ) -> Result<BTreeMap<EntityKind, u64>, CascadeError> {
        let ids = self.store.find_ids(kind, filter).await?;
        let mut counts = BTreeMap::new();
        if ids.is_empty() {
            counts.insert(kind, 0);
            return Ok(counts);
        }

        // All of a child kind's inbound columns collapse into one $or filter,
        // so a record referencing the roots through two columns counts once.
        let mut grouped: BTreeMap<EntityKind, Vec<&'static str>> = BTreeMap::new();
        for edge in graph::inbound_edges(kind) {
            grouped.entry(edge.child).or_default().push(edge.column);
        }

        if grouped.is_empty() {
            counts.insert(kind, ids.len() as u64);
            return Ok(counts);
        }

        for (child, columns) in grouped {
            let clauses: Vec<Value> = columns.iter().map(|c| in_filter(c, &ids)).collect();
            let child_filter = json!({ "$or": clauses });
            let count = self.store.count(child, &child_filter).await?;
            counts.insert(child, count);
        }
        Ok(counts)
    }

    async fn cascade_root(
        &self,
        kind: EntityKind,
        filter: &Value,
        action: CascadeAction,
    ) -> Result<CascadeOutcome, CascadeError> {
        let ids = self.store.find_ids(kind, filter).await?;
        if ids.is_empty() {
            return Ok(CascadeOutcome::NoMatch);
        }
        debug!(kind = %kind, roots = ids.len(), "resolved cascade roots");

        let mut visited: HashMap<EntityKind, HashSet<i64>> = HashMap::new();
        visited.entry(kind).or_default().extend(ids.iter().copied());

        for edge in graph::inbound_edges(kind) {
            let child_filter = in_filter(edge.column, &ids);
            let child_ids = self.store.find_ids(edge.child, &child_filter).await?;
            self.cascade_ids(edge.child, child_ids, &action, &mut visited, 1)
                .await?;
        }

        // Dependents were resolved from the pre-action root id set; the root
        // itself is acted on last, by the caller's original filter.
        let affected = self.apply(kind, filter, &action).await?;
        Ok(CascadeOutcome::Affected(affected))
    }

    /// Depth-first step over an explicit id set. Ids already visited in this
    /// call tree are dropped; re-entry is a no-op, which is what terminates
    /// self-referencing audit edges and mutual cycles.
    fn cascade_ids<'a>(
        &'a self,
        kind: EntityKind,
        ids: Vec<i64>,
        action: &'a CascadeAction,
        visited: &'a mut HashMap<EntityKind, HashSet<i64>>,
        depth: u32,
    ) -> BoxFuture<'a, Result<u64, CascadeError>> {
        Box::pin(async move {
            let seen = visited.entry(kind).or_default();
            let fresh: Vec<i64> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
            if fresh.is_empty() {
                return Ok(0);
            }
            if depth > self.max_depth {
                return Err(CascadeError::DepthExceeded { kind, depth });
            }

            for edge in graph::inbound_edges(kind) {
                let child_filter = in_filter(edge.column, &fresh);
                let child_ids = self.store.find_ids(edge.child, &child_filter).await?;
                self.cascade_ids(edge.child, child_ids, action, &mut *visited, depth + 1)
                    .await?;
            }

            self.apply(kind, &in_filter("id", &fresh), action).await
        })
    }

    async fn apply(
        &self,
        kind: EntityKind,
        filter: &Value,
        action: &CascadeAction,
    ) -> Result<u64, CascadeError> {
        let affected = match action {
            CascadeAction::Delete => self.store.destroy(kind, filter).await?,
            CascadeAction::SoftDelete(patch) => self.store.update(kind, filter, patch).await?,
        };
        Ok(affected)
    }
}

fn sanitize_patch(patch: &Value) -> Result<Value, CascadeError> {
    let mut fields = match patch {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => return Err(CascadeError::InvalidPatch),
    };
    // Monotonic: this path only ever sets the flag.
    fields.insert("isDeleted".to_string(), Value::Bool(true));
    Ok(Value::Object(fields))
}

fn in_filter(column: &str, ids: &[i64]) -> Value {
    let mut map = Map::new();
    map.insert(column.to_string(), json!({ "$in": ids }));
    Value::Object(map)
}
