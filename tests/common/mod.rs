//! Shared test harness: an instrumented in-memory `EntityStore`.
//!
//! Keeps rows as JSON maps per entity kind, evaluates the same where-clause
//! shapes the executor emits, and records every store call so tests can
//! assert ordering (children destroyed before parents, nothing touched on a
//! no-match, and so on).
#![allow(dead_code)] // each test binary uses a different slice of the harness

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use blogport_api::database::{EntityStore, StoreError};
use blogport_api::entities::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    pub op: &'static str,
    pub kind: EntityKind,
}

#[derive(Default)]
pub struct MockStore {
    tables: Mutex<HashMap<EntityKind, Vec<Map<String, Value>>>>,
    ops: Mutex<Vec<StoreOp>>,
    fail_destroy_on: Mutex<Option<EntityKind>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: EntityKind, record: Value) {
        let record = record
            .as_object()
            .expect("test records must be JSON objects")
            .clone();
        self.tables.lock().unwrap().entry(kind).or_default().push(record);
    }

    /// Make every `destroy` on `kind` fail, to simulate a store-layer fault
    /// mid-cascade.
    pub fn fail_destroy_on(&self, kind: EntityKind) {
        *self.fail_destroy_on.lock().unwrap() = Some(kind);
    }

    pub fn rows(&self, kind: EntityKind) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(&kind)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub fn row_by_id(&self, kind: EntityKind, id: i64) -> Option<Value> {
        self.rows(kind)
            .into_iter()
            .find(|row| row["id"] == Value::from(id))
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Ops filtered to the mutating ones, in call order.
    pub fn mutations(&self) -> Vec<StoreOp> {
        self.ops()
            .into_iter()
            .filter(|op| op.op == "destroy" || op.op == "update")
            .collect()
    }

    fn log(&self, op: &'static str, kind: EntityKind) {
        self.ops.lock().unwrap().push(StoreOp { op, kind });
    }
}

fn matches(record: &Map<String, Value>, filter: &Value) -> bool {
    match filter {
        Value::Null => true,
        Value::Object(obj) => obj.iter().all(|(key, value)| match key.as_str() {
            "$or" => value
                .as_array()
                .is_some_and(|arr| arr.iter().any(|f| matches(record, f))),
            "$and" => value
                .as_array()
                .is_some_and(|arr| arr.iter().all(|f| matches(record, f))),
            field => {
                let actual = record.get(field).unwrap_or(&Value::Null);
                match value {
                    Value::Object(ops) => ops.iter().all(|(op, data)| match op.as_str() {
                        "$in" => data.as_array().is_some_and(|arr| arr.contains(actual)),
                        "$eq" => actual == data,
                        "$ne" => actual != data,
                        other => panic!("mock store: unsupported operator {other}"),
                    }),
                    scalar => actual == scalar,
                }
            }
        }),
        other => panic!("mock store: unsupported filter {other}"),
    }
}

#[async_trait]
impl EntityStore for MockStore {
    async fn find_ids(&self, kind: EntityKind, filter: &Value) -> Result<Vec<i64>, StoreError> {
        self.log("find_ids", kind);
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(&kind).map(Vec::as_slice).unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| matches(row, filter))
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .collect())
    }

    async fn count(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError> {
        self.log("count", kind);
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(&kind).map(Vec::as_slice).unwrap_or_default();
        Ok(rows.iter().filter(|row| matches(row, filter)).count() as u64)
    }

    async fn destroy(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError> {
        self.log("destroy", kind);
        if *self.fail_destroy_on.lock().unwrap() == Some(kind) {
            return Err(StoreError::QueryError(format!(
                "injected failure destroying {kind}"
            )));
        }
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(kind).or_default();
        let before = rows.len();
        rows.retain(|row| !matches(row, filter));
        Ok((before - rows.len()) as u64)
    }

    async fn update(
        &self,
        kind: EntityKind,
        filter: &Value,
        patch: &Value,
    ) -> Result<u64, StoreError> {
        self.log("update", kind);
        let fields = patch
            .as_object()
            .ok_or_else(|| StoreError::QueryError("patch must be an object".to_string()))?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(kind).or_default();
        let mut affected = 0;
        for row in rows.iter_mut() {
            if matches(row, filter) {
                for (column, value) in fields {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }
}
