use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{PgExecutor, Row};

use crate::database::manager::StoreError;
use crate::filter::{FilterWhere, SqlResult};

/// Builds and executes the four statement shapes the entity store needs,
/// parameterized by table and a JSON where-clause tree.
///
/// Statements run against any `PgExecutor`, so the same builder serves both
/// pool-backed and transaction-backed stores.
pub struct QueryBuilder {
    table_name: &'static str,
    where_data: Value,
}

impl QueryBuilder {
    pub fn new(table_name: &'static str, where_data: &Value) -> Self {
        Self {
            table_name,
            where_data: where_data.clone(),
        }
    }

    pub async fn select_ids<'c, E>(&self, executor: E) -> Result<Vec<i64>, StoreError>
    where
        E: PgExecutor<'c>,
    {
        let sql_result = self.where_sql(0, |where_sql| {
            format!(
                "SELECT \"id\" FROM \"{}\" WHERE {}",
                self.table_name, where_sql
            )
        })?;

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(executor).await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(StoreError::from))
            .collect()
    }

    pub async fn count<'c, E>(&self, executor: E) -> Result<u64, StoreError>
    where
        E: PgExecutor<'c>,
    {
        let sql_result = self.where_sql(0, |where_sql| {
            format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.table_name, where_sql
            )
        })?;

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(executor).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    pub async fn delete<'c, E>(&self, executor: E) -> Result<u64, StoreError>
    where
        E: PgExecutor<'c>,
    {
        let sql_result = self.where_sql(0, |where_sql| {
            format!("DELETE FROM \"{}\" WHERE {}", self.table_name, where_sql)
        })?;

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn update<'c, E>(&self, patch: &Value, executor: E) -> Result<u64, StoreError>
    where
        E: PgExecutor<'c>,
    {
        let fields = patch
            .as_object()
            .ok_or_else(|| StoreError::QueryError("update patch must be an object".to_string()))?;
        if fields.is_empty() {
            return Err(StoreError::QueryError("update patch is empty".to_string()));
        }

        let mut set_parts = Vec::with_capacity(fields.len());
        let mut set_params = Vec::with_capacity(fields.len());
        for (index, (column, value)) in fields.iter().enumerate() {
            FilterWhere::validate_column(column)
                .map_err(|e| StoreError::QueryError(e.to_string()))?;
            set_parts.push(format!("\"{}\" = ${}", column, index + 1));
            set_params.push(value.clone());
        }

        // SET values bind first, so the predicate placeholders start after them.
        let sql_result = self.where_sql(set_params.len(), |where_sql| {
            format!(
                "UPDATE \"{}\" SET {} WHERE {}",
                self.table_name,
                set_parts.join(", "),
                where_sql
            )
        })?;

        let mut q = sqlx::query(&sql_result.query);
        for p in set_params.iter() {
            q = bind_param(q, p);
        }
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(executor).await?;
        Ok(result.rows_affected())
    }

    fn where_sql(
        &self,
        starting_param_index: usize,
        render: impl FnOnce(&str) -> String,
    ) -> Result<SqlResult, StoreError> {
        let (where_sql, params) = FilterWhere::generate(&self.where_data, starting_param_index)
            .map_err(|e| StoreError::QueryError(e.to_string()))?;
        Ok(SqlResult {
            query: render(&where_sql),
            params,
        })
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) => {
            // Arrays are expanded into IN lists by FilterWhere before binding.
            q
        }
        Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}
