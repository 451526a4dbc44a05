use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo};

/// Translates a JSON where-clause tree into a parameterized SQL predicate.
///
/// The tree is the same shape the generated controllers accept in request
/// bodies: implicit equality (`{ "isActive": true }`), per-field operators
/// (`{ "addedBy": { "$in": [1, 2] } }`), and `$and`/`$or`/`$not` combinators.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
    conditions: Vec<FilterWhereInfo>,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            conditions: vec![],
        }
    }

    /// Generate `(where_clause, bind_params)` with placeholders numbered from
    /// `starting_param_index + 1`. Callers that bind values ahead of the
    /// predicate (UPDATE SET lists) pass the number of values already bound.
    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(where_data)
    }

    fn build(&mut self, where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        self.parse_where_data(where_data)?;

        let mut sql_conditions = vec![];
        let conditions_snapshot = self.conditions.clone();
        for condition in &conditions_snapshot {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok((where_clause, self.param_values.clone()))
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(obj) => {
                for (key, value) in obj {
                    if key.starts_with('$') {
                        self.parse_logical_operator(key, value)?;
                    } else {
                        self.parse_field_condition(key, value)?;
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhereClause(
                "WHERE must be an object".to_string(),
            )),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<(), FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{} requires array", op))
                })?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    let (sql, params) = Self::generate(v, self.param_index)?;
                    self.param_index += params.len();
                    self.param_values.extend(params);
                    sql_parts.push(format!("({})", sql));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                self.conditions.push(FilterWhereInfo {
                    column: sql_parts.join(joiner),
                    operator: FilterOp::Text,
                    data: Value::Null,
                });
                Ok(())
            }
            "$not" => {
                let (sql, params) = Self::generate(value, self.param_index)?;
                self.param_index += params.len();
                self.param_values.extend(params);
                self.conditions.push(FilterWhereInfo {
                    column: format!("NOT ({})", sql),
                    operator: FilterOp::Text,
                    data: Value::Null,
                });
                Ok(())
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        Self::validate_column(field)?;
        if let Value::Object(obj) = value {
            for (op_key, op_val) in obj {
                let operator = Self::map_operator(op_key)?;
                self.conditions.push(FilterWhereInfo {
                    column: field.to_string(),
                    operator,
                    data: op_val.clone(),
                });
            }
        } else {
            // Implicit equality: { field: value }
            self.conditions.push(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            });
        }
        Ok(())
    }

    /// Column names come straight out of caller JSON; reject anything that is
    /// not a plain identifier before it reaches rendered SQL.
    pub fn validate_column(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(FilterError::InvalidColumn(name.to_string()))
        }
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$in" => FilterOp::In,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        // Pseudo conditions carry rendered SQL for the logical combinators.
        if matches!(condition.operator, FilterOp::Text) && condition.data.is_null() {
            return Ok(condition.column.clone());
        }

        // Only $in expands array data into placeholders; anywhere else an
        // array would render a placeholder with nothing bound to it.
        if condition.data.is_array() && !matches!(condition.operator, FilterOp::In) {
            return Err(FilterError::InvalidOperatorData(format!(
                "array data on column {} requires $in",
                condition.column
            )));
        }

        let quoted_column = format!("\"{}\"", condition.column);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NULL", quoted_column))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(condition.data.clone())))
                }
            }
            FilterOp::Ne => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NOT NULL", quoted_column))
                } else {
                    Ok(format!("{} <> {}", quoted_column, self.param(condition.data.clone())))
                }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted_column, self.param(condition.data.clone()))),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted_column, self.param(condition.data.clone()))),
            FilterOp::Lt => Ok(format!("{} < {}", quoted_column, self.param(condition.data.clone()))),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted_column, self.param(condition.data.clone()))),
            FilterOp::Like => Ok(format!("{} LIKE {}", quoted_column, self.param(condition.data.clone()))),
            FilterOp::In => {
                if let Value::Array(values) = &condition.data {
                    // An empty id set matches nothing.
                    if values.is_empty() {
                        return Ok("1=0".to_string());
                    }
                    let params: Vec<String> =
                        values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(format!("{} IN ({})", quoted_column, params.join(", ")))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(condition.data.clone())))
                }
            }
            FilterOp::Text => unreachable!("handled above"),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality() {
        let (sql, params) = FilterWhere::generate(&json!({"isActive": true}), 0).unwrap();
        assert_eq!(sql, "\"isActive\" = $1");
        assert_eq!(params, vec![json!(true)]);
    }

    #[test]
    fn null_equality_renders_is_null() {
        let (sql, params) = FilterWhere::generate(&json!({"updatedBy": null}), 0).unwrap();
        assert_eq!(sql, "\"updatedBy\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn in_operator_expands_placeholders() {
        let (sql, params) =
            FilterWhere::generate(&json!({"addedBy": {"$in": [4, 5, 6]}}), 0).unwrap();
        assert_eq!(sql, "\"addedBy\" IN ($1, $2, $3)");
        assert_eq!(params, vec![json!(4), json!(5), json!(6)]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({"id": {"$in": []}}), 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn or_combinator_wraps_subclauses() {
        let where_data = json!({"$or": [
            {"userId": {"$in": [1]}},
            {"addedBy": {"$in": [1]}}
        ]});
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(sql, "(\"userId\" IN ($1)) OR (\"addedBy\" IN ($2))");
        assert_eq!(params, vec![json!(1), json!(1)]);
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, _) = FilterWhere::generate(&json!({"id": 7}), 2).unwrap();
        assert_eq!(sql, "\"id\" = $3");
    }

    #[test]
    fn rejects_hostile_column_names() {
        let err = FilterWhere::generate(&json!({"id\"; DROP TABLE": 1}), 0);
        assert!(matches!(err, Err(FilterError::InvalidColumn(_))));
    }

    #[test]
    fn rejects_array_data_outside_in() {
        let err = FilterWhere::generate(&json!({"id": [1, 2]}), 0);
        assert!(matches!(err, Err(FilterError::InvalidOperatorData(_))));

        let err = FilterWhere::generate(&json!({"id": {"$eq": [1]}}), 0);
        assert!(matches!(err, Err(FilterError::InvalidOperatorData(_))));
    }

    #[test]
    fn rejects_unknown_operators() {
        let err = FilterWhere::generate(&json!({"id": {"$regex": "x"}}), 0);
        assert!(matches!(err, Err(FilterError::UnsupportedOperator(_))));
    }
}
