// TypeTrace - Runtime Type Profiler
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The bounded ad-hoc query channel.
//!
//! A single statement with parameter binding, executed as-is. Multi-statement
//! input is rejected by the store driver at prepare time; that rejection is
//! the security boundary, no SQL is parsed here.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollectorError;
use crate::store::Store;

/// An ad-hoc query request.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// The single SQL statement to execute
    pub sql: String,
    /// Positional parameters bound to the statement
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Result of an ad-hoc query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column names of the result set
    pub columns: Vec<String>,
    /// Rows, each a list of JSON values in column order
    pub rows: Vec<Vec<Value>>,
    /// Number of returned rows
    pub row_count: usize,
}

/// Execute a single statement against the store.
pub fn execute(store: &Store, request: &QueryRequest) -> Result<QueryResult, CollectorError> {
    let result = store.with_conn(|conn| Ok(run(conn, request)))?;
    result.map_err(|err| CollectorError::QueryInvalid(err.to_string()))
}

fn run(conn: &Connection, request: &QueryRequest) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(&request.sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|name| name.to_string()).collect();
    let column_count = columns.len();

    let bound: Vec<SqlValue> = request.params.iter().map(bind_value).collect();
    let mut rows_iter = stmt.query(rusqlite::params_from_iter(bound))?;

    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut out = Vec::with_capacity(column_count);
        for index in 0..column_count {
            out.push(read_value(row.get_ref(index)?));
        }
        rows.push(out);
    }

    Ok(QueryResult { row_count: rows.len(), columns, rows })
}

fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(hex::encode(blob)),
    }
}
