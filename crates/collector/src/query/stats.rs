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

//! Aggregate store statistics.

use serde::Serialize;

use crate::error::CollectorError;
use crate::store::Store;

/// Aggregate counts over the whole store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Number of instrumented program points seen
    pub total_entities: i64,
    /// Total value observations (counting repeats)
    pub total_observations: i64,
    /// Number of distinct instrumented files
    pub distinct_files: i64,
    /// Distribution of observed value types
    pub value_types: Vec<ValueTypeCount>,
}

/// One row of the value-type distribution.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueTypeCount {
    /// The observed value type
    pub value_type: String,
    /// Distinct observation rows of this type
    pub distinct_values: i64,
    /// Total observations of this type (counting repeats)
    pub observations: i64,
}

/// Compute aggregate statistics.
pub fn stats(store: &Store) -> Result<Stats, CollectorError> {
    store.with_conn(|conn| {
        let total_entities =
            conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        let total_observations = conn.query_row(
            "SELECT COALESCE(SUM(observation_count), 0) FROM value_observations",
            [],
            |row| row.get(0),
        )?;
        let distinct_files =
            conn.query_row("SELECT COUNT(DISTINCT filename) FROM entities", [], |row| {
                row.get(0)
            })?;

        let mut stmt = conn.prepare(
            "SELECT value_type, COUNT(*), COALESCE(SUM(observation_count), 0)
             FROM value_observations
             GROUP BY value_type
             ORDER BY 3 DESC, value_type",
        )?;
        let value_types = stmt
            .query_map([], |row| {
                Ok(ValueTypeCount {
                    value_type: row.get(0)?,
                    distinct_values: row.get(1)?,
                    observations: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Stats { total_entities, total_observations, distinct_files, value_types })
    })
}
