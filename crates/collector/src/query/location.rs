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

//! Entities at a source position, each with its observed values.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::CollectorError;
use crate::store::Store;

/// Query parameters of the location lookup. `filename` and `line_number`
/// are required; `column_number` narrows further.
#[derive(Debug, Default, Deserialize)]
pub struct LocationParams {
    /// Exact logical filename
    pub filename: Option<String>,
    /// 1-based source line
    pub line_number: Option<u32>,
    /// Optional 0-based source column
    pub column_number: Option<u32>,
}

/// Location lookup response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    /// Entities at the requested position
    pub matches: Vec<LocationMatch>,
}

/// One matched entity together with everything observed at it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMatch {
    /// Entity label
    pub entity_name: Option<String>,
    /// Entity context tag
    pub entity_type: Option<String>,
    /// Logical filename
    pub filename: String,
    /// Byte offset of the program point
    pub source_offset: i64,
    /// 1-based source line
    pub line_number: Option<u32>,
    /// 0-based source column
    pub column_number: Option<u32>,
    /// Times this entity was reported
    pub observation_count: i64,
    /// Observed values at this entity
    pub values: Vec<ObservedValue>,
}

/// One observed value of a matched entity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedValue {
    /// Observed value type
    pub value_type: String,
    /// Capped literal
    pub literal_value: Option<String>,
    /// Enriched observation context
    pub context: String,
    /// Times observed
    pub observation_count: i64,
}

/// Look up all entities whose position matches the parameters.
pub fn location(
    store: &Store,
    params: &LocationParams,
) -> Result<LocationResponse, CollectorError> {
    let filename =
        params.filename.as_deref().ok_or(CollectorError::ParameterMissing("filename"))?;
    let line_number =
        params.line_number.ok_or(CollectorError::ParameterMissing("line_number"))?;

    store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, entity_name, entity_type, filename, source_offset, line_number,
                    column_number, observation_count
             FROM entities
             WHERE filename = ?1 AND line_number = ?2
               AND (?3 IS NULL OR column_number = ?3)
             ORDER BY source_offset",
        )?;
        let rows = stmt
            .query_map(params![filename, line_number, params.column_number], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    LocationMatch {
                        entity_name: row.get(1)?,
                        entity_type: row.get(2)?,
                        filename: row.get(3)?,
                        source_offset: row.get(4)?,
                        line_number: row.get(5)?,
                        column_number: row.get(6)?,
                        observation_count: row.get(7)?,
                        values: Vec::new(),
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut values_stmt = conn.prepare(
            "SELECT value_type, literal_value, context, observation_count
             FROM value_observations
             WHERE entity_id = ?1
             ORDER BY observation_count DESC, id",
        )?;

        let mut matches = Vec::with_capacity(rows.len());
        for (entity_id, mut entry) in rows {
            entry.values = values_stmt
                .query_map(params![entity_id], |row| {
                    Ok(ObservedValue {
                        value_type: row.get(0)?,
                        literal_value: row.get(1)?,
                        context: row.get(2)?,
                        observation_count: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            matches.push(entry);
        }

        Ok(LocationResponse { matches })
    })
}
