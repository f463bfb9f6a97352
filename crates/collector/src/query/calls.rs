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

//! Per-value call listing, ordered by recency and call count.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{clamp_page, Page};
use crate::error::CollectorError;
use crate::store::Store;

/// Query parameters of the call listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsParams {
    /// Substring filter on the filename
    pub filepath: Option<String>,
    /// Substring filter on the enclosing function name (matched against the
    /// enriched observation context)
    pub function_name: Option<String>,
    /// Page offset
    pub offset: Option<u64>,
    /// Page size (default 100)
    pub page_size: Option<u64>,
}

/// One `(entity, value_type, literal_value)` row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRow {
    /// Entity label
    pub entity_name: Option<String>,
    /// Logical filename
    pub filename: String,
    /// 1-based source line
    pub line_number: Option<u32>,
    /// 0-based source column
    pub column_number: Option<u32>,
    /// Observed value type
    pub value_type: String,
    /// Capped literal of the observed value
    pub literal_value: Option<String>,
    /// Enriched observation context
    pub context: String,
    /// Times this exact value was observed here
    pub observation_count: i64,
    /// Latest ingest timestamp
    pub last_seen: String,
}

/// List observed calls, newest first.
pub fn calls(store: &Store, params: &CallsParams) -> Result<Page<CallRow>, CollectorError> {
    let (offset, limit) = clamp_page(params.offset, params.page_size, 100);

    store.with_conn(|conn| {
        let total: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM value_observations v JOIN entities e ON e.id = v.entity_id
             WHERE (?1 IS NULL OR instr(e.filename, ?1) > 0)
               AND (?2 IS NULL OR instr(v.context, ?2) > 0)",
            params![params.filepath, params.function_name],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT e.entity_name, e.filename, e.line_number, e.column_number,
                    v.value_type, v.literal_value, v.context, v.observation_count, v.last_seen
             FROM value_observations v JOIN entities e ON e.id = v.entity_id
             WHERE (?1 IS NULL OR instr(e.filename, ?1) > 0)
               AND (?2 IS NULL OR instr(v.context, ?2) > 0)
             ORDER BY v.last_seen DESC, v.observation_count DESC, v.id DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let items = stmt
            .query_map(
                params![params.filepath, params.function_name, limit as i64, offset as i64],
                |row| {
                    Ok(CallRow {
                        entity_name: row.get(0)?,
                        filename: row.get(1)?,
                        line_number: row.get(2)?,
                        column_number: row.get(3)?,
                        value_type: row.get(4)?,
                        literal_value: row.get(5)?,
                        context: row.get(6)?,
                        observation_count: row.get(7)?,
                        last_seen: row.get(8)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, offset, limit, total as u64))
    })
}
