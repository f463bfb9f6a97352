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

//! Entity listing, most recently seen first.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{clamp_page, Page};
use crate::error::CollectorError;
use crate::store::Store;

/// Query parameters of the entity listing.
#[derive(Debug, Default, Deserialize)]
pub struct EntitiesParams {
    /// Substring filter on the filename
    pub filename: Option<String>,
    /// Page size (default 50)
    pub limit: Option<u64>,
    /// Page offset
    pub offset: Option<u64>,
}

/// One entity row with its joined value-observation count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRow {
    /// Store id
    pub id: i64,
    /// Logical filename
    pub filename: String,
    /// Byte offset of the program point
    pub source_offset: i64,
    /// Stable label, e.g. `addTodo_param_todo`
    pub entity_name: Option<String>,
    /// Entity context tag
    pub entity_type: Option<String>,
    /// 1-based source line
    pub line_number: Option<u32>,
    /// 0-based source column
    pub column_number: Option<u32>,
    /// Times this entity was reported
    pub observation_count: i64,
    /// Distinct value observations recorded against it
    pub value_count: i64,
    /// First ingest timestamp
    pub first_seen: String,
    /// Latest ingest timestamp
    pub last_seen: String,
}

pub(crate) fn map_entity_row(row: &Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok(EntityRow {
        id: row.get(0)?,
        filename: row.get(1)?,
        source_offset: row.get(2)?,
        entity_name: row.get(3)?,
        entity_type: row.get(4)?,
        line_number: row.get(5)?,
        column_number: row.get(6)?,
        observation_count: row.get(7)?,
        value_count: row.get(8)?,
        first_seen: row.get(9)?,
        last_seen: row.get(10)?,
    })
}

/// List entities ordered by `last_seen` descending.
pub fn entities(store: &Store, params: &EntitiesParams) -> Result<Page<EntityRow>, CollectorError> {
    let (offset, limit) = clamp_page(params.offset, params.limit, 50);

    store.with_conn(|conn| {
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE (?1 IS NULL OR instr(filename, ?1) > 0)",
            params![params.filename],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT e.id, e.filename, e.source_offset, e.entity_name, e.entity_type,
                    e.line_number, e.column_number, e.observation_count,
                    (SELECT COUNT(*) FROM value_observations v WHERE v.entity_id = e.id),
                    e.first_seen, e.last_seen
             FROM entities e
             WHERE (?1 IS NULL OR instr(e.filename, ?1) > 0)
             ORDER BY e.last_seen DESC, e.id DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let items = stmt
            .query_map(params![params.filename, limit as i64, offset as i64], map_entity_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, offset, limit, total as u64))
    })
}
