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

//! Recurring object shapes with synthesised interface declarations.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{clamp_page, pascal_case, Page};
use crate::error::CollectorError;
use crate::store::Store;

/// Query parameters of the shape listing.
#[derive(Debug, Default, Deserialize)]
pub struct ShapesParams {
    /// Minimum shape observations (default 3)
    pub min_observations: Option<i64>,
    /// Page size (default 50)
    pub limit: Option<u64>,
    /// Page offset
    pub offset: Option<u64>,
}

/// One recurring object shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRow {
    /// Entity label
    pub entity_name: Option<String>,
    /// Logical filename
    pub filename: String,
    /// Canonical key-sorted signature
    pub shape_signature: String,
    /// Number of keys in the shape
    pub key_count: i64,
    /// Times this shape was observed
    pub observation_count: i64,
    /// Synthesised interface declaration
    pub suggested_interface: String,
    /// Latest ingest timestamp
    pub last_seen: String,
}

/// List recurring object shapes, most observed first.
pub fn shapes(store: &Store, params: &ShapesParams) -> Result<Page<ShapeRow>, CollectorError> {
    let min_observations = params.min_observations.unwrap_or(3).max(1);
    let (offset, limit) = clamp_page(params.offset, params.limit, 50);

    store.with_conn(|conn| {
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM object_shapes WHERE observation_count >= ?1",
            params![min_observations],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT e.entity_name, e.filename, o.shape_signature, o.key_count,
                    o.observation_count, o.last_seen
             FROM object_shapes o JOIN entities e ON e.id = o.entity_id
             WHERE o.observation_count >= ?1
             ORDER BY o.observation_count DESC, o.id
             LIMIT ?2 OFFSET ?3",
        )?;
        let items = stmt
            .query_map(params![min_observations, limit as i64, offset as i64], |row| {
                let entity_name: Option<String> = row.get(0)?;
                let signature: String = row.get(2)?;
                let suggested_interface = render_interface(entity_name.as_deref(), &signature);
                Ok(ShapeRow {
                    entity_name,
                    filename: row.get(1)?,
                    shape_signature: signature,
                    key_count: row.get(3)?,
                    observation_count: row.get(4)?,
                    suggested_interface,
                    last_seen: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, offset, limit, total as u64))
    })
}

/// Render a `key:type,..` signature as an interface declaration.
fn render_interface(entity_name: Option<&str>, signature: &str) -> String {
    let name = match entity_name {
        Some(name) if !name.is_empty() => pascal_case(name),
        _ => "ObservedShape".to_string(),
    };

    let mut body = String::new();
    for entry in signature.split(',') {
        let Some((key, kind)) = entry.split_once(':') else { continue };
        body.push_str(&format!("    {key}: {};\n", declared_type(kind)));
    }
    format!("interface {name} {{\n{body}}}")
}

/// Map an observed value type onto a declaration-friendly type name.
fn declared_type(kind: &str) -> &str {
    match kind {
        "string" | "number" | "boolean" | "null" | "undefined" => kind,
        "array" => "unknown[]",
        "object" => "Record<string, unknown>",
        "date" => "Date",
        "regexp" => "RegExp",
        "function" => "Function",
        other => other,
    }
}
