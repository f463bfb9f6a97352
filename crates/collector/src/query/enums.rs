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

//! Enum-candidate detection over recorded string literals.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{clamp_page, file_stem, pascal_case, Page};
use crate::error::CollectorError;
use crate::store::Store;

/// Distinct-string bounds of an enum candidate.
const MAX_UNIQUE_STRINGS: i64 = 20;

/// Query parameters of the enum-candidate listing.
#[derive(Debug, Default, Deserialize)]
pub struct EnumsParams {
    /// Minimum total string observations (default 3)
    pub min_observations: Option<i64>,
    /// Minimum distinct strings (default 2, floor 2)
    pub min_unique_strings: Option<i64>,
    /// Page size (default 50)
    pub limit: Option<u64>,
    /// Page offset
    pub offset: Option<u64>,
}

/// One enum candidate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumCandidate {
    /// Entity label
    pub entity_name: Option<String>,
    /// Logical filename
    pub filename: String,
    /// Heuristic name for the synthesised enum
    pub suggested_name: String,
    /// Number of distinct strings observed
    pub unique_strings: i64,
    /// Total string observations
    pub total_observations: i64,
    /// Distinct strings with their counts, most frequent first
    pub values: Vec<StringCount>,
}

/// A distinct string and how often it was observed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringCount {
    /// The observed string
    pub value: String,
    /// Times observed
    pub count: i64,
}

/// List entities whose string observations look like an enum.
pub fn enums(store: &Store, params: &EnumsParams) -> Result<Page<EnumCandidate>, CollectorError> {
    let min_observations = params.min_observations.unwrap_or(3).max(1);
    let min_unique = params.min_unique_strings.unwrap_or(2).max(2);
    let (offset, limit) = clamp_page(params.offset, params.limit, 50);

    store.with_conn(|conn| {
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (
                 SELECT s.entity_id
                 FROM string_literals s
                 GROUP BY s.entity_id
                 HAVING SUM(s.observation_count) >= ?1
                    AND COUNT(DISTINCT s.string_value) BETWEEN ?2 AND ?3
             )",
            params![min_observations, min_unique, MAX_UNIQUE_STRINGS],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT s.entity_id, e.entity_name, e.filename,
                    COUNT(DISTINCT s.string_value) AS unique_strings,
                    SUM(s.observation_count) AS total_observations
             FROM string_literals s JOIN entities e ON e.id = s.entity_id
             GROUP BY s.entity_id
             HAVING total_observations >= ?1 AND unique_strings BETWEEN ?2 AND ?3
             ORDER BY total_observations DESC, s.entity_id
             LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt
            .query_map(
                params![min_observations, min_unique, MAX_UNIQUE_STRINGS, limit as i64, offset as i64],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut values_stmt = conn.prepare(
            "SELECT string_value, SUM(observation_count) AS count
             FROM string_literals
             WHERE entity_id = ?1
             GROUP BY string_value
             ORDER BY count DESC, string_value",
        )?;

        let mut items = Vec::with_capacity(rows.len());
        for (entity_id, entity_name, filename, unique_strings, total_observations) in rows {
            let values = values_stmt
                .query_map(params![entity_id], |row| {
                    Ok(StringCount { value: row.get(0)?, count: row.get(1)? })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let suggested_name = suggest_enum_name(&filename, &values);
            items.push(EnumCandidate {
                entity_name,
                filename,
                suggested_name,
                unique_strings,
                total_observations,
                values,
            });
        }

        Ok(Page::new(items, offset, limit, total as u64))
    })
}

/// Heuristic enum name derived from the filename and the observed strings.
fn suggest_enum_name(filename: &str, values: &[StringCount]) -> String {
    let prefix = pascal_case(file_stem(filename));

    let has = |needle: &str| {
        values.iter().any(|entry| entry.value.eq_ignore_ascii_case(needle))
    };
    let suffix = if has("success") || has("error") {
        "Status"
    } else if has("read") || has("write") {
        "Mode"
    } else {
        let total_len: usize = values.iter().map(|entry| entry.value.len()).sum();
        let average = if values.is_empty() { 0 } else { total_len / values.len() };
        if average <= 6 {
            "Code"
        } else {
            "Type"
        }
    };

    format!("{prefix}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(values: &[&str]) -> Vec<StringCount> {
        values.iter().map(|v| StringCount { value: v.to_string(), count: 1 }).collect()
    }

    #[test]
    fn test_suggest_enum_name_by_values() {
        assert_eq!(
            suggest_enum_name("src/api.ts", &counts(&["success", "error"])),
            "ApiStatus"
        );
        assert_eq!(suggest_enum_name("src/fs.ts", &counts(&["read", "write"])), "FsMode");
        assert_eq!(suggest_enum_name("src/tags.ts", &counts(&["a", "b"])), "TagsCode");
        assert_eq!(
            suggest_enum_name("src/todo-app.ts", &counts(&["pending-review", "completed-task"])),
            "TodoAppType"
        );
    }
}
