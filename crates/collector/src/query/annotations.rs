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

//! Ranked annotation recommendations.
//!
//! Every entity is classified from its observed values into one of
//! enum / interface / union / literal-type / simple, then ranked by class
//! and observation count.

use serde::{Deserialize, Serialize};

use super::{clamp_page, Page};
use crate::error::CollectorError;
use crate::store::Store;

/// Query parameters of the annotation listing.
#[derive(Debug, Default, Deserialize)]
pub struct AnnotationsParams {
    /// Page size (default 50)
    pub limit: Option<u64>,
    /// Page offset
    pub offset: Option<u64>,
}

/// One classified entity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationCandidate {
    /// Entity label
    pub entity_name: Option<String>,
    /// Logical filename
    pub filename: String,
    /// 1-based source line
    pub line_number: Option<u32>,
    /// Classification: enum, interface, union, literal-type or simple
    pub kind: &'static str,
    /// Distinct observed value types
    pub value_types: Vec<String>,
    /// Distinct string literals observed
    pub distinct_strings: i64,
    /// Distinct number literals observed
    pub distinct_numbers: i64,
    /// Total observations
    pub total_observations: i64,
}

/// Classify and rank all entities with observations.
pub fn annotations(
    store: &Store,
    params: &AnnotationsParams,
) -> Result<Page<AnnotationCandidate>, CollectorError> {
    let (offset, limit) = clamp_page(params.offset, params.limit, 50);

    let mut candidates = store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT e.entity_name, e.filename, e.line_number,
                    GROUP_CONCAT(DISTINCT v.value_type) AS types,
                    COUNT(DISTINCT CASE WHEN v.value_type = 'string' THEN v.literal_value END),
                    COUNT(DISTINCT CASE WHEN v.value_type = 'number' THEN v.literal_value END),
                    SUM(v.observation_count) AS total
             FROM entities e JOIN value_observations v ON v.entity_id = e.id
             GROUP BY e.id",
        )?;
        let result = stmt
            .query_map([], |row| {
                let types: String = row.get::<_, Option<String>>(3)?.unwrap_or_default();
                let mut value_types: Vec<String> =
                    types.split(',').filter(|t| !t.is_empty()).map(str::to_string).collect();
                value_types.sort();
                let distinct_strings: i64 = row.get(4)?;
                let distinct_numbers: i64 = row.get(5)?;
                let kind = classify_annotation(&value_types, distinct_strings, distinct_numbers);
                Ok(AnnotationCandidate {
                    entity_name: row.get(0)?,
                    filename: row.get(1)?,
                    line_number: row.get(2)?,
                    kind,
                    value_types,
                    distinct_strings,
                    distinct_numbers,
                    total_observations: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>();
        result
    })?;

    candidates.sort_by(|a, b| {
        rank(a.kind)
            .cmp(&rank(b.kind))
            .then(b.total_observations.cmp(&a.total_observations))
            .then(a.entity_name.cmp(&b.entity_name))
    });

    let total = candidates.len() as u64;
    let items = candidates
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    Ok(Page::new(items, offset, limit, total))
}

/// Classification rule over the distinct value types of an entity.
pub(crate) fn classify_annotation(
    value_types: &[String],
    distinct_strings: i64,
    distinct_numbers: i64,
) -> &'static str {
    let sole = (value_types.len() == 1).then(|| value_types[0].as_str());
    match sole {
        Some("string") if (2..=10).contains(&distinct_strings) => "enum",
        Some("object") => "interface",
        Some("number") if distinct_numbers < 10 => "literal-type",
        _ if value_types.len() > 1 => "union",
        _ => "simple",
    }
}

/// Ranking of classifications in the response.
fn rank(kind: &str) -> u8 {
    match kind {
        "enum" => 0,
        "interface" => 1,
        "union" => 2,
        "literal-type" => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_classify_annotation() {
        assert_eq!(classify_annotation(&types(&["string"]), 3, 0), "enum");
        assert_eq!(classify_annotation(&types(&["string"]), 1, 0), "simple");
        assert_eq!(classify_annotation(&types(&["string"]), 40, 0), "simple");
        assert_eq!(classify_annotation(&types(&["object"]), 0, 0), "interface");
        assert_eq!(classify_annotation(&types(&["number"]), 0, 4), "literal-type");
        assert_eq!(classify_annotation(&types(&["number"]), 0, 50), "simple");
        assert_eq!(classify_annotation(&types(&["number", "string"]), 1, 1), "union");
        assert_eq!(classify_annotation(&types(&["boolean"]), 0, 0), "simple");
    }

    #[test]
    fn test_rank_order() {
        assert!(rank("enum") < rank("interface"));
        assert!(rank("interface") < rank("union"));
        assert!(rank("union") < rank("literal-type"));
        assert!(rank("literal-type") < rank("simple"));
    }
}
