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

//! Query surface over the observation store.
//!
//! A closed set of derived views, each taking a read-only snapshot and
//! returning a paginated result:
//!
//! - [`stats`] - aggregate counts and the value-type distribution
//! - [`entities`] - per-entity listing with observation counts
//! - [`calls`] - per-value listing ordered by recency
//! - [`location`] - entities matching a source position
//! - [`enums`] - enum candidates derived from string literals
//! - [`shapes`] - recurring object shapes with synthesised interfaces
//! - [`annotations`] - ranked annotation recommendations
//! - [`adhoc`] - the bounded single-statement query channel

pub mod adhoc;
pub mod annotations;
pub mod calls;
pub mod entities;
pub mod enums;
pub mod location;
pub mod shapes;
pub mod stats;

use serde::Serialize;

/// Upper bound on page sizes across all endpoints.
pub const MAX_PAGE_SIZE: u64 = 500;

/// Pagination envelope shared by every paginated response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The page of items
    pub items: Vec<T>,
    /// Requested offset
    pub offset: u64,
    /// Effective page size
    pub limit: u64,
    /// Total matching items
    pub total: u64,
    /// Whether further pages exist
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Assemble a page, deriving `has_more` from the envelope.
    pub fn new(items: Vec<T>, offset: u64, limit: u64, total: u64) -> Self {
        let has_more = offset + (items.len() as u64) < total;
        Self { items, offset, limit, total, has_more }
    }
}

/// Resolve requested pagination against a default and the global maximum.
pub(crate) fn clamp_page(offset: Option<u64>, limit: Option<u64>, default_limit: u64) -> (u64, u64) {
    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    (offset, limit)
}

/// PascalCase a label: segments split on non-alphanumerics, first letter of
/// each upper-cased, inner capitalisation preserved.
pub(crate) fn pascal_case(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// The stem of a logical filename: final path segment, extensions stripped.
pub(crate) fn file_stem(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    name.split('.').next().unwrap_or(name)
}
