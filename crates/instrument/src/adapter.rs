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

//! Bundler-facing glue: include/exclude filtering and fail-open
//! instrumentation of per-file sources.

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::{instrument_with_options, parse, InstrumentOptions};

/// Compiled include/exclude filter over logical filenames.
///
/// A file passes when it carries a recognised dialect extension, matches at
/// least one include pattern (if any were given), and matches no exclude
/// pattern.
pub struct FileFilter {
    includes: Option<GlobSet>,
    excludes: Option<GlobSet>,
}

impl FileFilter {
    /// Compile a filter from glob patterns.
    pub fn new(includes: &[String], excludes: &[String]) -> eyre::Result<Self> {
        Ok(Self { includes: compile(includes)?, excludes: compile(excludes)? })
    }

    /// Whether a logical filename should be instrumented.
    pub fn matches(&self, filename: &str) -> bool {
        if !parse::is_recognised_dialect(filename) {
            return false;
        }
        if let Some(includes) = &self.includes {
            if !includes.is_match(filename) {
                return false;
            }
        }
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(filename) {
                return false;
            }
        }
        true
    }
}

fn compile(patterns: &[String]) -> eyre::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Instrument a single file, falling back to the original source on any
/// instrumenter failure. This is the contract the bundler glue relies on:
/// a build never breaks because a file would not instrument.
pub fn process_file(source: &str, filename: &str, options: &InstrumentOptions) -> String {
    match instrument_with_options(source, filename, options) {
        Ok(instrumented) => instrumented,
        Err(err) => {
            warn!(filename, %err, "instrumentation failed, emitting original source");
            source.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_requires_dialect_extension() {
        let filter = FileFilter::new(&[], &[]).unwrap();
        assert!(filter.matches("src/app.ts"));
        assert!(filter.matches("src/app.jsx"));
        assert!(!filter.matches("src/styles.css"));
    }

    #[test]
    fn test_filter_includes_and_excludes() {
        let filter = FileFilter::new(
            &["src/**/*.ts".to_string()],
            &["src/**/*.test.ts".to_string()],
        )
        .unwrap();
        assert!(filter.matches("src/app.ts"));
        assert!(filter.matches("src/deep/nested.ts"));
        assert!(!filter.matches("lib/app.ts"));
        assert!(!filter.matches("src/app.test.ts"));
    }

    #[test]
    fn test_process_file_falls_back_on_parse_failure() {
        let broken = "function ((( {";
        let result = process_file(broken, "broken.js", &InstrumentOptions::default());
        assert_eq!(result, broken);
    }

    #[test]
    fn test_process_file_instruments_valid_source() {
        let source = "function f(a) { return a; }";
        let result = process_file(source, "ok.js", &InstrumentOptions::default());
        assert!(result.contains("twiz("));
    }
}
