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

//! TypeTrace instrumentation engine.
//!
//! Source-to-source transformation of ECMAScript and TypeScript files that
//! leaves observable behaviour unchanged while preceding every
//! function-parameter binding with a guarded `twiz(..)` observation call.
//! The transformation is splice-based: the parser supplies spans, the
//! original text is never re-printed, and every injected statement sits on
//! the same physical line as the body it enters, so pre-existing code keeps
//! its original line numbers.
//!
//! The entry point is [`instrument`]; bundler glue should go through
//! [`adapter::process_file`], which falls back to the original source when a
//! file cannot be parsed.

pub mod adapter;
pub mod analysis;
pub mod codegen;
pub mod modification;
pub mod parse;

use tracing::debug;
use typetrace_common::env;

pub use adapter::{process_file, FileFilter};
pub use analysis::{
    analyze, BodySite, FunctionKind, FunctionSite, ParamBinding, ParamSite, SourceAnalysis,
};
pub use modification::{HookData, InstrumentAction, InstrumentContent, SourceModifications};
pub use parse::{parse_module, ParsedModule, DIALECT_EXTENSIONS};

/// Instrumentation failure kinds.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    /// The parser rejected the input; the caller must fall back to the
    /// original source verbatim.
    #[error("source {filename} is unparseable: {message}")]
    SourceUnparseable {
        /// Logical filename of the rejected source
        filename: String,
        /// Parser diagnostic
        message: String,
    },
}

/// Options controlling the emitted runtime prelude.
#[derive(Debug, Clone)]
pub struct InstrumentOptions {
    /// Collector ingest endpoint baked into the prelude (overridable at
    /// runtime through `TWIZ_COLLECTOR_URL` on the host global).
    pub collector_url: String,
    /// Reporter flush interval baked into the prelude, in milliseconds.
    pub flush_interval_ms: u64,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            collector_url: env::DEFAULT_COLLECTOR_URL.to_string(),
            flush_interval_ms: env::DEFAULT_FLUSH_INTERVAL_MS,
        }
    }
}

/// Instrument a source file with default options.
///
/// Deterministic: identical inputs produce byte-identical outputs. Fails
/// only with [`InstrumentError::SourceUnparseable`]; there is never a
/// partially transformed result.
pub fn instrument(source: &str, filename: &str) -> Result<String, InstrumentError> {
    instrument_with_options(source, filename, &InstrumentOptions::default())
}

/// Instrument a source file.
pub fn instrument_with_options(
    source: &str,
    filename: &str,
    options: &InstrumentOptions,
) -> Result<String, InstrumentError> {
    let parsed = parse::parse_module(source, filename)?;
    let analysis = analysis::analyze(&parsed, source);

    if analysis.sites.is_empty() {
        debug!(filename, "no instrumentable sites");
        return Ok(source.to_string());
    }

    let mut modifications = SourceModifications::new();
    modifications.collect_instrumentation(filename, &analysis);
    if modifications.is_empty() {
        return Ok(source.to_string());
    }

    let spliced = modifications.modify_source(source);
    let prelude = codegen::runtime_prelude(&options.collector_url, options.flush_interval_ms);
    debug!(filename, sites = analysis.sites.len(), "instrumented source");
    Ok(format!("{prelude}{spliced}"))
}
