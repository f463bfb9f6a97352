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

//! Environment variable name constants for TypeTrace configuration.
//!
//! These constants are the single source of truth for the environment
//! variables recognised by the TypeTrace binaries. CLI arguments take
//! precedence over the environment where both are accepted.

/// Environment variable for the collector ingest endpoint used by the
/// in-process runtime reporter and baked into instrumented output.
///
/// # Examples
///
/// ```bash
/// TYPETRACE_COLLECTOR_URL=http://localhost:7700/ingest typetrace instrument src/
/// ```
pub const TYPETRACE_COLLECTOR_URL: &str = "TYPETRACE_COLLECTOR_URL";

/// Environment variable for the collector's SQLite database path.
///
/// When not set, `typetrace serve` defaults to `typetrace.db` in the working
/// directory. `:memory:` is accepted for ephemeral stores.
pub const TYPETRACE_DB_PATH: &str = "TYPETRACE_DB_PATH";

/// Environment variable for the collector's listen port.
///
/// Also available as a CLI argument (`--port`) which takes precedence.
pub const TYPETRACE_PORT: &str = "TYPETRACE_PORT";

/// Environment variable for an optional log file.
///
/// When set, the binaries append plain-text log output to this path in
/// addition to stderr. Mainly useful for long-running `typetrace serve`
/// deployments.
pub const TYPETRACE_LOG_FILE: &str = "TYPETRACE_LOG_FILE";

/// Environment variable for the runtime reporter's flush interval, in
/// milliseconds.
///
/// The reporter arms a single-shot timer on the first observation after a
/// flush; when the timer expires the accumulated batch is posted. Invalid
/// values are ignored and the default of 2000ms is used.
pub const TYPETRACE_FLUSH_INTERVAL_MS: &str = "TYPETRACE_FLUSH_INTERVAL_MS";

/// Default collector ingest endpoint.
pub const DEFAULT_COLLECTOR_URL: &str = "http://localhost:7700/ingest";

/// Default collector listen port.
pub const DEFAULT_COLLECTOR_PORT: u16 = 7700;

/// Default reporter flush interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 2000;
