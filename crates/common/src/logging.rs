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

//! Logging for the TypeTrace binaries.
//!
//! One fmt subscriber per process. `RUST_LOG` controls verbosity and
//! defaults to INFO with the HTTP internals capped at WARN, so a collector
//! under steady ingest traffic logs its own events rather than hyper's.
//! The collector can additionally append plain-text output to a log file
//! (`TYPETRACE_LOG_FILE`); the caller keeps the returned guard alive so
//! buffered lines are flushed on exit.

use std::{fs::OpenOptions, io, path::Path};

use eyre::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

// The reporter posts over reqwest and the collector serves through hyper;
// at INFO both would narrate every batch.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,tower_http=warn,reqwest=warn";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialise logging for a TypeTrace binary.
///
/// Events go to stderr. With `log_file` set they are also appended to that
/// file, without colour codes. The returned guard owns the file writer's
/// flush thread and must live until process exit.
pub fn init(component: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (file_writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(DEFAULT_DIRECTIVES))
                .with_writer(io::stderr.and(file_writer))
                .with_ansi(false)
                .try_init()
                .map_err(|err| eyre::eyre!("logging already initialised: {err}"))?;
            tracing::info!(component, log_file = %path.display(), "logging initialised");
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(DEFAULT_DIRECTIVES))
                .with_writer(io::stderr)
                .try_init()
                .map_err(|err| eyre::eyre!("logging already initialised: {err}"))?;
            tracing::info!(component, "logging initialised");
            Ok(None)
        }
    }
}

/// Console logging for tests.
///
/// Safe to call from every test: only the first call in a process installs
/// a subscriber, later ones are no-ops. Output goes through the test writer
/// so it is captured per test.
pub fn ensure_test_logging(default_level: Option<Level>) {
    let fallback = default_level.unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback.as_str()))
        .with_test_writer()
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_test_logging_is_idempotent() {
        ensure_test_logging(None);
        ensure_test_logging(Some(Level::DEBUG));
        tracing::info!("logging twice-initialised without panicking");
    }

    #[test]
    fn test_init_appends_to_log_file() {
        let dir = std::env::temp_dir().join("typetrace-logging-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("collector.log");

        // A subscriber may already be installed by another test; the file
        // must still have been opened for append either way.
        let _ = init("typetrace-test", Some(&path));
        assert!(path.exists());
    }
}
