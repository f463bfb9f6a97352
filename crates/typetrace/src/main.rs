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

//! TypeTrace - Runtime type profiler
//!
//! Instruments ECMAScript/TypeScript sources with observation hooks and
//! runs the collector that turns the resulting observations into type
//! profiles.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::Result;
use typetrace_common::env;

mod cmd;

/// Command-line interface for TypeTrace
#[derive(Debug, Parser)]
#[command(name = "typetrace")]
#[command(about = "TypeTrace - Runtime type-profile collection for ECMAScript and TypeScript")]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Instrument source files with observation hooks
    Instrument {
        /// File or directory to instrument
        path: PathBuf,

        /// Include glob patterns; files must match at least one if given
        #[arg(long)]
        include: Vec<String>,

        /// Exclude glob patterns
        #[arg(long)]
        exclude: Vec<String>,

        /// Output directory mirroring the input tree (default: write
        /// `<name>.instrumented.<ext>` next to each source)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Collector ingest endpoint baked into the instrumented output
        #[arg(long, env = env::TYPETRACE_COLLECTOR_URL)]
        collector_url: Option<String>,

        /// Reporter flush interval baked into the instrumented output
        #[arg(long, env = env::TYPETRACE_FLUSH_INTERVAL_MS)]
        flush_interval_ms: Option<u64>,
    },
    /// Run the collector server
    Serve {
        /// Port to listen on
        #[arg(long, env = env::TYPETRACE_PORT, default_value_t = env::DEFAULT_COLLECTOR_PORT)]
        port: u16,

        /// SQLite database path (`:memory:` for an ephemeral store)
        #[arg(long, env = env::TYPETRACE_DB_PATH, default_value = "typetrace.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging; the file guard must outlive every command
    let log_file = std::env::var_os(env::TYPETRACE_LOG_FILE).map(PathBuf::from);
    let _log_guard = typetrace_common::logging::init("typetrace", log_file.as_deref())?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Instrument { path, include, exclude, out, collector_url, flush_interval_ms } => {
            cmd::instrument_path(
                &path,
                &include,
                &exclude,
                out.as_deref(),
                collector_url,
                flush_interval_ms,
            )
        }
        Commands::Serve { port, db } => cmd::serve(port, &db).await,
    }
}
