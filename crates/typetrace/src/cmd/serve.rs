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

//! The `serve` command: run the collector until interrupted.

use std::path::Path;

use eyre::Result;
use tracing::info;
use typetrace_collector::{CollectorServer, Store};

/// Open the store and serve the collector API.
pub async fn serve(port: u16, db: &Path) -> Result<()> {
    let store = Store::open(db)?;
    info!(db = %db.display(), "store opened");

    let handle = CollectorServer::new(store).start_on_port(port).await?;
    println!("Collector listening on http://{}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown()?;
    Ok(())
}
