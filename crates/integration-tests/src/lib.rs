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

//! Test utilities for TypeTrace end-to-end tests.

use eyre::Result;
use typetrace_collector::{CollectorServer, CollectorServerHandle, Store};

/// Start a collector over an in-memory store on a free port.
///
/// Returns the server handle and its base URL.
pub async fn start_test_collector() -> Result<(CollectorServerHandle, String)> {
    typetrace_common::logging::ensure_test_logging(None);
    let store = Store::open_in_memory()?;
    let handle = CollectorServer::new(store).start_on_port(0).await?;
    let base = format!("http://{}", handle.addr());
    Ok((handle, base))
}

/// Build the wire batch an instrumented program would post for one run of
/// the given source, pairing each parameter site with the supplied values.
///
/// Sites are matched by their label; unknown labels are ignored. This mirrors
/// what the injected prelude assembles at flush time.
pub fn batch_for_source(
    source: &str,
    filename: &str,
    observations: &[(&str, serde_json::Value)],
) -> Result<Vec<serde_json::Value>> {
    use typetrace_instrument::{analyze, codegen, parse_module, BodySite};

    let parsed = parse_module(source, filename)?;
    let analysis = analyze(&parsed, source);

    let mut records = Vec::new();
    for site in &analysis.sites {
        let insert_at = match site.body {
            BodySite::Block { insert_at } => insert_at,
            BodySite::Expression { start, .. } => start,
        };

        let entry = codegen::entry_hook(site, insert_at, filename);
        records.push(serde_json::json!([
            entry.filename,
            entry.offset,
            [[site.params.len(), serde_json::Value::Null]],
            entry.metadata,
        ]));

        for param in &site.params {
            let hook = codegen::param_hook(site, param, filename);
            let observed: Vec<_> = observations
                .iter()
                .filter(|(label, _)| *label == hook.label)
                .map(|(_, value)| serde_json::json!([value, serde_json::Value::Null]))
                .collect();
            if observed.is_empty() {
                continue;
            }
            records.push(serde_json::json!([hook.filename, hook.offset, observed, hook.metadata]));
        }
    }
    Ok(records)
}
