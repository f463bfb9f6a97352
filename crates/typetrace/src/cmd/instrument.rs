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

//! The `instrument` command: walk sources, filter, splice hooks.

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use tracing::{debug, info, warn};
use typetrace_instrument::{adapter, FileFilter, InstrumentOptions};
use walkdir::WalkDir;

/// Instrument every matching file under `path`.
pub fn instrument_path(
    path: &Path,
    include: &[String],
    exclude: &[String],
    out: Option<&Path>,
    collector_url: Option<String>,
    flush_interval_ms: Option<u64>,
) -> Result<()> {
    let filter = FileFilter::new(include, exclude)?;
    let defaults = InstrumentOptions::default();
    let options = InstrumentOptions {
        collector_url: collector_url.unwrap_or(defaults.collector_url),
        flush_interval_ms: flush_interval_ms.unwrap_or(defaults.flush_interval_ms),
    };

    let root = if path.is_file() { path.parent().unwrap_or(Path::new(".")) } else { path };

    let mut instrumented = 0usize;
    let mut skipped = 0usize;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = logical_name(root, entry.path());
        if !filter.matches(&relative) {
            debug!(file = %relative, "filtered out");
            skipped += 1;
            continue;
        }

        let source = fs::read_to_string(entry.path())
            .wrap_err_with(|| format!("reading {}", entry.path().display()))?;
        let output = adapter::process_file(&source, &relative, &options);

        let target = output_path(root, entry.path(), out);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, output)
            .wrap_err_with(|| format!("writing {}", target.display()))?;

        info!(file = %relative, target = %target.display(), "instrumented");
        instrumented += 1;
    }

    if instrumented == 0 {
        warn!("no files matched the instrumentation filter");
    }
    println!("Instrumented {instrumented} file(s), skipped {skipped}.");
    Ok(())
}

/// Logical filename recorded in instrumentation: path relative to the walk
/// root, with forward slashes.
fn logical_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative.to_string_lossy().replace('\\', "/")
}

/// Where the instrumented output goes: mirrored under `--out`, or next to
/// the source as `<name>.instrumented.<ext>`.
fn output_path(root: &Path, file: &Path, out: Option<&Path>) -> PathBuf {
    match out {
        Some(out_dir) => out_dir.join(file.strip_prefix(root).unwrap_or(file)),
        None => {
            let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
            let extension = file.extension().and_then(|s| s.to_str()).unwrap_or("js");
            file.with_file_name(format!("{stem}.instrumented.{extension}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_sibling() {
        let target = output_path(Path::new("src"), Path::new("src/app.ts"), None);
        assert_eq!(target, Path::new("src/app.instrumented.ts"));
    }

    #[test]
    fn test_output_path_mirrored() {
        let target =
            output_path(Path::new("src"), Path::new("src/deep/app.ts"), Some(Path::new("dist")));
        assert_eq!(target, Path::new("dist/deep/app.ts"));
    }

    #[test]
    fn test_logical_name_is_root_relative() {
        assert_eq!(logical_name(Path::new("src"), Path::new("src/a/b.ts")), "a/b.ts");
    }
}
