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

//! Generation of the injected JavaScript: observation hooks and the
//! host-guarded runtime prelude.

use typetrace_common::{ObservationMetadata, ParameterKind};

use crate::analysis::{FunctionKind, FunctionSite, ParamSite, ENTRY_CONTEXT};
use crate::modification::HookData;

/// Build the hook data for a function-entry record. The observed value is
/// the declared parameter count.
///
/// The entry entity anchors at the body insertion point rather than the
/// function head: a parenless arrow head starts at its own first parameter,
/// and the two records must stay distinct `(filename, offset)` entities.
pub fn entry_hook(site: &FunctionSite, insert_at: usize, filename: &str) -> HookData {
    HookData {
        label: format!("{}_entry", site.base),
        value_expr: site.params.len().to_string(),
        offset: insert_at,
        filename: filename.to_string(),
        metadata: ObservationMetadata {
            function_name: Some(site.base.clone()),
            context: Some(ENTRY_CONTEXT.to_string()),
            line_number: Some(site.line),
            column_number: Some(site.column),
            ..Default::default()
        },
    }
}

/// Build the hook data for one parameter record.
pub fn param_hook(site: &FunctionSite, param: &ParamSite, filename: &str) -> HookData {
    let (callee_name, callee_arg_index) = match &site.kind {
        FunctionKind::CallbackArgument { callee, arg_index } => {
            (Some(callee.clone()), Some(*arg_index))
        }
        _ => (None, None),
    };

    HookData {
        label: format!("{}_param_{}", site.base, param.display_name()),
        value_expr: param.value_expr(),
        offset: param.offset,
        filename: filename.to_string(),
        metadata: ObservationMetadata {
            function_name: Some(site.base.clone()),
            parameter_name: Some(param.display_name().to_string()),
            parameter_index: Some(param.index),
            parameter_type: Some(if param.annotated {
                ParameterKind::Annotated
            } else {
                ParameterKind::Untyped
            }),
            has_default: Some(param.has_default),
            is_destructured: Some(!matches!(
                param.binding,
                crate::analysis::ParamBinding::Identifier(_)
            )),
            is_rest: Some(param.is_rest),
            accessibility: param.accessibility,
            context: Some(site.kind.param_context().to_string()),
            line_number: Some(param.line),
            column_number: Some(param.column),
            callee_name,
            callee_arg_index,
        },
    }
}

/// Render a hook as an exception-swallowing expression statement.
///
/// Instrumentation faults must never alter program behaviour, so every hook
/// is wrapped in `try { .. } catch {}`.
pub fn render_hook(hook: &HookData) -> String {
    let label = js_string(&hook.label);
    let filename = js_string(&hook.filename);
    let metadata =
        serde_json::to_string(&hook.metadata).unwrap_or_else(|_| "{}".to_string());
    format!(
        "try {{ twiz({label}, {value}, {offset}, {filename}, {metadata}); }} catch {{}};",
        value = hook.value_expr,
        offset = hook.offset,
    )
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

// The runtime prelude, kept readable here and collapsed onto a single
// physical line on emission so it never shifts the line numbers of the
// instrumented file. Placeholders are substituted at emission time.
const PRELUDE_TEMPLATE: &str = r#";(function (g) {
if (!g || typeof g.twiz === "function") return;
var endpoint = g.TWIZ_COLLECTOR_URL || __TWIZ_ENDPOINT__;
var flushMs = g.TWIZ_FLUSH_INTERVAL_MS || __TWIZ_FLUSH_MS__;
var pending = {};
var timer = null;
var tracked = typeof WeakMap === "function" ? new WeakMap() : null;
function hostTag(v) {
try {
if (typeof Element !== "undefined" && v instanceof Element) return "[HTMLElement<" + v.tagName + ">]";
if (typeof Event !== "undefined" && v instanceof Event) return "[Event<" + v.type + ">]";
if (typeof NodeList !== "undefined" && v instanceof NodeList) return "[NodeList(" + v.length + ")]";
} catch (e) {}
return null;
}
function surrogate(v, seen) {
if (v === undefined) return "[undefined]";
if (v === null || typeof v === "boolean" || typeof v === "number" || typeof v === "string") return v;
if (typeof v === "function") return "[Function " + (v.name || "anonymous") + "]";
var tag = hostTag(v);
if (tag) return tag;
try {
if (v instanceof Date) return "[Date " + v.toISOString() + "]";
if (v instanceof RegExp) return "[RegExp " + v.toString() + "]";
if (seen.indexOf(v) !== -1) return "[Circular Reference]";
seen.push(v);
try {
if (Array.isArray(v)) {
var out = [];
for (var i = 0; i < v.length; i++) out.push(surrogate(v[i], seen));
return out;
}
var obj = {};
for (var k in v) if (Object.prototype.hasOwnProperty.call(v, k)) obj[k] = surrogate(v[k], seen);
return obj;
} finally { seen.pop(); }
} catch (e) { return "[Serialization Error: " + e + "]"; }
}
function flush() {
timer = null;
var batch = [];
for (var key in pending) {
if (!Object.prototype.hasOwnProperty.call(pending, key)) continue;
var slot = pending[key];
batch.push([slot.file, slot.pos, slot.values, slot.opts]);
}
pending = {};
if (!batch.length) return;
try {
if (typeof XMLHttpRequest === "undefined") return;
var xhr = new XMLHttpRequest();
xhr.open("POST", endpoint, true);
xhr.setRequestHeader("Content-Type", "application/json");
xhr.send(JSON.stringify(batch));
} catch (e) {}
}
g.twiz = function (name, value, pos, file, opts) {
try {
var key = file + ":" + pos;
var slot = pending[key];
if (!slot) slot = pending[key] = { file: file, pos: pos, opts: opts || {}, values: [], seen: {} };
var s = surrogate(value, []);
var text = JSON.stringify(s);
if (slot.seen[text]) return;
slot.seen[text] = true;
var origin = null;
if (tracked && value !== null && typeof value === "object") {
var t = tracked.get(value);
if (t) origin = t;
}
slot.values.push([s, origin]);
if (!timer && typeof setTimeout === "function") timer = setTimeout(flush, flushMs);
} catch (e) {}
};
g.twiz.track = function (value, file, pos) {
try {
if (tracked && value !== null && typeof value === "object") tracked.set(value, [file, pos]);
} catch (e) {}
return value;
};
})(typeof globalThis !== "undefined" ? globalThis : typeof window !== "undefined" ? window : typeof self !== "undefined" ? self : null);"#;

/// Render the runtime prelude as a single physical line.
///
/// The prelude defines `twiz` (and `twiz.track`) if absent and is inert on
/// hosts where the bindings it probes for are unavailable.
pub fn runtime_prelude(collector_url: &str, flush_interval_ms: u64) -> String {
    PRELUDE_TEMPLATE
        .replace("__TWIZ_ENDPOINT__", &js_string(collector_url))
        .replace("__TWIZ_FLUSH_MS__", &flush_interval_ms.to_string())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_is_single_line() {
        let prelude = runtime_prelude("http://localhost:7700/ingest", 2000);
        assert!(!prelude.contains('\n'));
        assert!(prelude.starts_with(";(function (g)"));
        assert!(prelude.ends_with(": null);"));
    }

    #[test]
    fn test_prelude_bakes_endpoint_and_interval() {
        let prelude = runtime_prelude("http://collector:9000/ingest", 500);
        assert!(prelude.contains("\"http://collector:9000/ingest\""));
        assert!(prelude.contains("|| 500;"));
        assert!(prelude.contains("g.twiz = function"));
        assert!(prelude.contains("g.twiz.track = function"));
    }

    #[test]
    fn test_render_hook_escapes_strings() {
        let hook = HookData {
            label: "f_param_a".to_string(),
            value_expr: "a".to_string(),
            offset: 12,
            filename: "dir\\app.ts".to_string(),
            metadata: Default::default(),
        };
        let rendered = render_hook(&hook);
        assert!(rendered.starts_with("try { twiz(\"f_param_a\", a, 12, \"dir\\\\app.ts\", {})"));
        assert!(rendered.ends_with("} catch {};"));
    }
}
