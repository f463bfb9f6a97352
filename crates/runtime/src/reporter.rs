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

//! The process-wide observation reporter.
//!
//! Observations are buffered in memory, deduplicated per program point by
//! their serialised form, and flushed to the collector by a single-shot
//! timer armed on the first observation after the previous flush. Delivery
//! is at-most-once: a failed post is logged and dropped, and buffered
//! observations are lost on process termination.
//!
//! Provenance tracking is host-thread-local and weak: tracking an object
//! never keeps it alive, and a tracked pointer whose object has been
//! reclaimed is pruned rather than reported.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Weak,
    time::Duration,
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};
use typetrace_common::{env, BatchRecord, ObservationMetadata, Provenance, ValueEntry};

use crate::serialize::to_surrogate;
use crate::value::RuntimeValue;

/// Hard cap on buffered value entries; observations beyond it are dropped
/// until the next flush.
pub const MAX_PENDING_VALUES: usize = 10_000;

/// Reporter configuration, normally derived from the environment.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Collector ingest endpoint; `None` means no transport is available
    /// and the buffer is retained indefinitely.
    pub collector_url: Option<String>,
    /// Delay between the first buffered observation and the flush.
    pub flush_interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        let collector_url = std::env::var(env::TYPETRACE_COLLECTOR_URL)
            .ok()
            .or_else(|| Some(env::DEFAULT_COLLECTOR_URL.to_string()));
        let flush_interval = std::env::var(env::TYPETRACE_FLUSH_INTERVAL_MS)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(env::DEFAULT_FLUSH_INTERVAL_MS));
        Self { collector_url: collector_url.filter(|url| !url.is_empty()), flush_interval }
    }
}

#[derive(Default)]
struct Slot {
    metadata: ObservationMetadata,
    values: Vec<ValueEntry>,
    seen: HashSet<String>,
}

struct BufferState {
    slots: HashMap<(String, u64), Slot>,
    pending_values: usize,
    timer_armed: bool,
    config: ReporterConfig,
}

static BUFFER: Lazy<Mutex<BufferState>> = Lazy::new(|| {
    Mutex::new(BufferState {
        slots: HashMap::new(),
        pending_values: 0,
        timer_armed: false,
        config: ReporterConfig::default(),
    })
});

enum WeakHandle {
    Array(Weak<RefCell<Vec<RuntimeValue>>>),
    Object(Weak<RefCell<Vec<(String, RuntimeValue)>>>),
}

impl WeakHandle {
    fn alive(&self) -> bool {
        match self {
            Self::Array(weak) => weak.strong_count() > 0,
            Self::Object(weak) => weak.strong_count() > 0,
        }
    }
}

thread_local! {
    // Weak provenance registry for composites created on this host thread.
    static TRACKED: RefCell<HashMap<usize, (WeakHandle, Provenance)>> =
        RefCell::new(HashMap::new());
}

/// Replace the reporter configuration.
pub fn configure(config: ReporterConfig) {
    BUFFER.lock().config = config;
}

/// Record one parameter observation.
///
/// This is the Rust counterpart of the injected `twiz(..)` call: it
/// serialises the value safely, deduplicates it against the values already
/// buffered for `(filename, offset)`, attaches tracked provenance, and arms
/// the flush timer if it is not already running.
pub fn record(
    label: &str,
    value: &RuntimeValue,
    offset: u64,
    filename: &str,
    metadata: ObservationMetadata,
) {
    let surrogate = to_surrogate(value);
    let provenance = lookup_provenance(value);

    let mut state = BUFFER.lock();
    if state.pending_values >= MAX_PENDING_VALUES {
        warn!(label, "observation buffer full, dropping observation");
        return;
    }

    let slot = state.slots.entry((filename.to_string(), offset)).or_default();
    if slot.values.is_empty() {
        slot.metadata = metadata;
    }

    let text = surrogate.to_string();
    if !slot.seen.insert(text) {
        return;
    }
    slot.values.push(ValueEntry(surrogate, provenance));
    state.pending_values += 1;
    debug!(label, filename, offset, "buffered observation");

    arm_timer(&mut state);
}

/// Record the origin of a composite value.
///
/// When the value later arrives as a parameter, the stored `(filename,
/// offset)` pair is attached to the observation. Tracking is weak and never
/// prevents reclamation of the value.
pub fn track(value: &RuntimeValue, filename: &str, offset: u64) {
    let Some(id) = value.composite_id() else { return };
    let handle = match value {
        RuntimeValue::Array(rc) => WeakHandle::Array(std::rc::Rc::downgrade(rc)),
        RuntimeValue::Object(rc) => WeakHandle::Object(std::rc::Rc::downgrade(rc)),
        _ => return,
    };
    TRACKED.with(|tracked| {
        let mut tracked = tracked.borrow_mut();
        // Reclaimed composites leave dangling entries behind; prune them
        // while we are here.
        tracked.retain(|_, (weak, _)| weak.alive());
        tracked.insert(id, (handle, Provenance(filename.to_string(), offset)));
    });
}

fn lookup_provenance(value: &RuntimeValue) -> Option<Provenance> {
    let id = value.composite_id()?;
    TRACKED.with(|tracked| {
        let tracked = tracked.borrow();
        tracked.get(&id).filter(|(weak, _)| weak.alive()).map(|(_, origin)| origin.clone())
    })
}

fn arm_timer(state: &mut BufferState) {
    if state.timer_armed || state.config.collector_url.is_none() {
        return;
    }
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        // No async runtime on this thread: the buffer is retained until the
        // host flushes explicitly.
        return;
    };
    let interval = state.config.flush_interval;
    state.timer_armed = true;
    handle.spawn(async move {
        tokio::time::sleep(interval).await;
        flush_now().await;
    });
}

/// Take the pending batch and post it to the collector.
///
/// The buffer is swapped for a fresh one before the request is dispatched,
/// so observations arriving during the post accumulate into the next batch.
/// Transport failures are logged and the batch is dropped.
pub async fn flush_now() {
    let (batch, url) = {
        let mut state = BUFFER.lock();
        state.timer_armed = false;
        let batch = take_batch_locked(&mut state);
        (batch, state.config.collector_url.clone())
    };

    if batch.is_empty() {
        return;
    }
    let Some(url) = url else { return };

    match reqwest::Client::new().post(&url).json(&batch).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(records = batch.len(), "flushed observation batch");
        }
        Ok(response) => {
            warn!(status = %response.status(), "collector rejected observation batch");
        }
        Err(err) => {
            warn!(%err, "failed to post observation batch");
        }
    }
}

fn take_batch_locked(state: &mut BufferState) -> Vec<BatchRecord> {
    state.pending_values = 0;
    let slots = std::mem::take(&mut state.slots);
    let mut batch: Vec<BatchRecord> = slots
        .into_iter()
        .map(|((filename, offset), slot)| {
            BatchRecord::Positional(filename, offset, slot.values, slot.metadata)
        })
        .collect();
    // HashMap drains in arbitrary order; keep batches deterministic.
    batch.sort_by(|a, b| match (a, b) {
        (BatchRecord::Positional(fa, oa, ..), BatchRecord::Positional(fb, ob, ..)) => {
            (fa, oa).cmp(&(fb, ob))
        }
        _ => std::cmp::Ordering::Equal,
    });
    batch
}

/// Test hook: take the pending batch without posting it.
pub fn drain() -> Vec<BatchRecord> {
    let mut state = BUFFER.lock();
    state.timer_armed = false;
    take_batch_locked(&mut state)
}

/// Test hook: clear all buffered observations and tracked provenance.
pub fn reset() {
    let mut state = BUFFER.lock();
    state.slots.clear();
    state.pending_values = 0;
    state.timer_armed = false;
    state.config = ReporterConfig::default();
    drop(state);
    TRACKED.with(|tracked| tracked.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn meta(context: &str) -> ObservationMetadata {
        ObservationMetadata {
            function_name: Some("setStatus".into()),
            context: Some(context.into()),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_record_deduplicates_by_serialised_form() {
        reset();
        for _ in 0..3 {
            record("setStatus_param_s", &RuntimeValue::str("busy"), 10, "app.ts", meta("p"));
        }
        record("setStatus_param_s", &RuntimeValue::str("idle"), 10, "app.ts", meta("p"));

        let batch = drain();
        assert_eq!(batch.len(), 1);
        let BatchRecord::Positional(filename, offset, values, metadata) = batch[0].clone() else {
            panic!("expected positional record");
        };
        assert_eq!(filename, "app.ts");
        assert_eq!(offset, 10);
        assert_eq!(values.len(), 2);
        assert_eq!(metadata.function_name.as_deref(), Some("setStatus"));
    }

    #[test]
    #[serial]
    fn test_distinct_offsets_get_distinct_records() {
        reset();
        record("f_param_a", &RuntimeValue::Number(1.0), 11, "m.js", meta("p"));
        record("f_param_b", &RuntimeValue::Number(2.0), 13, "m.js", meta("p"));

        let batch = drain();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    #[serial]
    fn test_drain_clears_buffer() {
        reset();
        record("f_param_a", &RuntimeValue::Bool(true), 0, "m.js", meta("p"));
        assert_eq!(drain().len(), 1);
        assert!(drain().is_empty());
    }

    #[test]
    #[serial]
    fn test_tracked_provenance_is_attached() {
        reset();
        let todo = RuntimeValue::object(vec![("id".into(), RuntimeValue::str("a"))]);
        track(&todo, "app.ts", 44);
        record("addTodo_param_todo", &todo, 120, "app.ts", meta("p"));

        let batch = drain();
        let BatchRecord::Positional(_, _, values, _) = batch[0].clone() else { unreachable!() };
        assert_eq!(values[0].1, Some(Provenance("app.ts".into(), 44)));
    }

    #[test]
    #[serial]
    fn test_provenance_is_weak() {
        reset();
        let id = {
            let todo = RuntimeValue::object(vec![("id".into(), RuntimeValue::str("a"))]);
            track(&todo, "app.ts", 44);
            todo.composite_id().unwrap()
        };
        // The tracked object is gone; a new composite at the same address
        // must not inherit its provenance.
        let _ = id;
        let fresh = RuntimeValue::object(vec![("id".into(), RuntimeValue::str("b"))]);
        record("addTodo_param_todo", &fresh, 120, "app.ts", meta("p"));

        let batch = drain();
        let BatchRecord::Positional(_, _, values, _) = batch[0].clone() else { unreachable!() };
        assert!(values[0].1.is_none());
    }

    #[test]
    #[serial]
    fn test_buffer_cap_drops_excess_observations() {
        reset();
        for i in 0..(MAX_PENDING_VALUES + 50) {
            record("f_param_a", &RuntimeValue::Number(i as f64), i as u64, "big.js", meta("p"));
        }
        let batch = drain();
        let total: usize = batch
            .iter()
            .map(|record| match record {
                BatchRecord::Positional(_, _, values, _) => values.len(),
                BatchRecord::Keyed { values, .. } => values.len(),
            })
            .sum();
        assert_eq!(total, MAX_PENDING_VALUES);
    }
}
