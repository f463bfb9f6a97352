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

//! The observation store and its transactional ingest path.
//!
//! One SQLite connection guarded by a mutex serialises all writes. Each
//! batch applies inside a single transaction: entities, entity metadata,
//! HOF relationships, value observations and the derived string-literal and
//! object-shape records, all keyed by the natural keys of the schema.
//! Replaying an identical batch only increments counters.

mod schema;

use std::{path::Path, sync::Arc};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Transaction};
use tracing::debug;
use typetrace_common::{
    classify, is_enum_candidate, render_literal, shape_signature, value_hash, BatchRecord,
    ObservationMetadata, ValueEntry, ValueType,
};

use crate::error::CollectorError;

pub use schema::SCHEMA;

/// Entity context tag of function-entry records; entry entities derive
/// their name as `<fn>_entry` instead of the parameter pattern.
const ENTRY_CONTEXT: &str = "function_entry";

/// Counts reported after a successful batch ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    /// Number of records applied
    pub records: usize,
    /// Number of value observations applied
    pub values: usize,
}

/// Shared handle to the observation store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) a store at the given path. `:memory:` is accepted.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CollectorError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an ephemeral in-memory store.
    pub fn open_in_memory() -> Result<Self, CollectorError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, CollectorError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run a read-only closure against the connection.
    pub fn with_conn<R>(
        &self,
        f: impl FnOnce(&Connection) -> Result<R, rusqlite::Error>,
    ) -> Result<R, CollectorError> {
        let conn = self.conn.lock();
        f(&conn).map_err(CollectorError::from)
    }

    /// Apply a batch of records in a single transaction.
    ///
    /// Partial failure rolls back the whole batch. Record order within the
    /// batch does not affect the resulting state beyond timestamps.
    pub fn ingest(&self, records: Vec<BatchRecord>) -> Result<IngestSummary, CollectorError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut summary = IngestSummary { records: 0, values: 0 };
        for record in records {
            summary.values += apply_record(&tx, &now, record)?;
            summary.records += 1;
        }

        tx.commit()?;
        debug!(records = summary.records, values = summary.values, "batch ingested");
        Ok(summary)
    }
}

fn apply_record(
    tx: &Transaction<'_>,
    now: &str,
    record: BatchRecord,
) -> Result<usize, CollectorError> {
    let (filename, offset, values, metadata) = record.into_parts();

    let entity_id: i64 = tx.query_row(
        "INSERT INTO entities (filename, source_offset, first_seen, last_seen)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT (filename, source_offset) DO UPDATE SET
             observation_count = observation_count + 1,
             last_seen = excluded.last_seen
         RETURNING id",
        params![filename, offset as i64, now],
        |row| row.get(0),
    )?;

    refresh_entity_metadata(tx, entity_id, &metadata)?;

    if let (Some(callee), Some(arg_index)) = (&metadata.callee_name, metadata.callee_arg_index) {
        tx.execute(
            "INSERT INTO hof_relationships (entity_id, callee_name, callee_arg_index, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (entity_id, callee_name, callee_arg_index) DO UPDATE SET
                 observation_count = observation_count + 1,
                 last_seen = excluded.last_seen",
            params![entity_id, callee, arg_index, now],
        )?;
    }

    let context = enriched_context(&metadata);
    let mut applied = 0;
    for ValueEntry(value, _provenance) in values {
        let value_type = classify(&value);
        let literal = render_literal(&value);
        let hash = value_hash(&literal);

        tx.execute(
            "INSERT INTO value_observations (entity_id, value_type, literal_value, value_hash, context, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT (entity_id, value_hash, context) DO UPDATE SET
                 observation_count = observation_count + 1,
                 last_seen = excluded.last_seen",
            params![entity_id, value_type.to_string(), literal, hash, context, now],
        )?;

        match &value_type {
            ValueType::String => {
                if let Some(text) = value.as_str() {
                    if is_enum_candidate(text) {
                        tx.execute(
                            "INSERT INTO string_literals (entity_id, string_value, context, first_seen, last_seen)
                             VALUES (?1, ?2, ?3, ?4, ?4)
                             ON CONFLICT (entity_id, string_value, context) DO UPDATE SET
                                 observation_count = observation_count + 1,
                                 last_seen = excluded.last_seen",
                            params![entity_id, text, context, now],
                        )?;
                    }
                }
            }
            ValueType::Object => {
                if let Some(map) = value.as_object() {
                    if let Some(signature) = shape_signature(map) {
                        tx.execute(
                            "INSERT INTO object_shapes (entity_id, shape_signature, key_count, first_seen, last_seen)
                             VALUES (?1, ?2, ?3, ?4, ?4)
                             ON CONFLICT (entity_id, shape_signature) DO UPDATE SET
                                 observation_count = observation_count + 1,
                                 last_seen = excluded.last_seen",
                            params![entity_id, signature, map.len() as i64, now],
                        )?;
                    }
                }
            }
            _ => {}
        }
        applied += 1;
    }

    Ok(applied)
}

/// Refresh entity naming and positions from record metadata, treating
/// absent fields as "leave prior value intact".
fn refresh_entity_metadata(
    tx: &Transaction<'_>,
    entity_id: i64,
    metadata: &ObservationMetadata,
) -> Result<(), CollectorError> {
    if metadata.function_name.is_none()
        && metadata.line_number.is_none()
        && metadata.column_number.is_none()
        && metadata.context.is_none()
    {
        return Ok(());
    }

    tx.execute(
        "UPDATE entities SET
             entity_name = COALESCE(?2, entity_name),
             entity_type = COALESCE(?3, entity_type),
             line_number = COALESCE(?4, line_number),
             column_number = COALESCE(?5, column_number)
         WHERE id = ?1",
        params![
            entity_id,
            derived_entity_name(metadata),
            metadata.context,
            metadata.line_number,
            metadata.column_number
        ],
    )?;
    Ok(())
}

/// Stable entity label derived from metadata, e.g. `addTodo_param_todo`.
fn derived_entity_name(metadata: &ObservationMetadata) -> Option<String> {
    let function = metadata.function_name.as_deref();
    let parameter = metadata.parameter_name.as_deref();
    if metadata.context.as_deref() == Some(ENTRY_CONTEXT) {
        return function.map(|f| format!("{f}_entry"));
    }
    match (function, parameter) {
        (Some(f), Some(p)) => Some(format!("{f}_param_{p}")),
        (None, Some(p)) => Some(format!("param_{p}")),
        (Some(f), None) => Some(f.to_string()),
        (None, None) => None,
    }
}

/// Context enriched with the enclosing function name, when known.
fn enriched_context(metadata: &ObservationMetadata) -> String {
    let base = metadata.context.as_deref().unwrap_or("unknown");
    match metadata.function_name.as_deref() {
        Some(function) => format!("{base}_in_{function}"),
        None => base.to_string(),
    }
}
