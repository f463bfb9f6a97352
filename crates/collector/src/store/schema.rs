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

//! Relational schema of the observation store.
//!
//! Five entity kinds, all carrying first-seen/last-seen timestamps and a
//! monotonically incremented observation counter. Natural keys are enforced
//! with UNIQUE constraints; every upsert relies on them.

/// Schema DDL, applied idempotently on open.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    source_offset INTEGER NOT NULL,
    entity_name TEXT,
    entity_type TEXT,
    line_number INTEGER,
    column_number INTEGER,
    observation_count INTEGER NOT NULL DEFAULT 1,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    UNIQUE (filename, source_offset)
);

CREATE TABLE IF NOT EXISTS value_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    value_type TEXT NOT NULL,
    literal_value TEXT,
    value_hash TEXT NOT NULL,
    context TEXT NOT NULL,
    observation_count INTEGER NOT NULL DEFAULT 1,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    UNIQUE (entity_id, value_hash, context)
);

CREATE TABLE IF NOT EXISTS string_literals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    string_value TEXT NOT NULL,
    context TEXT NOT NULL,
    observation_count INTEGER NOT NULL DEFAULT 1,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    UNIQUE (entity_id, string_value, context)
);

CREATE TABLE IF NOT EXISTS object_shapes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    shape_signature TEXT NOT NULL,
    key_count INTEGER NOT NULL,
    observation_count INTEGER NOT NULL DEFAULT 1,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    UNIQUE (entity_id, shape_signature)
);

CREATE TABLE IF NOT EXISTS hof_relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    callee_name TEXT NOT NULL,
    callee_arg_index INTEGER NOT NULL,
    observation_count INTEGER NOT NULL DEFAULT 1,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    UNIQUE (entity_id, callee_name, callee_arg_index)
);

CREATE INDEX IF NOT EXISTS idx_entities_filename_offset ON entities (filename, source_offset);
CREATE INDEX IF NOT EXISTS idx_values_entity ON value_observations (entity_id);
CREATE INDEX IF NOT EXISTS idx_values_type ON value_observations (value_type);
CREATE INDEX IF NOT EXISTS idx_values_hash ON value_observations (value_hash);
CREATE INDEX IF NOT EXISTS idx_strings_entity ON string_literals (entity_id);
CREATE INDEX IF NOT EXISTS idx_shapes_entity_signature ON object_shapes (entity_id, shape_signature);
"#;
