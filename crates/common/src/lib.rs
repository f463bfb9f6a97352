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

//! TypeTrace common - shared wire format, value classification and logging
//!
//! This crate holds everything the instrumenter, the in-process runtime and
//! the collector have to agree on: the batch wire format posted to the
//! collector, the surrogate protocol used to ship runtime values as JSON,
//! value classification and the derived fingerprints (content hashes, shape
//! signatures, enum-candidate filtering), plus the environment variable
//! names and logging bootstrap used by every binary.

pub mod env;
pub mod logging;
pub mod types;

pub use types::batch::{BatchRecord, ObservationMetadata, ParameterKind, Provenance, ValueEntry, Visibility};
pub use types::value::{
    classify, is_enum_candidate, render_literal, shape_signature, value_hash, ValueType,
    ARRAY_LITERAL_CAP, CIRCULAR_SENTINEL, OBJECT_LITERAL_CAP, SHAPE_MAX_KEYS, SHAPE_MIN_KEYS,
    UNDEFINED_SENTINEL,
};
