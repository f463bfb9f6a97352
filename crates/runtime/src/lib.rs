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

//! TypeTrace in-process runtime library.
//!
//! The Rust counterpart of the injected browser runtime: hosts hand
//! observed values to [`record`] (and register composite origins through
//! [`track`]), and the library takes care of safe serialisation,
//! per-program-point deduplication, bounded buffering, and periodic batch
//! posting to the collector.
//!
//! The library is process-wide with lazy initialisation on the first
//! observation and no explicit teardown; buffered observations are lost on
//! process exit by design. [`reporter::drain`] and [`reporter::reset`] are
//! the test hooks.

pub mod reporter;
pub mod serialize;
pub mod value;

pub use reporter::{
    configure, drain, flush_now, record, reset, track, ReporterConfig, MAX_PENDING_VALUES,
};
pub use serialize::{to_surrogate, SERIALIZED_VALUE_CAP};
pub use value::{ArrayHandle, HostObject, ObjectHandle, RuntimeValue};
