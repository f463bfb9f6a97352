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

//! TypeTrace collector.
//!
//! Consumes observation batches posted by instrumented programs, upserts
//! them transactionally into a SQLite store, and exposes the analytical
//! query surface over it: stats, entities, calls, locations, enum
//! candidates, object shapes, annotation recommendations and a bounded
//! ad-hoc query channel.

pub mod error;
pub mod query;
pub mod server;
pub mod store;

pub use error::CollectorError;
pub use server::{parse_batch, router, CollectorServer, CollectorServerHandle};
pub use store::{IngestSummary, Store};
