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

//! Collector error taxonomy and its HTTP mapping.
//!
//! Client faults (malformed batches, missing parameters) answer 400;
//! storage and query failures answer 500. Recovery is per-request: a failed
//! batch is dropped whole, a failed query has no side effects.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Failures surfaced by ingest and query handling.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// The ingest body is not a JSON array or a record does not match the
    /// tuple/object shape. The batch is dropped.
    #[error("malformed batch: {0}")]
    BatchMalformed(String),

    /// A required query parameter is absent.
    #[error("missing required parameter: {0}")]
    ParameterMissing(&'static str),

    /// An ad-hoc query failed to prepare or execute, including rejection of
    /// multi-statement input.
    #[error("query failed: {0}")]
    QueryInvalid(String),

    /// The store rejected a read or write; the enclosing batch transaction
    /// is rolled back.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl CollectorError {
    /// HTTP status for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BatchMalformed(_) | Self::ParameterMissing(_) => StatusCode::BAD_REQUEST,
            Self::QueryInvalid(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CollectorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(target: "collector", "request failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(CollectorError::BatchMalformed("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(CollectorError::ParameterMissing("filename").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            CollectorError::QueryInvalid("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            CollectorError::Storage(rusqlite::Error::InvalidQuery).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
