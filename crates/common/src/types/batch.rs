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

//! Wire format of observation batches posted to the collector.
//!
//! A batch is a JSON array of records. Each record is either the positional
//! 4-tuple `[filename, offset, values, metadata]` or an equivalent keyed
//! object; the collector accepts both. `values` is an ordered sequence of
//! `[value, provenance_or_null]` pairs where the value is already in the
//! surrogate form produced by the runtime serialiser.

use serde::{Deserialize, Serialize};

/// One record of a batch: every observation made at a single instrumented
/// program point since the previous flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchRecord {
    /// Positional tuple form: `[filename, offset, values, metadata]`.
    Positional(String, u64, Vec<ValueEntry>, ObservationMetadata),
    /// Keyed object form with the same fields.
    Keyed {
        /// Logical filename of the instrumented source
        filename: String,
        /// Byte offset of the instrumented program point
        offset: u64,
        /// Distinct serialised values observed at this point
        values: Vec<ValueEntry>,
        /// Static metadata captured at instrumentation time
        #[serde(default)]
        metadata: ObservationMetadata,
    },
}

impl BatchRecord {
    /// Decompose the record into its fields, whichever wire shape it used.
    pub fn into_parts(self) -> (String, u64, Vec<ValueEntry>, ObservationMetadata) {
        match self {
            Self::Positional(filename, offset, values, metadata) => {
                (filename, offset, values, metadata)
            }
            Self::Keyed { filename, offset, values, metadata } => {
                (filename, offset, values, metadata)
            }
        }
    }
}

/// A `[value, provenance_or_null]` pair.
///
/// The value is a surrogate (see [`crate::types::value`]); the provenance, if
/// present, names the program point at which the value was first constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueEntry(pub serde_json::Value, pub Option<Provenance>);

/// Origin of a tracked composite value: `[filename, offset]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance(pub String, pub u64);

/// Static metadata attached to a record by the instrumenter.
///
/// All fields are optional; unknown keys on the wire are ignored. `null` is
/// treated by the collector as "leave prior value intact".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservationMetadata {
    /// Name of the enclosing function, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Declared parameter name (or a synthetic `destructured_*` name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    /// Zero-based position of the parameter in the formal parameter list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_index: Option<u32>,
    /// Whether the dialect annotates a type on the parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<ParameterKind>,
    /// Whether the parameter declares a default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_default: Option<bool>,
    /// Whether the parameter is a destructuring pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_destructured: Option<bool>,
    /// Whether the parameter is a rest element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_rest: Option<bool>,
    /// Declared visibility of a typed constructor parameter-property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Visibility>,
    /// Entity context tag (e.g. `function_declaration_parameter`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 1-based line of the anchor node in the original source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    /// 0-based column of the anchor node in the original source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    /// Resolved callee path for callback-argument parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_name: Option<String>,
    /// Zero-based argument index of the callback in its call expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_arg_index: Option<u32>,
}

/// Whether a parameter carries a dialect type annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Plain, unannotated parameter
    Untyped,
    /// Parameter with an explicit type annotation
    Annotated,
}

/// Declared visibility of a constructor parameter-property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// `public` modifier
    Public,
    /// `private` modifier
    Private,
    /// `protected` modifier
    Protected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_record_round_trip() {
        let wire = json!([
            "src/app.ts",
            120,
            [[1, null], ["busy", ["src/app.ts", 44]]],
            { "functionName": "setStatus", "parameterIndex": 0 }
        ]);

        let record: BatchRecord = serde_json::from_value(wire).unwrap();
        let (filename, offset, values, metadata) = record.into_parts();
        assert_eq!(filename, "src/app.ts");
        assert_eq!(offset, 120);
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].1, Some(Provenance("src/app.ts".into(), 44)));
        assert_eq!(metadata.function_name.as_deref(), Some("setStatus"));
        assert_eq!(metadata.parameter_index, Some(0));
    }

    #[test]
    fn test_keyed_record_accepted() {
        let wire = json!({
            "filename": "lib/util.js",
            "offset": 7,
            "values": [[true, null]],
            "metadata": { "context": "arrow_function_parameter" }
        });

        let record: BatchRecord = serde_json::from_value(wire).unwrap();
        let (filename, offset, values, metadata) = record.into_parts();
        assert_eq!(filename, "lib/util.js");
        assert_eq!(offset, 7);
        assert_eq!(values.len(), 1);
        assert_eq!(metadata.context.as_deref(), Some("arrow_function_parameter"));
    }

    #[test]
    fn test_unknown_metadata_keys_are_ignored() {
        let wire = json!([
            "a.ts",
            0,
            [],
            { "functionName": "f", "somethingNew": {"nested": true} }
        ]);

        let record: BatchRecord = serde_json::from_value(wire).unwrap();
        let (_, _, _, metadata) = record.into_parts();
        assert_eq!(metadata.function_name.as_deref(), Some("f"));
    }

    #[test]
    fn test_metadata_serializes_camel_case_without_nulls() {
        let metadata = ObservationMetadata {
            parameter_name: Some("todo".into()),
            parameter_index: Some(1),
            parameter_type: Some(ParameterKind::Annotated),
            accessibility: Some(Visibility::Private),
            ..Default::default()
        };

        let wire = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            wire,
            json!({
                "parameterName": "todo",
                "parameterIndex": 1,
                "parameterType": "annotated",
                "accessibility": "private"
            })
        );
    }
}
