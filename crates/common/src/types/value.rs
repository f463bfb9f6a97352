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

//! Surrogate value classification and derived fingerprints.
//!
//! Runtime values never reach the store raw. The runtime serialiser turns
//! them into JSON *surrogates*: primitives pass through, host objects and
//! non-JSON kinds (dates, regexps, functions) become bracketed sentinel
//! strings, cycles become `[Circular Reference]`. This module is the reader
//! side of that protocol: it classifies a surrogate back into a value type,
//! renders the capped literal stored in the database, and computes the
//! fingerprints used for deduplication and shape analysis.

use std::fmt;

use serde_json::Value;

/// Byte cap applied to the stored JSON literal of object values.
pub const OBJECT_LITERAL_CAP: usize = 1000;
/// Element cap applied to the stored JSON literal of array values.
pub const ARRAY_LITERAL_CAP: usize = 10;
/// Minimum number of own keys for an object to produce a shape record.
pub const SHAPE_MIN_KEYS: usize = 1;
/// Maximum number of own keys for an object to produce a shape record.
pub const SHAPE_MAX_KEYS: usize = 20;
/// Maximum length of an enum-candidate string.
pub const ENUM_MAX_LEN: usize = 50;
/// Maximum number of whitespace-separated tokens in an enum-candidate string.
pub const ENUM_MAX_TOKENS: usize = 3;

/// Sentinel shipped for `undefined` (JSON has no way to express it).
pub const UNDEFINED_SENTINEL: &str = "[undefined]";
/// Sentinel shipped for a reference revisited during serialisation.
pub const CIRCULAR_SENTINEL: &str = "[Circular Reference]";

/// The type a surrogate value is classified as.
///
/// Mirrors the `value_type` column of value observations. Host kinds carry
/// their derived tag (e.g. `HTMLElement<DIV>`) verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// JSON string that is not a sentinel
    String,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON null
    Null,
    /// The `[undefined]` sentinel
    Undefined,
    /// JSON array
    Array,
    /// JSON object
    Object,
    /// A `[Date ..]` sentinel
    Date,
    /// A `[RegExp ..]` sentinel
    Regexp,
    /// A `[Function ..]` sentinel
    Function,
    /// A host-object tag such as `HTMLElement<DIV>`
    Host(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Array => "array",
            Self::Object => "object",
            Self::Date => "date",
            Self::Regexp => "regexp",
            Self::Function => "function",
            Self::Host(tag) => tag,
        };
        write!(f, "{name}")
    }
}

/// Classify a surrogate into its observed value type.
pub fn classify(surrogate: &Value) -> ValueType {
    match surrogate {
        Value::Null => ValueType::Null,
        Value::Bool(_) => ValueType::Boolean,
        Value::Number(_) => ValueType::Number,
        Value::Array(_) => ValueType::Array,
        Value::Object(_) => ValueType::Object,
        Value::String(s) => classify_string(s),
    }
}

fn classify_string(s: &str) -> ValueType {
    if s == UNDEFINED_SENTINEL {
        return ValueType::Undefined;
    }
    if s.starts_with("[Date ") && s.ends_with(']') {
        return ValueType::Date;
    }
    if s.starts_with("[RegExp ") && s.ends_with(']') {
        return ValueType::Regexp;
    }
    if (s.starts_with("[Function ") || s == "[Function]") && s.ends_with(']') {
        return ValueType::Function;
    }
    if let Some(tag) = host_tag(s) {
        return ValueType::Host(tag);
    }
    // Circular and serialisation-error sentinels deliberately fall through:
    // they are stored as plain strings.
    ValueType::String
}

/// Extract the host tag from a host-object sentinel, if the string is one.
fn host_tag(s: &str) -> Option<String> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    if inner.starts_with("HTMLElement<") && inner.ends_with('>') {
        return Some(inner.to_string());
    }
    if inner.starts_with("Event<") && inner.ends_with('>') {
        return Some(inner.to_string());
    }
    if inner.starts_with("NodeList(") && inner.ends_with(')') {
        return Some("NodeList".to_string());
    }
    None
}

/// Render the capped literal stored for a surrogate.
///
/// Strings are stored raw; arrays keep at most [`ARRAY_LITERAL_CAP`]
/// elements; the JSON of objects is truncated to [`OBJECT_LITERAL_CAP`]
/// bytes. Everything else is its JSON text.
pub fn render_literal(surrogate: &Value) -> String {
    match surrogate {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let capped: Vec<&Value> = items.iter().take(ARRAY_LITERAL_CAP).collect();
            serde_json::to_string(&capped).unwrap_or_else(|_| "[]".to_string())
        }
        Value::Object(_) => {
            let text = serde_json::to_string(surrogate).unwrap_or_else(|_| "{}".to_string());
            truncate_to_boundary(text, OBJECT_LITERAL_CAP)
        }
        other => other.to_string(),
    }
}

/// Truncate `text` to at most `cap` bytes without splitting a character.
fn truncate_to_boundary(mut text: String, cap: usize) -> String {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}

/// Content hash of a literal: first 8 hex characters of its MD5 digest.
pub fn value_hash(literal: &str) -> String {
    let digest = md5::compute(literal.as_bytes());
    format!("{digest:x}")[..8].to_string()
}

/// Whether a string observation is plausibly enum-like.
///
/// Short (1-50 bytes), at most 3 whitespace-separated tokens, no path or URL
/// markers, not purely numeric.
pub fn is_enum_candidate(s: &str) -> bool {
    if s.is_empty() || s.len() > ENUM_MAX_LEN {
        return false;
    }
    if s.split_whitespace().count() > ENUM_MAX_TOKENS {
        return false;
    }
    if s.contains('/') || s.contains('\\') || s.contains("http") {
        return false;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    true
}

/// Canonical shape signature of an object surrogate.
///
/// Keys sorted lexicographically, each annotated with the classified type of
/// its value, joined by commas: `completed:boolean,description:string`.
/// Returns `None` when the key count is outside the shape filter.
pub fn shape_signature(object: &serde_json::Map<String, Value>) -> Option<String> {
    let key_count = object.len();
    if !(SHAPE_MIN_KEYS..=SHAPE_MAX_KEYS).contains(&key_count) {
        return None;
    }

    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();

    let signature = keys
        .into_iter()
        .map(|key| format!("{key}:{}", classify(&object[key])))
        .collect::<Vec<_>>()
        .join(",");
    Some(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_primitives() {
        assert_eq!(classify(&json!(null)), ValueType::Null);
        assert_eq!(classify(&json!(true)), ValueType::Boolean);
        assert_eq!(classify(&json!(42)), ValueType::Number);
        assert_eq!(classify(&json!("success")), ValueType::String);
        assert_eq!(classify(&json!([1, 2])), ValueType::Array);
        assert_eq!(classify(&json!({"a": 1})), ValueType::Object);
    }

    #[test]
    fn test_classify_sentinels() {
        assert_eq!(classify(&json!("[undefined]")), ValueType::Undefined);
        assert_eq!(classify(&json!("[Date 2024-05-01T00:00:00Z]")), ValueType::Date);
        assert_eq!(classify(&json!("[RegExp /a+/g]")), ValueType::Regexp);
        assert_eq!(classify(&json!("[Function handler]")), ValueType::Function);
        assert_eq!(
            classify(&json!("[HTMLElement<DIV>]")),
            ValueType::Host("HTMLElement<DIV>".into())
        );
        assert_eq!(classify(&json!("[Event<click>]")), ValueType::Host("Event<click>".into()));
        assert_eq!(classify(&json!("[NodeList(4)]")), ValueType::Host("NodeList".into()));
        // Circular and error sentinels remain strings
        assert_eq!(classify(&json!("[Circular Reference]")), ValueType::String);
        assert_eq!(classify(&json!("[Serialization Error: boom]")), ValueType::String);
    }

    #[test]
    fn test_render_literal_caps_arrays() {
        let surrogate = json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        let literal = render_literal(&surrogate);
        assert_eq!(literal, "[0,1,2,3,4,5,6,7,8,9]");
    }

    #[test]
    fn test_render_literal_caps_objects() {
        let long = "x".repeat(3000);
        let surrogate = json!({ "blob": long });
        let literal = render_literal(&surrogate);
        assert!(literal.len() <= OBJECT_LITERAL_CAP);
    }

    #[test]
    fn test_render_literal_numbers_match_json() {
        assert_eq!(render_literal(&json!(1)), "1");
        assert_eq!(render_literal(&json!(2.5)), "2.5");
    }

    #[test]
    fn test_value_hash_is_stable_prefix() {
        let hash = value_hash("1");
        assert_eq!(hash.len(), 8);
        assert_eq!(hash, value_hash("1"));
        assert_ne!(hash, value_hash("2"));
    }

    #[test]
    fn test_enum_candidate_filter() {
        assert!(is_enum_candidate("success"));
        assert!(is_enum_candidate("in progress"));
        assert!(is_enum_candidate("a"));

        assert!(!is_enum_candidate(""));
        assert!(!is_enum_candidate(&"x".repeat(51)));
        assert!(!is_enum_candidate("one two three four"));
        assert!(!is_enum_candidate("a/b"));
        assert!(!is_enum_candidate("C:\\path"));
        assert!(!is_enum_candidate("http://example.com"));
        assert!(!is_enum_candidate("12345"));
    }

    #[test]
    fn test_shape_signature_sorts_keys() {
        let a = json!({"id": "a", "done": false});
        let b = json!({"done": true, "id": "b"});
        let sig_a = shape_signature(a.as_object().unwrap()).unwrap();
        let sig_b = shape_signature(b.as_object().unwrap()).unwrap();
        assert_eq!(sig_a, "done:boolean,id:string");
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn test_shape_signature_respects_key_bounds() {
        let empty = json!({});
        assert!(shape_signature(empty.as_object().unwrap()).is_none());

        let mut big = serde_json::Map::new();
        for i in 0..21 {
            big.insert(format!("k{i}"), json!(i));
        }
        assert!(shape_signature(&big).is_none());
    }
}
