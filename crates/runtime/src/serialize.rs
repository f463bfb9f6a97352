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

//! Safe serialisation of runtime values into JSON surrogates.
//!
//! The serialiser never fails: primitives pass through, host objects become
//! tagged placeholder strings, revisited references become the circular
//! sentinel, and anything that cannot be represented becomes a
//! `[Serialization Error: ..]` string. Oversized composites are replaced by
//! a shallow structural descriptor instead of their full literal.

use serde_json::Value;
use typetrace_common::{CIRCULAR_SENTINEL, UNDEFINED_SENTINEL};

use crate::value::{HostObject, RuntimeValue};

/// Serialised-size cap beyond which a composite is replaced by a structural
/// descriptor.
pub const SERIALIZED_VALUE_CAP: usize = 4096;

/// Serialise a runtime value into its JSON surrogate.
pub fn to_surrogate(value: &RuntimeValue) -> Value {
    let mut visited: Vec<usize> = Vec::new();
    let surrogate = serialize(value, &mut visited);

    // An oversized literal still ships, but as a shallow summary of its
    // element kinds rather than the full text.
    if value.composite_id().is_some() {
        let size = surrogate.to_string().len();
        if size > SERIALIZED_VALUE_CAP {
            return descriptor(value);
        }
    }
    surrogate
}

fn serialize(value: &RuntimeValue, visited: &mut Vec<usize>) -> Value {
    match value {
        RuntimeValue::Undefined => Value::String(UNDEFINED_SENTINEL.to_string()),
        RuntimeValue::Null => Value::Null,
        RuntimeValue::Bool(b) => Value::Bool(*b),
        RuntimeValue::Number(n) => number_value(*n),
        RuntimeValue::Str(s) => Value::String(s.clone()),
        RuntimeValue::Date(iso) => Value::String(format!("[Date {iso}]")),
        RuntimeValue::Regexp(source) => Value::String(format!("[RegExp {source}]")),
        RuntimeValue::Function(name) => {
            let name = if name.is_empty() { "anonymous" } else { name };
            Value::String(format!("[Function {name}]"))
        }
        RuntimeValue::Host(host) => Value::String(host_placeholder(host)),
        RuntimeValue::Array(handle) => {
            let id = handle_id(handle);
            if visited.contains(&id) {
                return Value::String(CIRCULAR_SENTINEL.to_string());
            }
            visited.push(id);
            let result = match handle.try_borrow() {
                Ok(elements) => {
                    Value::Array(elements.iter().map(|e| serialize(e, visited)).collect())
                }
                Err(_) => Value::String("[Serialization Error: value in use]".to_string()),
            };
            visited.pop();
            result
        }
        RuntimeValue::Object(handle) => {
            let id = handle_id(handle);
            if visited.contains(&id) {
                return Value::String(CIRCULAR_SENTINEL.to_string());
            }
            visited.push(id);
            let result = match handle.try_borrow() {
                Ok(entries) => {
                    let mut map = serde_json::Map::new();
                    for (key, entry) in entries.iter() {
                        map.insert(key.clone(), serialize(entry, visited));
                    }
                    Value::Object(map)
                }
                Err(_) => Value::String("[Serialization Error: value in use]".to_string()),
            };
            visited.pop();
            result
        }
    }
}

fn handle_id<T>(handle: &std::rc::Rc<std::cell::RefCell<T>>) -> usize {
    std::rc::Rc::as_ptr(handle) as usize
}

/// Integral numbers ship as JSON integers so their literals read naturally.
fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number((n as i64).into())
    } else if let Some(number) = serde_json::Number::from_f64(n) {
        Value::Number(number)
    } else {
        Value::String("[Serialization Error: non-finite number]".to_string())
    }
}

fn host_placeholder(host: &HostObject) -> String {
    match host {
        HostObject::Element { tag } => format!("[HTMLElement<{}>]", tag.to_ascii_uppercase()),
        HostObject::Event { kind } => format!("[Event<{kind}>]"),
        HostObject::NodeList { len } => format!("[NodeList({len})]"),
    }
}

/// Shallow summary of an oversized composite's element kinds.
fn descriptor(value: &RuntimeValue) -> Value {
    match value {
        RuntimeValue::Array(handle) => {
            let summary = match handle.try_borrow() {
                Ok(elements) => {
                    let mut kinds: Vec<&str> = elements.iter().map(kind_name).collect();
                    kinds.dedup();
                    format!("[Array({}): {}]", elements.len(), kinds.join(","))
                }
                Err(_) => "[Array]".to_string(),
            };
            Value::String(summary)
        }
        RuntimeValue::Object(handle) => {
            let summary = match handle.try_borrow() {
                Ok(entries) => {
                    let keys: Vec<&str> =
                        entries.iter().take(10).map(|(k, _)| k.as_str()).collect();
                    format!("[Object({}): {}]", entries.len(), keys.join(","))
                }
                Err(_) => "[Object]".to_string(),
            };
            Value::String(summary)
        }
        other => serialize(other, &mut Vec::new()),
    }
}

fn kind_name(value: &RuntimeValue) -> &'static str {
    match value {
        RuntimeValue::Undefined => "undefined",
        RuntimeValue::Null => "null",
        RuntimeValue::Bool(_) => "boolean",
        RuntimeValue::Number(_) => "number",
        RuntimeValue::Str(_) => "string",
        RuntimeValue::Array(_) => "array",
        RuntimeValue::Object(_) => "object",
        RuntimeValue::Date(_) => "date",
        RuntimeValue::Regexp(_) => "regexp",
        RuntimeValue::Function(_) => "function",
        RuntimeValue::Host(_) => "host",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitives_pass_through() {
        assert_eq!(to_surrogate(&RuntimeValue::Null), json!(null));
        assert_eq!(to_surrogate(&RuntimeValue::Bool(true)), json!(true));
        assert_eq!(to_surrogate(&RuntimeValue::Number(1.0)), json!(1));
        assert_eq!(to_surrogate(&RuntimeValue::Number(2.5)), json!(2.5));
        assert_eq!(to_surrogate(&RuntimeValue::str("busy")), json!("busy"));
        assert_eq!(to_surrogate(&RuntimeValue::Undefined), json!("[undefined]"));
    }

    #[test]
    fn test_host_objects_become_tagged_placeholders() {
        let element = RuntimeValue::Host(HostObject::Element { tag: "div".into() });
        assert_eq!(to_surrogate(&element), json!("[HTMLElement<DIV>]"));

        let event = RuntimeValue::Host(HostObject::Event { kind: "click".into() });
        assert_eq!(to_surrogate(&event), json!("[Event<click>]"));

        let nodes = RuntimeValue::Host(HostObject::NodeList { len: 3 });
        assert_eq!(to_surrogate(&nodes), json!("[NodeList(3)]"));
    }

    #[test]
    fn test_cycles_become_sentinel() {
        let value = RuntimeValue::object(vec![("id".into(), RuntimeValue::str("a"))]);
        let RuntimeValue::Object(handle) = &value else { unreachable!() };
        handle.borrow_mut().push(("me".into(), value.clone()));

        let surrogate = to_surrogate(&value);
        assert_eq!(surrogate, json!({"id": "a", "me": "[Circular Reference]"}));
    }

    #[test]
    fn test_shared_but_acyclic_references_serialise_fully() {
        let shared = RuntimeValue::object(vec![("x".into(), RuntimeValue::Number(1.0))]);
        let value = RuntimeValue::array(vec![shared.clone(), shared]);
        let surrogate = to_surrogate(&value);
        assert_eq!(surrogate, json!([{"x": 1}, {"x": 1}]));
    }

    #[test]
    fn test_oversized_composite_becomes_descriptor() {
        let big = RuntimeValue::array(
            (0..2000).map(|i| RuntimeValue::str(format!("value-{i}"))).collect(),
        );
        let surrogate = to_surrogate(&big);
        let text = surrogate.as_str().expect("descriptor is a string");
        assert!(text.starts_with("[Array(2000):"));
        assert!(text.contains("string"));
    }

    #[test]
    fn test_functions_and_dates() {
        assert_eq!(
            to_surrogate(&RuntimeValue::Function(String::new())),
            json!("[Function anonymous]")
        );
        assert_eq!(
            to_surrogate(&RuntimeValue::Date("2024-05-01T00:00:00Z".into())),
            json!("[Date 2024-05-01T00:00:00Z]")
        );
        assert_eq!(to_surrogate(&RuntimeValue::Regexp("/a+/g".into())), json!("[RegExp /a+/g]"));
    }
}
