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

//! Dynamic value model of the host program.
//!
//! Observed values arrive as [`RuntimeValue`]s: a loosely-typed graph in
//! which composites are shared handles, so the same object can legitimately
//! appear in several places - including inside itself. Host objects are
//! represented by the capability their probe established, never by the raw
//! host handle.

use std::{cell::RefCell, rc::Rc};

/// Shared handle to an array's elements.
pub type ArrayHandle = Rc<RefCell<Vec<RuntimeValue>>>;
/// Shared handle to an object's ordered key/value entries.
pub type ObjectHandle = Rc<RefCell<Vec<(String, RuntimeValue)>>>;

/// A runtime value observed at an instrumented program point.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    /// The absent value
    Undefined,
    /// The null value
    Null,
    /// A boolean
    Bool(bool),
    /// A number (host numbers are floating point)
    Number(f64),
    /// A string
    Str(String),
    /// A shared array
    Array(ArrayHandle),
    /// A shared object with ordered entries
    Object(ObjectHandle),
    /// A date, carried as RFC 3339 text
    Date(String),
    /// A regular expression, carried as its source text
    Regexp(String),
    /// A function, carried as its name (empty when anonymous)
    Function(String),
    /// A host object, reduced to its probed capability
    Host(HostObject),
}

/// Host-object kinds recognised by capability probing.
///
/// Hosts without such objects (server runtimes) simply never construct
/// these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostObject {
    /// DOM-element-like: has a tag name
    Element {
        /// Upper-cased tag name, e.g. `DIV`
        tag: String,
    },
    /// Event-like: has an event type
    Event {
        /// Event type, e.g. `click`
        kind: String,
    },
    /// Node-list-like: has a length
    NodeList {
        /// Number of nodes
        len: usize,
    },
}

impl RuntimeValue {
    /// Build a string value.
    pub fn str(text: impl Into<String>) -> Self {
        Self::Str(text.into())
    }

    /// Build a shared object from ordered entries.
    pub fn object(entries: Vec<(String, RuntimeValue)>) -> Self {
        Self::Object(Rc::new(RefCell::new(entries)))
    }

    /// Build a shared array from elements.
    pub fn array(elements: Vec<RuntimeValue>) -> Self {
        Self::Array(Rc::new(RefCell::new(elements)))
    }

    /// Identity of the underlying shared allocation, for composites.
    pub fn composite_id(&self) -> Option<usize> {
        match self {
            Self::Array(handle) => Some(Rc::as_ptr(handle) as usize),
            Self::Object(handle) => Some(Rc::as_ptr(handle) as usize),
            _ => None,
        }
    }

    /// Convert plain JSON into a value graph (necessarily acyclic).
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Self::array(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::object(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_identity_is_shared() {
        let value = RuntimeValue::object(vec![("a".into(), RuntimeValue::Number(1.0))]);
        let alias = value.clone();
        assert_eq!(value.composite_id(), alias.composite_id());
        assert!(value.composite_id().is_some());
        assert!(RuntimeValue::Null.composite_id().is_none());
    }

    #[test]
    fn test_from_json_round_trip_shape() {
        let json = serde_json::json!({"id": "a", "tags": [1, 2]});
        let value = RuntimeValue::from_json(&json);
        let RuntimeValue::Object(handle) = &value else { panic!("expected object") };
        assert_eq!(handle.borrow().len(), 2);
    }
}
