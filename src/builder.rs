//! Object Builder: reconstructs JSON values from a stream of [`Event`]s.
//!
//! Unlike `ijson`'s `ObjectBuilder`, which links a container into its
//! parent the moment it opens (relying on Python's shared mutable
//! references so callers can peek a still-open object), this builder keeps
//! each open container independent on a stack and only wires it into its
//! parent once it closes. A caller that wants to inspect an in-progress
//! object — the early-skip check in the filter — reads
//! [`ObjectBuilder::current_object`], which is exactly the top of the
//! stack while it's still open. Discarding that object early
//! ([`ObjectBuilder::discard_top`]) is then a plain stack pop, with nothing
//! to unlink from a parent because nothing was ever linked prematurely.

use serde_json::{Map, Value};

use crate::event::Event;

enum Container {
    Object(Map<String, Value>, Option<String>),
    Array(Vec<Value>),
}

/// Incrementally reconstructs JSON values from `(event, value)` pairs.
/// Values that close back down to an empty container stack are pushed
/// onto [`completed`](Self::completed).
#[derive(Default)]
pub struct ObjectBuilder {
    containers: Vec<Container>,
    pub completed: Vec<Value>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        ObjectBuilder::default()
    }

    /// Feed one event into the builder.
    pub fn event(&mut self, event: Event, value: Option<Value>) {
        match event {
            Event::StartMap => self.containers.push(Container::Object(Map::new(), None)),
            Event::StartArray => self.containers.push(Container::Array(Vec::new())),
            Event::MapKey => {
                let key = match value {
                    Some(Value::String(s)) => s,
                    _ => return,
                };
                if let Some(Container::Object(_, pending)) = self.containers.last_mut() {
                    *pending = Some(key);
                }
            }
            Event::EndMap => {
                if let Some(Container::Object(map, _)) = self.containers.pop() {
                    self.insert(Value::Object(map));
                }
            }
            Event::EndArray => {
                if let Some(Container::Array(items)) = self.containers.pop() {
                    self.insert(Value::Array(items));
                }
            }
            Event::String | Event::Number | Event::Boolean => {
                self.insert(value.unwrap_or(Value::Null));
            }
            Event::Null => self.insert(Value::Null),
        }
    }

    fn insert(&mut self, value: Value) {
        match self.containers.last_mut() {
            Some(Container::Object(map, pending)) => {
                if let Some(key) = pending.take() {
                    map.insert(key, value);
                }
            }
            Some(Container::Array(items)) => items.push(value),
            None => self.completed.push(value),
        }
    }

    /// The object currently open at the top of the stack, if any — used to
    /// inspect an in-progress item's fields before it's finished.
    pub fn current_object(&self) -> Option<&Map<String, Value>> {
        match self.containers.last() {
            Some(Container::Object(map, _)) => Some(map),
            _ => None,
        }
    }

    /// Drop the container currently open at the top of the stack without
    /// linking it anywhere, releasing everything built up under it.
    pub fn discard_top(&mut self) {
        self.containers.pop();
    }
}
