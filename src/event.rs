//! Event-driven JSON parsing: turns a byte stream into `(prefix, event,
//! value)` triples, the same shape `ijson` gives the Python original this
//! crate is grounded on. `struson`'s `JsonStreamReader` is the black-box
//! pull tokenizer underneath; this module only tracks path bookkeeping.
//!
//! Path rules, matching `ijson`:
//! - the prefix of a `start_map`/`end_map`/`start_array`/`end_array`/
//!   `map_key` event is the container's *own* path;
//! - a scalar or child-container event nested in an object gets
//!   `parent.key` as its prefix;
//! - a scalar or child-container event nested in an array gets
//!   `parent.item` as its prefix (the literal segment `item`, not an
//!   index — arrays don't distinguish elements by position).

use std::io::Read;

use serde_json::{Number, Value};
use struson::reader::{JsonReader, JsonStreamReader, ValueType};

use crate::error::{FlattenError, FlattenResult};

/// The kind of JSON token a [`Triple`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StartMap,
    EndMap,
    StartArray,
    EndArray,
    MapKey,
    String,
    Number,
    Boolean,
    Null,
}

/// One token off the event stream: where it occurred (`prefix`), what kind
/// of token it was (`event`), and its scalar payload, if any (`value`).
#[derive(Debug, Clone)]
pub struct Triple {
    pub prefix: String,
    pub event: Event,
    pub value: Option<Value>,
}

enum Frame {
    Object { path: String, pending_key: Option<String> },
    Array { path: String },
}

impl Frame {
    fn own_path(&self) -> &str {
        match self {
            Frame::Object { path, .. } => path,
            Frame::Array { path } => path,
        }
    }
}

fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}

/// Adapts a `struson` reader over any `Read` source into an iterator of
/// `(prefix, event, value)` triples covering a single top-level JSON value.
pub struct EventReader<R: Read> {
    reader: JsonStreamReader<R>,
    stack: Vec<Frame>,
    root_done: bool,
    finished: bool,
}

impl<R: Read> EventReader<R> {
    pub fn new(reader: R) -> Self {
        EventReader {
            reader: JsonStreamReader::new(reader),
            stack: Vec::new(),
            root_done: false,
            finished: false,
        }
    }

    fn emit_value_at(&mut self, path: String) -> FlattenResult<Option<Triple>> {
        match self.reader.peek()? {
            ValueType::Object => {
                self.reader.begin_object()?;
                self.stack.push(Frame::Object { path: path.clone(), pending_key: None });
                Ok(Some(Triple { prefix: path, event: Event::StartMap, value: None }))
            }
            ValueType::Array => {
                self.reader.begin_array()?;
                self.stack.push(Frame::Array { path: path.clone() });
                Ok(Some(Triple { prefix: path, event: Event::StartArray, value: None }))
            }
            ValueType::String => {
                let s = self.reader.next_string()?;
                Ok(Some(Triple { prefix: path, event: Event::String, value: Some(Value::String(s)) }))
            }
            ValueType::Number => {
                let raw = self.reader.next_number_as_string()?;
                // Keep integers as integers (NPIs, provider_group_id, ...)
                // rather than routing every number through f64, which would
                // lose precision and trip up strict integer deserialization.
                let value = if let Ok(i) = raw.parse::<i64>() {
                    Value::Number(Number::from(i))
                } else {
                    let n: f64 = raw
                        .parse()
                        .map_err(|_| FlattenError::InvalidMrf(format!("not a finite number: {raw}")))?;
                    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
                };
                Ok(Some(Triple { prefix: path, event: Event::Number, value: Some(value) }))
            }
            ValueType::Boolean => {
                let b = self.reader.next_bool()?;
                Ok(Some(Triple { prefix: path, event: Event::Boolean, value: Some(Value::Bool(b)) }))
            }
            ValueType::Null => {
                self.reader.next_null()?;
                Ok(Some(Triple { prefix: path, event: Event::Null, value: None }))
            }
        }
    }

    fn next_triple(&mut self) -> FlattenResult<Option<Triple>> {
        if self.finished {
            return Ok(None);
        }

        let Some(top) = self.stack.last() else {
            if self.root_done {
                self.finished = true;
                return Ok(None);
            }
            self.root_done = true;
            return self.emit_value_at(String::new());
        };

        match top {
            Frame::Array { path } => {
                if self.reader.has_next()? {
                    let child_path = join(path, "item");
                    self.emit_value_at(child_path)
                } else {
                    self.reader.end_array()?;
                    let Some(Frame::Array { path }) = self.stack.pop() else { unreachable!() };
                    Ok(Some(Triple { prefix: path, event: Event::EndArray, value: None }))
                }
            }
            Frame::Object { .. } => {
                let pending = match self.stack.last_mut() {
                    Some(Frame::Object { pending_key, .. }) => pending_key.take(),
                    _ => unreachable!(),
                };
                if let Some(key) = pending {
                    let own_path = self.stack.last().unwrap().own_path().to_string();
                    self.emit_value_at(join(&own_path, &key))
                } else if self.reader.has_next()? {
                    let name = self.reader.next_name_owned()?;
                    let own_path = self.stack.last().unwrap().own_path().to_string();
                    if let Some(Frame::Object { pending_key, .. }) = self.stack.last_mut() {
                        *pending_key = Some(name.clone());
                    }
                    Ok(Some(Triple { prefix: own_path, event: Event::MapKey, value: Some(Value::String(name)) }))
                } else {
                    self.reader.end_object()?;
                    let Some(Frame::Object { path, .. }) = self.stack.pop() else { unreachable!() };
                    Ok(Some(Triple { prefix: path, event: Event::EndMap, value: None }))
                }
            }
        }
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = FlattenResult<Triple>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_triple() {
            Ok(Some(triple)) => Some(Ok(triple)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
