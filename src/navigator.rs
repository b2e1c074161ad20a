//! Stream Navigator: fast-forwards an event stream to the first triple
//! matching a partial `(prefix, event, value)` pattern, ignoring everything
//! before it. Any field left as `None` is a wildcard.
//!
//! Running off the end of the stream without a match is `EndOfStream`. Most
//! callers treat that as fatal, but the reference-map's structural case
//! analysis (§4.4) catches it deliberately to tell "provider_references
//! comes after in_network" apart from "there is no provider_references at
//! all".

use crate::error::{FlattenError, FlattenResult};
use crate::event::{Event, Triple};

/// Advance `parser` until a triple matches `to_prefix`/`to_event`/`to_value`
/// (each `None` matches anything), then return. Leaves the stream
/// positioned immediately after the matching triple.
pub fn ffwd<I>(
    parser: &mut I,
    to_prefix: Option<&str>,
    to_event: Option<Event>,
    to_value: Option<&str>,
) -> FlattenResult<()>
where
    I: Iterator<Item = FlattenResult<Triple>>,
{
    for triple in parser {
        let triple = triple?;
        let prefix_matches = to_prefix.is_none_or(|p| triple.prefix == p);
        let event_matches = to_event.is_none_or(|e| triple.event == e);
        let value_matches = to_value.is_none_or(|v| {
            triple.value.as_ref().and_then(|val| val.as_str()) == Some(v)
        });
        if prefix_matches && event_matches && value_matches {
            return Ok(());
        }
    }
    Err(FlattenError::EndOfStream(describe(to_prefix, to_event, to_value)))
}

fn describe(prefix: Option<&str>, event: Option<Event>, value: Option<&str>) -> String {
    format!("prefix={prefix:?} event={event:?} value={value:?}")
}

/// Consume exactly one JSON value off `parser` (scalar, or a whole nested
/// container), discarding it without building anything. Used to step over
/// header fields this crate doesn't care about.
pub fn skip_value<I>(parser: &mut I) -> FlattenResult<()>
where
    I: Iterator<Item = FlattenResult<Triple>>,
{
    let first = parser
        .next()
        .ok_or_else(|| FlattenError::EndOfStream("value to skip".to_string()))??;
    let mut depth = match first.event {
        Event::StartMap | Event::StartArray => 1i32,
        _ => 0,
    };
    while depth > 0 {
        let triple = parser
            .next()
            .ok_or_else(|| FlattenError::EndOfStream("end of skipped value".to_string()))??;
        match triple.event {
            Event::StartMap | Event::StartArray => depth += 1,
            Event::EndMap | Event::EndArray => depth -= 1,
            _ => {}
        }
    }
    Ok(())
}
