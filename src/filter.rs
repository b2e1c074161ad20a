//! In-Network Filter & Swap: streams `in_network.item` objects off the
//! event stream, applying the billing-code/arrangement early-skip before
//! an item finishes building, then resolving each rate's provider groups
//! (inline NPI-filtered, plus anything reached through
//! `provider_references`).
//!
//! The parser must already be positioned right after `in_network`'s
//! `start_array` event; [`next_item`] returns `Ok(None)` once it consumes
//! `in_network`'s `end_array`.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::builder::ObjectBuilder;
use crate::error::{FlattenError, FlattenResult};
use crate::event::{Event, Triple};
use crate::groups::{filter_groups_value, FilteredGroup};
use crate::navigator::ffwd;
use crate::reference::{resolve_rate_references, ReferenceMap};

/// A resolved rate: one `negotiated_prices` array plus its combined,
/// NPI-filtered provider groups (inline and reference-resolved).
pub struct ResolvedRate {
    pub prices: Vec<Map<String, Value>>,
    pub groups: Vec<FilteredGroup>,
}

/// A fully filtered and swapped in-network item, ready for row
/// materialization.
pub struct FilteredItem {
    pub fields: Map<String, Value>,
    pub rates: Vec<ResolvedRate>,
}

fn is_early_skip_worthy(item: &Map<String, Value>, code_filter: &Option<HashSet<(String, String)>>) -> bool {
    let code_type = item.get("billing_code_type").and_then(Value::as_str);
    let code = item.get("billing_code");
    if let (Some(code_type), Some(code), Some(filter)) = (code_type, code, code_filter) {
        let code_str = match code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !filter.contains(&(code_type.to_string(), code_str)) {
            return true;
        }
    }

    if let Some(arrangement) = item.get("negotiation_arrangement").and_then(Value::as_str) {
        if arrangement != "ffs" {
            return true;
        }
    }

    false
}

/// `None` once all three early-skip fields aren't known yet; checking
/// requires `billing_code`, `billing_code_type`, and
/// `negotiation_arrangement` to all be present on the partial item.
fn ready_for_early_skip_check(item: &Map<String, Value>) -> bool {
    item.contains_key("billing_code") && item.contains_key("billing_code_type") && item.contains_key("negotiation_arrangement")
}

fn resolve_rate(rate: &Map<String, Value>, npi_filter: &HashSet<String>, reference_map: &ReferenceMap) -> FlattenResult<Option<ResolvedRate>> {
    let mut groups = match rate.get("provider_groups") {
        Some(value) => filter_groups_value(value, npi_filter)?,
        None => Vec::new(),
    };
    groups.extend(resolve_rate_references(rate, reference_map));

    if groups.is_empty() {
        return Ok(None);
    }

    let prices = match rate.get("negotiated_prices") {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| match v {
                Value::Object(m) => Some(m.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(Some(ResolvedRate { prices, groups }))
}

/// Read the next in-network item off the stream, applying the early-skip
/// and rate resolution. Returns `Ok(None)` when `in_network`'s end has
/// been reached; an item whose rates all resolve to nothing is skipped
/// (the loop advances past it and tries the next one).
pub fn next_item<I>(
    parser: &mut I,
    code_filter: &Option<HashSet<(String, String)>>,
    npi_filter: &HashSet<String>,
    reference_map: &ReferenceMap,
) -> FlattenResult<Option<FilteredItem>>
where
    I: Iterator<Item = FlattenResult<Triple>>,
{
    loop {
        let mut builder = ObjectBuilder::new();
        let mut early_skip_checked = false;
        let mut reached_end_of_array = false;
        let mut skipped = false;
        let mut item: Option<Map<String, Value>> = None;

        while let Some(triple) = parser.next() {
            let triple: Triple = triple?;

            if triple.prefix == "in_network" && triple.event == Event::EndArray {
                reached_end_of_array = true;
                break;
            }

            builder.event(triple.event, triple.value);

            if !early_skip_checked {
                if let Some(current) = builder.current_object() {
                    if ready_for_early_skip_check(current) {
                        early_skip_checked = true;
                        if is_early_skip_worthy(current, code_filter) {
                            tracing::debug!("skipping in-network item: filtered out by code or arrangement");
                            builder.discard_top();
                            ffwd(parser, Some("in_network.item"), Some(Event::EndMap), None)?;
                            skipped = true;
                            break;
                        }
                    }
                }
            }

            if triple.prefix == "in_network.item" && triple.event == Event::EndMap {
                if let Some(Value::Object(map)) = builder.completed.pop() {
                    item = Some(map);
                }
                break;
            }
        }

        if reached_end_of_array {
            return Ok(None);
        }
        if skipped {
            continue;
        }

        let Some(fields) = item else {
            return Err(FlattenError::EndOfStream("in_network item".to_string()));
        };

        let rates = match fields.get("negotiated_rates") {
            Some(Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| match v {
                    Value::Object(m) => Some(m.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };

        let mut resolved = Vec::new();
        for rate in &rates {
            if let Some(r) = resolve_rate(rate, npi_filter, reference_map)? {
                resolved.push(r);
            }
        }

        if resolved.is_empty() {
            continue;
        }

        return Ok(Some(FilteredItem { fields, rates: resolved }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventReader;

    fn run(items_json: &str, code_filter: Option<HashSet<(String, String)>>, npi_filter: HashSet<String>) -> Vec<FilteredItem> {
        let json = format!(r#"{{"in_network": {items_json}}}"#);
        let mut reader = EventReader::new(json.as_bytes());
        reader.next(); // root start_map
        reader.next(); // "in_network" map_key
        reader.next(); // in_network's own start_array
        let reference_map = ReferenceMap::new();
        let mut items = Vec::new();
        while let Some(item) = next_item(&mut reader, &code_filter, &npi_filter, &reference_map).unwrap() {
            items.push(item);
        }
        items
    }

    fn sample_item(code: &str, arrangement: &str) -> String {
        format!(
            r#"{{"billing_code_type": "CPT", "billing_code": "{code}", "negotiation_arrangement": "{arrangement}",
                "negotiated_rates": [{{
                    "negotiated_prices": [{{"billing_class": "professional", "negotiated_type": "negotiated",
                        "expiration_date": "2026-01-01", "negotiated_rate": 100.0}}],
                    "provider_groups": [{{"npi": [1111111111], "tin": {{"type": "ein", "value": "1"}}}}]
                }}]}}"#
        )
    }

    #[test]
    fn keeps_ffs_items_matching_code_filter() {
        let json = format!("[{}]", sample_item("0001", "ffs"));
        let mut filter = HashSet::new();
        filter.insert(("CPT".to_string(), "0001".to_string()));
        let items = run(&json, Some(filter), HashSet::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].rates.len(), 1);
    }

    #[test]
    fn drops_items_not_matching_code_filter() {
        let json = format!("[{}]", sample_item("0001", "ffs"));
        let mut filter = HashSet::new();
        filter.insert(("CPT".to_string(), "9999".to_string()));
        let items = run(&json, Some(filter), HashSet::new());
        assert!(items.is_empty());
    }

    #[test]
    fn drops_non_ffs_arrangements() {
        let json = format!("[{}]", sample_item("0001", "capitation"));
        let items = run(&json, None, HashSet::new());
        assert!(items.is_empty());
    }

    #[test]
    fn a_rate_with_no_surviving_groups_drops_the_whole_item() {
        let json = format!("[{}]", sample_item("0001", "ffs"));
        let mut npi = HashSet::new();
        npi.insert("9999999999".to_string());
        let items = run(&json, None, npi);
        assert!(items.is_empty());
    }

    #[test]
    fn skip_and_keep_can_both_occur_in_the_same_array() {
        let json = format!("[{}, {}]", sample_item("0001", "capitation"), sample_item("0002", "ffs"));
        let items = run(&json, None, HashSet::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields.get("billing_code").unwrap().as_str().unwrap(), "0002");
    }
}
