//! Reference Resolver: builds the `provider_group_id -> [ProviderGroup]`
//! map used to swap `provider_references` entries in `negotiated_rates`
//! for the provider groups they stand for.
//!
//! Inline references (`{provider_group_id, provider_groups}`) are filtered
//! synchronously as they're read off `provider_references`. Remote
//! references (`{provider_group_id, location}`) are handed to a bounded
//! pool of `tokio` tasks pulling off a shared queue, mirroring the 300
//! concurrent workers the Python original spins up over an
//! `asyncio.Queue`. A worker that gets a non-2xx response or a transport
//! error drops that reference silently (logged at debug) rather than
//! failing the whole run — a malformed or temporarily-unreachable
//! provider-reference file shouldn't sink an otherwise-good MRF.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::builder::ObjectBuilder;
use crate::error::{FlattenError, FlattenResult};
use crate::event::{Event, Triple};
use crate::groups::{filter_group, FilteredGroup};
use crate::types::ProviderGroup;

/// `provider_group_id -> filtered provider groups`, built once per MRF.
pub type ReferenceMap = HashMap<i64, Vec<FilteredGroup>>;

struct RemoteWork {
    group_id: i64,
    url: String,
}

/// Drain the `provider_references` array (the parser must already be
/// positioned right after its `start_array`), synchronously filtering
/// inline groups and queuing remote ones for the worker pool. Returns once
/// `provider_references`'s `end_array` is consumed.
fn collect_references<I>(
    parser: &mut I,
    npi_filter: &HashSet<String>,
    map: &mut ReferenceMap,
) -> FlattenResult<Vec<RemoteWork>>
where
    I: Iterator<Item = FlattenResult<Triple>>,
{
    let mut builder = ObjectBuilder::new();
    let mut remote = Vec::new();

    for triple in parser {
        let triple = triple?;
        builder.event(triple.event, triple.value);

        if triple.prefix == "provider_references.item" && triple.event == Event::EndMap {
            let Some(Value::Object(reference)) = builder.completed.pop() else {
                continue;
            };
            let Some(group_id) = reference.get("provider_group_id").and_then(Value::as_f64) else {
                continue;
            };
            let group_id = group_id as i64;

            if let Some(Value::String(url)) = reference.get("location") {
                remote.push(RemoteWork { group_id, url: url.clone() });
            } else if let Some(groups) = reference.get("provider_groups") {
                let raw: Vec<ProviderGroup> = serde_json::from_value(groups.clone())?;
                let filtered: Vec<FilteredGroup> =
                    raw.iter().filter_map(|g| filter_group(g, npi_filter)).collect();
                if !filtered.is_empty() {
                    map.insert(group_id, filtered);
                }
            }
        } else if triple.prefix == "provider_references" && triple.event == Event::EndArray {
            return Ok(remote);
        }
    }

    Err(FlattenError::EndOfStream("provider_references end_array".to_string()))
}

/// Fetch and filter the remaining `location`-based references through a
/// bounded pool of concurrent workers.
async fn fetch_remote(
    client: reqwest::Client,
    work: Vec<RemoteWork>,
    npi_filter: HashSet<String>,
    concurrency: usize,
    map: &mut ReferenceMap,
) -> FlattenResult<()> {
    if work.is_empty() {
        return Ok(());
    }

    let (tx, rx) = tokio::sync::mpsc::channel::<RemoteWork>(concurrency.max(1));
    let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));
    let results = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::<(i64, Vec<FilteredGroup>)>::new()));

    let mut workers = tokio::task::JoinSet::new();
    for _ in 0..concurrency.min(work.len()).max(1) {
        let rx = rx.clone();
        let results = results.clone();
        let client = client.clone();
        let npi_filter = npi_filter.clone();
        workers.spawn(async move {
            loop {
                let item = { rx.lock().await.recv().await };
                let Some(item) = item else { break };
                match client.get(&item.url).send().await {
                    Ok(response) if response.status().is_success() => match response.json::<crate::types::ProviderReferenceFile>().await {
                        Ok(body) => {
                            let filtered: Vec<FilteredGroup> = body
                                .provider_groups
                                .iter()
                                .filter_map(|g| filter_group(g, &npi_filter))
                                .collect();
                            if !filtered.is_empty() {
                                results.lock().await.push((item.group_id, filtered));
                            }
                        }
                        Err(e) => tracing::debug!(url = %item.url, error = %e, "malformed remote provider reference"),
                    },
                    Ok(response) => {
                        tracing::debug!(url = %item.url, status = %response.status(), "non-success remote provider reference");
                    }
                    Err(e) => tracing::debug!(url = %item.url, error = %e, "transient remote provider reference fetch failure"),
                }
            }
        });
    }

    for item in work {
        // The producer side always has room since the channel was sized to
        // the worker count; an error here would mean every worker panicked.
        let _ = tx.send(item).await;
    }
    drop(tx);

    // Graceful-shutdown quiescence before the workers see the closed
    // channel and exit, matching the 250ms aiohttp advises before tearing
    // down a session with in-flight connections.
    tokio::time::sleep(Duration::from_millis(250)).await;
    while workers.join_next().await.is_some() {}

    for (group_id, groups) in std::sync::Arc::try_unwrap(results).ok().unwrap().into_inner() {
        map.entry(group_id).or_default().extend(groups);
    }
    Ok(())
}

/// Build the full reference map from a `provider_references` array already
/// positioned right after its `start_array` event.
pub async fn build_reference_map<I>(
    parser: &mut I,
    npi_filter: &HashSet<String>,
    client: &reqwest::Client,
    concurrency: usize,
) -> FlattenResult<ReferenceMap>
where
    I: Iterator<Item = FlattenResult<Triple>>,
{
    let mut map = ReferenceMap::new();
    let remote_work = collect_references(parser, npi_filter, &mut map)?;
    fetch_remote(client.clone(), remote_work, npi_filter.clone(), concurrency, &mut map).await?;
    Ok(map)
}

/// Look up the provider groups a rate's `provider_references` point to.
/// Reference-resolved groups were already filtered once, when the
/// reference map was built, so they're returned as-is — never re-filtered.
pub fn resolve_rate_references(rate: &Map<String, Value>, map: &ReferenceMap) -> Vec<FilteredGroup> {
    let Some(Value::Array(references)) = rate.get("provider_references") else {
        return Vec::new();
    };
    references
        .iter()
        .filter_map(Value::as_f64)
        .flat_map(|id| map.get(&(id as i64)).cloned().unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventReader;

    #[test]
    fn collects_inline_references_synchronously() {
        let json = r#"{"provider_references": [
            {"provider_group_id": 1, "provider_groups": [{"npi": [111], "tin": {"type": "ein", "value": "1"}}]},
            {"provider_group_id": 2, "provider_groups": [{"npi": [222], "tin": {"type": "ein", "value": "2"}}]}
        ]}"#;
        let mut reader = EventReader::new(json.as_bytes());
        // consume the root object's start_map, the "provider_references" map_key,
        // and its own start_array, so the loop begins at item 0.
        reader.next();
        reader.next();
        reader.next();
        let mut map = ReferenceMap::new();
        let remote = collect_references(&mut reader, &HashSet::new(), &mut map).unwrap();
        assert!(remote.is_empty());
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1][0].npi, vec!["111"]);
    }

    #[test]
    fn separates_remote_references_for_the_worker_pool() {
        let json = r#"{"provider_references": [
            {"provider_group_id": 5, "location": "https://example.com/ref5.json"}
        ]}"#;
        let mut reader = EventReader::new(json.as_bytes());
        reader.next();
        reader.next();
        reader.next();
        let mut map = ReferenceMap::new();
        let remote = collect_references(&mut reader, &HashSet::new(), &mut map).unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].group_id, 5);
        assert!(map.is_empty());
    }

    #[test]
    fn resolve_looks_up_groups_by_reference_id() {
        let mut map = ReferenceMap::new();
        map.insert(9, vec![FilteredGroup { npi: vec!["1".into()], tin_type: "ein", tin_value: "x".into() }]);
        let rate: Map<String, Value> = serde_json::from_value(serde_json::json!({
            "provider_references": [9]
        }))
        .unwrap();
        let resolved = resolve_rate_references(&rate, &map);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].npi, vec!["1"]);
    }
}
