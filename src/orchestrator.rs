//! Orchestrator: drives one MRF, end to end, per `FlattenConfig`.
//!
//! Sequence, mirroring `Content`/`json_mrf_to_csv` in the Python original:
//! 1. open the input and read the plan header (stopping at whichever of
//!    `provider_references`/`in_network` appears first);
//! 2. resolve the reference map — inline case analysis tells us whether a
//!    second pass (a fresh open) is needed to reach `in_network`;
//! 3. stream in-network items through the Filter/Swap and Row
//!    Materializer, writing rows as they're produced;
//! 4. write the File/Plan/Plan↔File rows last, once every in-network row
//!    has been written.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::builder::ObjectBuilder;
use crate::config::FlattenConfig;
use crate::error::{FlattenError, FlattenResult};
use crate::event::{Event, EventReader, Triple};
use crate::filter::next_item;
use crate::input;
use crate::navigator::{ffwd, skip_value};
use crate::reference::{build_reference_map, ReferenceMap};
use crate::rows;
use crate::types::PlanHeader;
use crate::writer::TableWriter;

type Reader = EventReader<Box<dyn std::io::Read + Send>>;

const HEADER_FIELDS: &[&str] = &[
    "reporting_entity_name",
    "reporting_entity_type",
    "plan_name",
    "plan_id",
    "plan_id_type",
    "plan_market_type",
    "last_updated_on",
    "version",
];

/// `Path(filename).stem.split('.')[0]` — strip exactly the final suffix,
/// then take the first dot-separated segment of what's left.
fn extract_filename(path: &str) -> String {
    let name = Path::new(path).file_name().and_then(|s| s.to_str()).unwrap_or(path);
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    stem.split('.').next().unwrap_or(stem).to_string()
}

enum HeaderStop {
    ProviderReferences,
    InNetwork,
}

/// Read top-level scalar header fields until hitting the `map_key` for
/// `provider_references` or `in_network`, whichever comes first. Leaves
/// the stream positioned so the very next triple is that key's own value.
fn read_header<I>(parser: &mut I) -> FlattenResult<(PlanHeader, HeaderStop)>
where
    I: Iterator<Item = FlattenResult<Triple>>,
{
    let first = parser.next().ok_or_else(|| FlattenError::InvalidMrf("empty input".to_string()))??;
    if !first.prefix.is_empty() || first.event != Event::StartMap {
        return Err(FlattenError::InvalidMrf("expected a top-level JSON object".to_string()));
    }

    let mut header = PlanHeader::default();
    loop {
        let key_triple = parser
            .next()
            .ok_or_else(|| FlattenError::InvalidMrf("MRF ended before in_network".to_string()))??;
        if key_triple.event != Event::MapKey {
            return Err(FlattenError::InvalidMrf("expected a top-level key".to_string()));
        }
        let key = key_triple.value.as_ref().and_then(Value::as_str).unwrap_or_default().to_string();

        if key == "provider_references" {
            return Ok((header, HeaderStop::ProviderReferences));
        }
        if key == "in_network" {
            return Ok((header, HeaderStop::InNetwork));
        }

        if HEADER_FIELDS.contains(&key.as_str()) {
            let mut builder = ObjectBuilder::new();
            let value_triple = parser
                .next()
                .ok_or_else(|| FlattenError::InvalidMrf("header field ended early".to_string()))??;
            builder.event(value_triple.event, value_triple.value);
            if let Some(scalar) = builder.completed.pop() {
                assign_header_field(&mut header, &key, scalar);
            }
        } else {
            skip_value(parser)?;
        }
    }
}

fn assign_header_field(header: &mut PlanHeader, key: &str, value: Value) {
    let string_value = match &value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    };
    match key {
        "reporting_entity_name" => header.reporting_entity_name = string_value,
        "plan_name" => header.plan_name = string_value,
        "plan_id" => header.plan_id = string_value,
        "last_updated_on" => header.last_updated_on = string_value,
        "version" => header.version = string_value,
        "reporting_entity_type" => header.reporting_entity_type = serde_json::from_value(value).ok(),
        "plan_id_type" => header.plan_id_type = serde_json::from_value(value).ok(),
        "plan_market_type" => header.plan_market_type = serde_json::from_value(value).ok(),
        _ => {}
    }
}

/// Open a fresh pass over the input and fast-forward straight to
/// `in_network`'s `start_array`, consuming it. Used for the second-pass
/// cases where `provider_references` sits after `in_network` or is absent.
async fn open_to_in_network(config: &FlattenConfig, client: &reqwest::Client) -> FlattenResult<(Reader, Option<PathBuf>)> {
    let opened = input::open(&config.file, &config.downloads_dir, client).await?;
    let mut reader = EventReader::new(opened.reader);
    ffwd(&mut reader, Some(""), Some(Event::MapKey), Some("in_network"))?;
    let start = reader.next().ok_or_else(|| FlattenError::InvalidMrf("in_network had no body".to_string()))??;
    if start.event != Event::StartArray {
        return Err(FlattenError::InvalidMrf("in_network was not an array".to_string()));
    }
    Ok((reader, opened.cleanup))
}

/// Process one MRF end to end, writing its rows into `writer`.
pub async fn flatten_file(config: &FlattenConfig, client: &reqwest::Client, writer: &mut TableWriter) -> FlattenResult<()> {
    let filename = extract_filename(&config.file);
    let file_row = rows::file_row(&filename, &config.url)?;

    let first_opened = input::open(&config.file, &config.downloads_dir, client).await?;
    let first_cleanup = first_opened.cleanup.clone();
    let mut reader = EventReader::new(first_opened.reader);
    let (header, stop) = read_header(&mut reader)?;

    let (reference_map, mut item_reader, item_cleanup): (ReferenceMap, Reader, Option<PathBuf>) = match stop {
        HeaderStop::ProviderReferences => {
            // Positioned right at provider_references; consume its own
            // start_array before collecting references.
            let start = reader
                .next()
                .ok_or_else(|| FlattenError::InvalidMrf("provider_references had no body".to_string()))??;
            if start.event != Event::StartArray {
                return Err(FlattenError::InvalidMrf("provider_references was not an array".to_string()));
            }
            let map = build_reference_map(&mut reader, &config.npi_filter, client, config.reference_concurrency).await?;

            ffwd(&mut reader, Some(""), Some(Event::MapKey), Some("in_network"))?;
            let start = reader.next().ok_or_else(|| FlattenError::InvalidMrf("in_network had no body".to_string()))??;
            if start.event != Event::StartArray {
                return Err(FlattenError::InvalidMrf("in_network was not an array".to_string()));
            }
            (map, reader, first_cleanup)
        }
        HeaderStop::InNetwork => {
            // provider_references wasn't seen before in_network. Scan the
            // rest of the document (meaning straight through in_network's
            // own contents too) looking for it anyway.
            match ffwd(&mut reader, Some(""), Some(Event::MapKey), Some("provider_references")) {
                Ok(()) => {
                    let start = reader
                        .next()
                        .ok_or_else(|| FlattenError::InvalidMrf("provider_references had no body".to_string()))??;
                    if start.event != Event::StartArray {
                        return Err(FlattenError::InvalidMrf("provider_references was not an array".to_string()));
                    }
                    let map = build_reference_map(&mut reader, &config.npi_filter, client, config.reference_concurrency).await?;
                    drop(reader);
                    if let Some(path) = first_cleanup {
                        let _ = std::fs::remove_file(path);
                    }
                    let (fresh_reader, cleanup) = open_to_in_network(config, client).await?;
                    (map, fresh_reader, cleanup)
                }
                Err(FlattenError::EndOfStream(_)) => {
                    // provider_references genuinely doesn't exist.
                    drop(reader);
                    if let Some(path) = first_cleanup {
                        let _ = std::fs::remove_file(path);
                    }
                    let (fresh_reader, cleanup) = open_to_in_network(config, client).await?;
                    (ReferenceMap::new(), fresh_reader, cleanup)
                }
                Err(e) => return Err(e),
            }
        }
    };

    let mut row_count = 0u64;
    while let Some(item) = next_item(&mut item_reader, &config.code_filter, &config.npi_filter, &reference_map)? {
        write_item(writer, &item, file_row.filename_hash)?;
        row_count += 1;
    }
    tracing::info!(filename, rows = row_count, "finished in-network items");

    if let Some(path) = item_cleanup {
        let _ = std::fs::remove_file(path);
    }

    writer.write_file(&file_row)?;
    let plan_row = rows::plan_row(&header)?;
    writer.write_plan(&plan_row)?;
    writer.write_plan_file(plan_row.plan_hash, file_row.filename_hash)?;
    writer.flush_all()?;

    Ok(())
}

fn write_item(writer: &mut TableWriter, item: &crate::filter::FilteredItem, filename_hash: u64) -> FlattenResult<()> {
    let code_row = rows::code_row(&item.fields)?;
    writer.write_code(&code_row)?;

    for rate in &item.rates {
        let price_rows: Vec<_> = rate
            .prices
            .iter()
            .map(|p| rows::price_row(p, code_row.code_hash, filename_hash))
            .collect::<FlattenResult<_>>()?;
        for price_row in &price_rows {
            writer.write_price(price_row)?;
        }

        let group_rows: Vec<_> = rate.groups.iter().map(rows::group_row).collect::<FlattenResult<_>>()?;
        for group_row in &group_rows {
            writer.write_group(group_row)?;
        }

        for (provider_group_hash, price_hash) in rows::price_group_links(&price_rows, &group_rows) {
            writer.write_price_group_link(provider_group_hash, price_hash)?;
        }
    }

    let code = item.fields.get("billing_code").and_then(Value::as_str).unwrap_or_default();
    tracing::debug!(code_type = %code_row.billing_code_type, code, "wrote in-network item");
    Ok(())
}
