//! Row Materializer: turns a filtered/swapped in-network item (and the
//! plan header) into the six CSV tables' rows, hashing each entity's
//! content fields along the way. Field names and hashing order mirror
//! `code_row_from_dict`/`price_row_from_dict`/`group_row_from_dict`/
//! `prices_groups_rows_from_dicts` in the Python original this crate is
//! grounded on.

use serde_json::{Map, Value};

use crate::error::FlattenResult;
use crate::groups::FilteredGroup;
use crate::hash::hash_map;
use crate::types::PlanHeader;

fn value_or_null(v: Option<&Value>) -> Value {
    v.cloned().unwrap_or(Value::Null)
}

/// One row of `files.csv`.
pub struct FileRow {
    pub filename: String,
    pub filename_hash: u64,
    pub url: String,
}

pub fn file_row(filename: &str, url: &str) -> FlattenResult<FileRow> {
    let mut m = Map::new();
    m.insert("filename".into(), Value::String(filename.to_string()));
    let filename_hash = hash_map(&m)?;
    Ok(FileRow { filename: filename.to_string(), filename_hash, url: url.to_string() })
}

/// One row of `plans.csv`, plus the `plan_hash` that `plans_files.csv` and
/// downstream link rows reuse.
pub struct PlanRow {
    pub header: PlanHeader,
    pub plan_hash: u64,
}

/// Serializes an enum the same way `serde` renders it in JSON (its
/// `#[serde(rename)]`/`rename_all` string), for embedding as a plain string
/// field rather than a nested value.
pub fn enum_as_string<T: serde::Serialize>(v: &T) -> Value {
    match serde_json::to_value(v) {
        Ok(Value::String(s)) => Value::String(s),
        _ => Value::Null,
    }
}

pub fn plan_row(header: &PlanHeader) -> FlattenResult<PlanRow> {
    let mut m = Map::new();
    m.insert("reporting_entity_name".into(), header.reporting_entity_name.clone().map(Value::String).unwrap_or(Value::Null));
    m.insert(
        "reporting_entity_type".into(),
        header.reporting_entity_type.as_ref().map(enum_as_string).unwrap_or(Value::Null),
    );
    m.insert("plan_name".into(), header.plan_name.clone().map(Value::String).unwrap_or(Value::Null));
    m.insert("plan_id".into(), header.plan_id.clone().map(Value::String).unwrap_or(Value::Null));
    m.insert("plan_id_type".into(), header.plan_id_type.as_ref().map(enum_as_string).unwrap_or(Value::Null));
    m.insert("plan_market_type".into(), header.plan_market_type.as_ref().map(enum_as_string).unwrap_or(Value::Null));
    m.insert("last_updated_on".into(), header.last_updated_on.clone().map(Value::String).unwrap_or(Value::Null));
    m.insert("version".into(), header.version.clone().map(Value::String).unwrap_or(Value::Null));
    let plan_hash = hash_map(&m)?;
    Ok(PlanRow { header: header.clone(), plan_hash })
}

/// One row of `codes.csv`.
pub struct CodeRow {
    pub billing_code_type: String,
    pub billing_code_type_version: String,
    pub billing_code: String,
    pub code_hash: u64,
}

pub fn code_row(item: &Map<String, Value>) -> FlattenResult<CodeRow> {
    let get = |key: &str| -> String {
        item.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string()
    };
    let billing_code_type = get("billing_code_type");
    let billing_code_type_version = get("billing_code_type_version");
    let billing_code = get("billing_code");

    let mut m = Map::new();
    m.insert("billing_code_type".into(), Value::String(billing_code_type.clone()));
    m.insert("billing_code_type_version".into(), Value::String(billing_code_type_version.clone()));
    m.insert("billing_code".into(), Value::String(billing_code.clone()));
    let code_hash = hash_map(&m)?;

    Ok(CodeRow { billing_code_type, billing_code_type_version, billing_code, code_hash })
}

/// Trim each element, drop empties, sort lexicographically. Resolves the
/// `billing_code_modifier`/`service_code` empty-string open question.
fn normalize_code_list(value: &Value) -> Option<Vec<String>> {
    let arr = value.as_array()?;
    let mut items: Vec<String> = arr
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        return None;
    }
    items.sort();
    Some(items)
}

/// One row of `prices.csv`.
pub struct PriceRow {
    pub billing_class: Value,
    pub negotiated_type: Value,
    pub expiration_date: Value,
    pub negotiated_rate: Value,
    pub additional_information: Value,
    pub service_code: Option<String>,
    pub billing_code_modifier: Option<String>,
    pub code_hash: u64,
    pub filename_hash: u64,
    pub price_hash: u64,
}

pub fn price_row(price: &Map<String, Value>, code_hash: u64, filename_hash: u64) -> FlattenResult<PriceRow> {
    let mut m = Map::new();
    for key in ["billing_class", "negotiated_type", "expiration_date", "negotiated_rate", "additional_information"] {
        m.insert(key.into(), value_or_null(price.get(key)));
    }

    let service_code = price.get("service_code").and_then(normalize_code_list);
    let billing_code_modifier = price.get("billing_code_modifier").and_then(normalize_code_list);
    if let Some(list) = &service_code {
        m.insert("service_code".into(), Value::String(serde_json::to_string(list)?));
    }
    if let Some(list) = &billing_code_modifier {
        m.insert("billing_code_modifier".into(), Value::String(serde_json::to_string(list)?));
    }

    m.insert("code_hash".into(), Value::Number(code_hash.into()));
    m.insert("filename_hash".into(), Value::Number(filename_hash.into()));
    let price_hash = hash_map(&m)?;

    Ok(PriceRow {
        billing_class: m.get("billing_class").cloned().unwrap_or(Value::Null),
        negotiated_type: m.get("negotiated_type").cloned().unwrap_or(Value::Null),
        expiration_date: m.get("expiration_date").cloned().unwrap_or(Value::Null),
        negotiated_rate: m.get("negotiated_rate").cloned().unwrap_or(Value::Null),
        additional_information: m.get("additional_information").cloned().unwrap_or(Value::Null),
        service_code: service_code.map(|l| serde_json::to_string(&l).unwrap()),
        billing_code_modifier: billing_code_modifier.map(|l| serde_json::to_string(&l).unwrap()),
        code_hash,
        filename_hash,
        price_hash,
    })
}

/// One row of `provider_groups.csv`.
pub struct GroupRow {
    pub npi_numbers: String,
    pub tin_type: String,
    pub tin_value: String,
    pub provider_group_hash: u64,
}

pub fn group_row(group: &FilteredGroup) -> FlattenResult<GroupRow> {
    let npi_numbers = serde_json::to_string(&group.npi)?;
    let mut m = Map::new();
    m.insert("npi_numbers".into(), Value::String(npi_numbers.clone()));
    m.insert("tin_type".into(), Value::String(group.tin_type.to_string()));
    m.insert("tin_value".into(), Value::String(group.tin_value.clone()));
    let provider_group_hash = hash_map(&m)?;
    Ok(GroupRow { npi_numbers, tin_type: group.tin_type.to_string(), tin_value: group.tin_value.clone(), provider_group_hash })
}

/// Cartesian product of one rate's price rows and group rows: a
/// `prices_provider_groups.csv` link row per pair.
pub fn price_group_links(prices: &[PriceRow], groups: &[GroupRow]) -> Vec<(u64, u64)> {
    let mut links = Vec::with_capacity(prices.len() * groups.len());
    for price in prices {
        for group in groups {
            links.push((group.provider_group_hash, price.price_hash));
        }
    }
    links
}
