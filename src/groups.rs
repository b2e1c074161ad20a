//! NPI filtering, shared between the Reference Resolver (remote and inline
//! `provider_references[]` groups) and the In-Network Filter (inline
//! `negotiated_rates[].provider_groups[]` groups) — both apply the same
//! single-pass filter to the same shape of value, so it lives in one place
//! rather than twice.

use std::collections::HashSet;

use crate::error::FlattenResult;
use crate::types::{ProviderGroup, TaxIdType};

/// A provider group after NPI filtering: NPIs stringified, filtered, and
/// sorted ascending, ready for row materialization. `None` from
/// [`filter_group`] means the group's entire NPI list was filtered out —
/// the group itself is dropped.
#[derive(Clone)]
pub struct FilteredGroup {
    pub npi: Vec<String>,
    pub tin_type: &'static str,
    pub tin_value: String,
}

/// Apply an NPI allowlist to one group. An empty `npi_filter` means "no
/// filtering" and passes every group through unchanged (beyond
/// stringify+sort). Filtering, not just sorting, is idempotent: running
/// this twice over its own output is a no-op.
pub fn filter_group(group: &ProviderGroup, npi_filter: &HashSet<String>) -> Option<FilteredGroup> {
    let mut npi: Vec<String> = group.npi.iter().map(i64::to_string).collect();
    if !npi_filter.is_empty() {
        npi.retain(|n| npi_filter.contains(n));
        if npi.is_empty() {
            return None;
        }
    }
    npi.sort();
    Some(FilteredGroup {
        npi,
        tin_type: match group.tin.id_type {
            TaxIdType::Ein => "ein",
            TaxIdType::Npi => "npi",
        },
        tin_value: group.tin.value.clone(),
    })
}

/// Deserialize a raw `provider_groups` JSON value (as reconstructed by the
/// [`crate::builder::ObjectBuilder`] off the event stream) into typed
/// groups and filter each by NPI, dropping any that filter down to empty.
pub fn filter_groups_value(
    groups: &serde_json::Value,
    npi_filter: &HashSet<String>,
) -> FlattenResult<Vec<FilteredGroup>> {
    let raw: Vec<ProviderGroup> = serde_json::from_value(groups.clone())?;
    Ok(raw.iter().filter_map(|g| filter_group(g, npi_filter)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxIdentifier;

    fn group(npis: &[i64]) -> ProviderGroup {
        ProviderGroup {
            npi: npis.to_vec(),
            tin: TaxIdentifier { id_type: TaxIdType::Ein, value: "12-3456789".into() },
        }
    }

    #[test]
    fn empty_filter_passes_everything_through_sorted() {
        let g = group(&[30, 10, 20]);
        let filtered = filter_group(&g, &HashSet::new()).unwrap();
        assert_eq!(filtered.npi, vec!["10", "20", "30"]);
    }

    #[test]
    fn nonempty_filter_drops_unmatched_npis() {
        let g = group(&[10, 20, 30]);
        let allow: HashSet<String> = ["20".to_string()].into_iter().collect();
        let filtered = filter_group(&g, &allow).unwrap();
        assert_eq!(filtered.npi, vec!["20"]);
    }

    #[test]
    fn group_dropped_when_no_npi_survives() {
        let g = group(&[10, 20]);
        let allow: HashSet<String> = ["999".to_string()].into_iter().collect();
        assert!(filter_group(&g, &allow).is_none());
    }

    #[test]
    fn filtering_is_idempotent() {
        let g = group(&[30, 10, 20]);
        let allow: HashSet<String> = ["10".to_string(), "20".to_string()].into_iter().collect();
        let once = filter_group(&g, &allow).unwrap();
        let re_grouped = ProviderGroup {
            npi: once.npi.iter().map(|s| s.parse().unwrap()).collect(),
            tin: TaxIdentifier { id_type: TaxIdType::Ein, value: once.tin_value.clone() },
        };
        let twice = filter_group(&re_grouped, &allow).unwrap();
        assert_eq!(once.npi, twice.npi);
    }
}
