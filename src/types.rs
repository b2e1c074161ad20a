//! Typed shapes for the bounded sub-documents this crate deserializes
//! directly with `serde`, rather than walking via the event stream.
//!
//! Only the MRF vocabulary actually touched by the flattening pipeline is
//! kept here: a plan's header fields, provider groups and their tax IDs, and
//! the body of a fetched provider-reference file. Billing-code vocabulary
//! (`billing_code_type`, `negotiation_arrangement`, ...) is read as raw
//! strings off the event stream instead of through a closed enum, since the
//! filter and row-materializer only need to compare and copy those values,
//! never validate them.

use serde::{Deserialize, Serialize};

/// Type of entity publishing the Machine-Readable File (MRF).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntityType {
    #[serde(rename = "group health plan")]
    #[serde(alias = "Group Health Plan")]
    GroupHealthPlan,

    #[serde(rename = "health insurance issuer")]
    #[serde(alias = "Health Insurance Issuer")]
    HealthInsuranceIssuer,

    #[serde(rename = "third-party administrator")]
    #[serde(alias = "Third-Party Administrator")]
    #[serde(alias = "third party administrator")]
    ThirdPartyAdministrator,

    #[serde(rename = "health care claims clearinghouse")]
    #[serde(alias = "Health Care Claims Clearinghouse")]
    HealthcareClearinghouse,

    #[serde(rename = "insurer")]
    #[serde(alias = "Insurer")]
    Insurer,

    #[serde(other)]
    Other,
}

/// Type of plan identifier (EIN or HIOS).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanIdType {
    #[serde(rename = "EIN")]
    Ein,
    #[serde(rename = "HIOS")]
    Hios,
}

/// Market the plan is offered in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Group,
    Individual,
}

/// Type of tax identifier attached to a provider group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaxIdType {
    Ein,
    Npi,
}

/// Tax identifier for a provider group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxIdentifier {
    #[serde(rename = "type")]
    pub id_type: TaxIdType,
    pub value: String,
}

/// A provider group as it appears inline in an MRF, or inside a fetched
/// provider-reference file: NPIs plus the TIN covering them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderGroup {
    pub npi: Vec<i64>,
    pub tin: TaxIdentifier,
}

/// Body of a `provider_references[].location` fetch, or an inline
/// `provider_references[]` entry once its `provider_group_id` is stripped
/// off and tracked separately by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReferenceFile {
    pub provider_groups: Vec<ProviderGroup>,
    #[serde(default)]
    pub version: Option<String>,
}

/// The plan-level header fields read once per MRF, before (or independent
/// of) the `in_network` array. Every field is optional because a
/// multi-plan "plan collection" file may omit some of them; missing fields
/// still participate in the plan content-hash as explicit nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanHeader {
    pub reporting_entity_name: Option<String>,
    pub reporting_entity_type: Option<EntityType>,
    pub plan_name: Option<String>,
    pub plan_id: Option<String>,
    pub plan_id_type: Option<PlanIdType>,
    pub plan_market_type: Option<MarketType>,
    pub last_updated_on: Option<String>,
    pub version: Option<String>,
}
