//! Integration tests for the full Orchestrator, covering the concrete
//! scenarios a complete MRF flattener needs to get right: a clean local
//! gzipped baseline, NPI filtering, code filtering, remote references
//! appearing after in_network, a transient reference fetch failure, and
//! skipping non-ffs arrangements.

use std::collections::HashSet;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use mrf_flatten::config::FlattenConfig;
use mrf_flatten::orchestrator::flatten_file;
use mrf_flatten::writer::TableWriter;

fn write_gz(path: &std::path::Path, contents: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn read_csv(dir: &std::path::Path, table: &str) -> Vec<Vec<String>> {
    let path = dir.join(table);
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path).unwrap();
    reader.records().map(|r| r.unwrap().iter().map(str::to_string).collect()).collect()
}

fn baseline_mrf() -> String {
    serde_json::json!({
        "reporting_entity_name": "Acme Health Plan",
        "reporting_entity_type": "group health plan",
        "plan_name": "Acme PPO",
        "plan_id": "123456789",
        "plan_id_type": "EIN",
        "plan_market_type": "group",
        "last_updated_on": "2026-01-01",
        "version": "1.0.0",
        "provider_references": [],
        "in_network": [{
            "billing_code_type": "TS-TST",
            "billing_code_type_version": "2020",
            "billing_code": "0000",
            "negotiation_arrangement": "ffs",
            "negotiated_rates": [{
                "negotiated_prices": [{
                    "billing_class": "professional",
                    "negotiated_type": "negotiated",
                    "expiration_date": "2026-01-01",
                    "negotiated_rate": 100.00
                }],
                "provider_groups": [{
                    "npi": [1111111111],
                    "tin": {"type": "ein", "value": "12-3456789"}
                }]
            }]
        }]
    })
    .to_string()
}

#[tokio::test]
async fn local_gzipped_mrf_with_no_filters_produces_one_row_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let mrf_path = dir.path().join("test.json.gz");
    write_gz(&mrf_path, &baseline_mrf());

    let out_dir = dir.path().join("out");
    let config = FlattenConfig::new(mrf_path.to_str().unwrap(), out_dir.clone());
    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&out_dir).unwrap();
    flatten_file(&config, &client, &mut writer).await.unwrap();

    for table in ["codes.csv", "prices.csv", "provider_groups.csv", "prices_provider_groups.csv", "files.csv", "plans.csv", "plans_files.csv"] {
        let rows = read_csv(&out_dir, table);
        assert_eq!(rows.len(), 1, "expected exactly one row in {table}, got {rows:?}");
    }

    let groups = read_csv(&out_dir, "provider_groups.csv");
    assert_eq!(groups[0][0], r#"["1111111111"]"#);
}

#[tokio::test]
async fn npi_filter_keeps_surviving_groups_and_drops_empty_ones() {
    let dir = tempfile::tempdir().unwrap();
    let mrf = serde_json::json!({
        "reporting_entity_name": "Acme Health Plan",
        "reporting_entity_type": "group health plan",
        "in_network": [{
            "billing_code_type": "CPT",
            "billing_code_type_version": "2020",
            "billing_code": "99213",
            "negotiation_arrangement": "ffs",
            "negotiated_rates": [{
                "negotiated_prices": [{
                    "billing_class": "professional",
                    "negotiated_type": "negotiated",
                    "expiration_date": "2026-01-01",
                    "negotiated_rate": 50.0
                }],
                "provider_groups": [
                    {"npi": [5555555555i64], "tin": {"type": "ein", "value": "1"}},
                    {"npi": [1111111111i64, 2020202020, 9999999999i64], "tin": {"type": "ein", "value": "2"}},
                    {"npi": [9999999999i64], "tin": {"type": "ein", "value": "3"}}
                ]
            }]
        }]
    })
    .to_string();
    let mrf_path = dir.path().join("test.json.gz");
    write_gz(&mrf_path, &mrf);

    let out_dir = dir.path().join("out");
    let mut config = FlattenConfig::new(mrf_path.to_str().unwrap(), out_dir.clone());
    config.npi_filter = ["1111111111", "5555555555", "2020202020"].into_iter().map(String::from).collect();

    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&out_dir).unwrap();
    flatten_file(&config, &client, &mut writer).await.unwrap();

    let groups = read_csv(&out_dir, "provider_groups.csv");
    let npi_lists: HashSet<String> = groups.into_iter().map(|r| r[0].clone()).collect();
    assert!(npi_lists.contains(r#"["5555555555"]"#));
    assert!(npi_lists.contains(r#"["1111111111","2020202020"]"#));
    assert!(!npi_lists.iter().any(|n| n.contains("9999999999")));
    assert_eq!(npi_lists.len(), 2, "the group that filters down to empty must not appear at all");
}

#[tokio::test]
async fn code_filter_keeps_only_the_matching_item() {
    let dir = tempfile::tempdir().unwrap();
    let price = serde_json::json!({
        "billing_class": "professional",
        "negotiated_type": "negotiated",
        "expiration_date": "2026-01-01",
        "negotiated_rate": 10.0
    });
    let group = serde_json::json!({"npi": [1111111111], "tin": {"type": "ein", "value": "1"}});
    let item = |code_type: &str, code: &str| {
        serde_json::json!({
            "billing_code_type": code_type,
            "billing_code_type_version": "2020",
            "billing_code": code,
            "negotiation_arrangement": "ffs",
            "negotiated_rates": [{"negotiated_prices": [price.clone()], "provider_groups": [group.clone()]}]
        })
    };
    let mrf = serde_json::json!({
        "reporting_entity_name": "Acme",
        "in_network": [item("CPT", "99213"), item("CPT", "99214"), item("HCPCS", "J3490")]
    })
    .to_string();
    let mrf_path = dir.path().join("test.json.gz");
    write_gz(&mrf_path, &mrf);

    let out_dir = dir.path().join("out");
    let mut config = FlattenConfig::new(mrf_path.to_str().unwrap(), out_dir.clone());
    config.code_filter = Some([("CPT".to_string(), "99213".to_string())].into_iter().collect());

    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&out_dir).unwrap();
    flatten_file(&config, &client, &mut writer).await.unwrap();

    let codes = read_csv(&out_dir, "codes.csv");
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0][2], "99213");
}

#[tokio::test]
async fn non_ffs_arrangement_is_silently_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mrf = serde_json::json!({
        "reporting_entity_name": "Acme",
        "in_network": [{
            "billing_code_type": "CPT",
            "billing_code_type_version": "2020",
            "billing_code": "99213",
            "negotiation_arrangement": "bundle",
            "negotiated_rates": [{
                "negotiated_prices": [{"billing_class": "professional", "negotiated_type": "negotiated", "expiration_date": "2026-01-01", "negotiated_rate": 10.0}],
                "provider_groups": [{"npi": [1111111111], "tin": {"type": "ein", "value": "1"}}]
            }]
        }]
    })
    .to_string();
    let mrf_path = dir.path().join("test.json.gz");
    write_gz(&mrf_path, &mrf);

    let out_dir = dir.path().join("out");
    let config = FlattenConfig::new(mrf_path.to_str().unwrap(), out_dir.clone());
    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&out_dir).unwrap();
    flatten_file(&config, &client, &mut writer).await.unwrap();

    assert!(!out_dir.join("codes.csv").exists(), "codes.csv should never be opened when every item is skipped");
    // Plan-level rows are still written even when every in-network item is skipped.
    assert_eq!(read_csv(&out_dir, "plans.csv").len(), 1);
}

#[tokio::test]
async fn remote_reference_after_in_network_is_resolved_on_a_second_pass() {
    let mut server = mockito::Server::new_async().await;
    let ref_body = serde_json::json!({
        "provider_groups": [{"npi": [1111111111], "tin": {"type": "ein", "value": "12-3456789"}}]
    });
    let mock = server.mock("GET", "/ref1.json").with_status(200).with_body(ref_body.to_string()).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    // in_network appears before provider_references in byte order: case 2.
    let mrf = format!(
        r#"{{"reporting_entity_name": "Acme", "in_network": [{{
            "billing_code_type": "CPT", "billing_code_type_version": "2020", "billing_code": "99213",
            "negotiation_arrangement": "ffs",
            "negotiated_rates": [{{
                "negotiated_prices": [{{"billing_class": "professional", "negotiated_type": "negotiated", "expiration_date": "2026-01-01", "negotiated_rate": 10.0}}],
                "provider_references": [1]
            }}]
        }}], "provider_references": [{{"provider_group_id": 1, "location": "{}/ref1.json"}}]}}"#,
        server.url()
    );
    let mrf_path = dir.path().join("test.json.gz");
    write_gz(&mrf_path, &mrf);

    let out_dir = dir.path().join("out");
    let config = FlattenConfig::new(mrf_path.to_str().unwrap(), out_dir.clone());
    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&out_dir).unwrap();
    flatten_file(&config, &client, &mut writer).await.unwrap();

    mock.assert_async().await;
    let groups = read_csv(&out_dir, "provider_groups.csv");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0][0], r#"["1111111111"]"#);
    assert_eq!(read_csv(&out_dir, "codes.csv").len(), 1);
}

#[tokio::test]
async fn transient_reference_fetch_failure_drops_only_the_dependent_rate() {
    let mut server = mockito::Server::new_async().await;
    let ok_body = serde_json::json!({
        "provider_groups": [{"npi": [2222222222i64], "tin": {"type": "ein", "value": "1"}}]
    });
    server.mock("GET", "/ok.json").with_status(200).with_body(ok_body.to_string()).create_async().await;
    server.mock("GET", "/missing.json").with_status(404).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let mrf = format!(
        r#"{{"reporting_entity_name": "Acme", "provider_references": [
            {{"provider_group_id": 1, "location": "{url}/ok.json"}},
            {{"provider_group_id": 2, "location": "{url}/missing.json"}}
        ], "in_network": [
            {{"billing_code_type": "CPT", "billing_code_type_version": "2020", "billing_code": "99213",
              "negotiation_arrangement": "ffs",
              "negotiated_rates": [{{
                  "negotiated_prices": [{{"billing_class": "professional", "negotiated_type": "negotiated", "expiration_date": "2026-01-01", "negotiated_rate": 10.0}}],
                  "provider_references": [1]
              }}]}},
            {{"billing_code_type": "CPT", "billing_code_type_version": "2020", "billing_code": "99214",
              "negotiation_arrangement": "ffs",
              "negotiated_rates": [{{
                  "negotiated_prices": [{{"billing_class": "professional", "negotiated_type": "negotiated", "expiration_date": "2026-01-01", "negotiated_rate": 20.0}}],
                  "provider_references": [2]
              }}]}}
        ]}}"#,
        url = server.url()
    );
    let mrf_path = dir.path().join("test.json.gz");
    write_gz(&mrf_path, &mrf);

    let out_dir = dir.path().join("out");
    let config = FlattenConfig::new(mrf_path.to_str().unwrap(), out_dir.clone());
    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&out_dir).unwrap();
    flatten_file(&config, &client, &mut writer).await.unwrap();

    // The 99214 item's only rate depended on the failed reference and has no
    // surviving groups, so the whole item is dropped; 99213 survives.
    let codes = read_csv(&out_dir, "codes.csv");
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0][2], "99213");
}
