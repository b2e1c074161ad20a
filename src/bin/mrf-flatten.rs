//! CLI entry point: flattens one Machine-Readable File into the six CSV
//! tables under `--out-dir`.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use mrf_flatten::config::FlattenConfig;
use mrf_flatten::error::FlattenResult;
use mrf_flatten::writer::TableWriter;

/// Flatten a healthcare price-transparency Machine-Readable File into a
/// normalized, hash-linked relational CSV dataset.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The MRF's canonical URL, recorded in files.csv.
    url: String,

    /// Where to actually read the MRF from, if it differs from `url` (a
    /// local mirror, for instance). Defaults to `url`.
    #[arg(long)]
    file: Option<String>,

    /// Directory the six CSV tables are written into.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Directory used for scratch files (downloaded zips, extracted
    /// archive entries).
    #[arg(long, default_value = "downloads")]
    downloads_dir: PathBuf,

    /// Path to a CSV of `billing_code_type,billing_code` pairs to keep.
    /// Omit to keep every billing code.
    #[arg(long)]
    code_filter: Option<PathBuf>,

    /// Path to a newline-delimited list of NPIs to keep. Omit to keep
    /// every provider group.
    #[arg(long)]
    npi_filter: Option<PathBuf>,

    /// Concurrent worker count for the remote provider-reference fetch pool.
    #[arg(long, default_value_t = 300)]
    reference_concurrency: usize,
}

fn load_code_filter(path: &PathBuf) -> FlattenResult<HashSet<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut filter = HashSet::new();
    for record in reader.records() {
        let record = record?;
        if let (Some(code_type), Some(code)) = (record.get(0), record.get(1)) {
            filter.insert((code_type.trim().to_string(), code.trim().to_string()));
        }
    }
    Ok(filter)
}

fn load_npi_filter(path: &PathBuf) -> FlattenResult<HashSet<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

#[tokio::main]
async fn main() -> FlattenResult<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = FlattenConfig::new(args.url, args.out_dir);
    if let Some(file) = args.file {
        config.file = file;
    }
    config.downloads_dir = args.downloads_dir;
    config.reference_concurrency = args.reference_concurrency;
    if let Some(path) = &args.code_filter {
        config.code_filter = Some(load_code_filter(path)?);
    }
    if let Some(path) = &args.npi_filter {
        config.npi_filter = load_npi_filter(path)?;
    }

    let client = reqwest::Client::new();
    let mut writer = TableWriter::new(&config.out_dir)?;
    mrf_flatten::flatten_file(&config, &client, &mut writer).await?;

    Ok(())
}
