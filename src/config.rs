//! Configuration surface shared by the CLI and any direct library caller.

use std::collections::HashSet;
use std::path::PathBuf;

/// Everything the Orchestrator needs to flatten a single MRF.
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// The MRF's canonical URL, recorded verbatim in `files.csv`.
    pub url: String,
    /// Where to actually read bytes from; defaults to `url` when the MRF
    /// isn't mirrored somewhere else.
    pub file: String,
    pub out_dir: PathBuf,
    /// `(billing_code_type, billing_code)` pairs to keep; `None` disables
    /// code filtering entirely.
    pub code_filter: Option<HashSet<(String, String)>>,
    /// NPIs to keep; empty disables NPI filtering entirely.
    pub npi_filter: HashSet<String>,
    pub downloads_dir: PathBuf,
    /// Concurrent worker count for the reference-fetch pool.
    pub reference_concurrency: usize,
}

impl FlattenConfig {
    pub fn new(url: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        let url = url.into();
        FlattenConfig {
            file: url.clone(),
            url,
            out_dir: out_dir.into(),
            code_filter: None,
            npi_filter: HashSet::new(),
            downloads_dir: PathBuf::from("downloads"),
            reference_concurrency: 300,
        }
    }
}
