//! Error types for the flattening pipeline.
//!
//! Follows the same one-enum-per-concern, `#[from]`-heavy shape as
//! `mrf-rs`'s `ParseError`/`SourceError`.

use thiserror::Error;

/// Error type for flattening a single MRF file.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// Unrecognized file suffix or malformed URL.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The MRF ended before its required top-level keys were seen.
    #[error("invalid MRF: {0}")]
    InvalidMrf(String),

    /// The stream navigator couldn't find its target pattern before the
    /// stream ended. Fatal everywhere except inside reference-map case
    /// analysis, where it's caught and treated as a structural signal.
    #[error("end of stream while looking for: {0}")]
    EndOfStream(String),

    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON tokenizer error from the underlying streaming reader.
    #[error("JSON stream error: {0}")]
    JsonStream(#[from] struson::reader::ReaderError),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip-archive error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A zip archive didn't contain exactly one JSON entry.
    #[error("zip archive at {0} did not contain exactly one JSON entry")]
    ZipContents(String),

    /// Attempted to hash an empty dictionary.
    #[error("cannot hash an empty dictionary")]
    EmptyHash,
}

pub type FlattenResult<T> = Result<T, FlattenError>;
