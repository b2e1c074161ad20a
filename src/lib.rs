//! Streaming flattener for healthcare price-transparency Machine-Readable
//! Files (MRFs): reads a single-pass, bounded-memory walk over an
//! `in_network` rate file and writes a normalized, hash-linked relational
//! CSV dataset (six tables, linked by truncated SHA-256 content hashes).
//!
//! The pipeline, module by module:
//! - [`event`] turns raw JSON bytes into `(prefix, event, value)` triples.
//! - [`navigator`] fast-forwards the event stream to a pattern, or skips
//!   a value outright.
//! - [`builder`] reconstructs whole JSON values from a run of triples.
//! - [`input`] opens a local or remote, optionally compressed or zipped,
//!   MRF as a plain `Read`.
//! - [`reference`] resolves `provider_references` into a
//!   group-id-to-groups map, fetching remote ones concurrently.
//! - [`groups`] applies the NPI allowlist shared by inline and
//!   reference-resolved provider groups.
//! - [`filter`] streams `in_network` items, applying the early billing
//!   code/arrangement skip and resolving each rate's provider groups.
//! - [`rows`] and [`hash`] turn filtered items into the six tables' rows,
//!   content-hashed for stable cross-table linking.
//! - [`writer`] appends those rows to the output CSV files.
//! - [`orchestrator`] drives one MRF through the whole pipeline.
//! - [`config`] is the input surface shared by the CLI and library callers.

pub mod builder;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod groups;
pub mod hash;
pub mod input;
pub mod navigator;
pub mod orchestrator;
pub mod reference;
pub mod rows;
pub mod types;
pub mod writer;

pub use config::FlattenConfig;
pub use error::{FlattenError, FlattenResult};
pub use orchestrator::flatten_file;
