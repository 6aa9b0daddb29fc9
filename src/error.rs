//! Recoverable error types for the graph engine.
//!
//! Fatal conditions (allocation failure, malformed header, truncated
//! record, internal invariant violation) do not appear here — they are
//! raised through [`crate::diagnostics::die`] and terminate the process.
//! Only conditions a caller could reasonably handle are modeled as
//! `GraphError` variants.

use std::io;
use thiserror::Error;

/// Errors a caller of the graph engine can recover from.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("input file not found: {0}")]
    MissingInput(String),

    #[error("bucket saturated beyond reserve capacity (bucket {bucket})")]
    FullBucket { bucket: usize },

    #[error("kmer already present in colour {colour} while empty_colours was requested")]
    AlreadyPresent { colour: usize },

    #[error("bad magic bytes in {what}: expected \"CORTEX\"")]
    BadMagic { what: &'static str },

    #[error("unsupported graph file format version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("truncated {field}: expected {expected} bytes, got {got} [file: {path}]")]
    Truncated {
        field: &'static str,
        expected: usize,
        got: usize,
        path: String,
    },

    #[error("invalid kmer string: {0}")]
    InvalidKmer(String),

    #[error("kmer size {0} out of range [3, 255]")]
    InvalidKmerSize(usize),
}

pub type Result<T> = std::result::Result<T, GraphError>;
