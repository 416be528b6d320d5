//! The [`GenomeLakeError`] `enum` definition and error messages.
//!
use crate::Position;
use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

/// The [`GenomeLakeError`] defines the standard set of errors that should
/// be passed to the user.
#[derive(Debug, Error)]
pub enum GenomeLakeError {
    // IO related errors
    #[error("File reading error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Delimited file parsing error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Could not read .npy array: {0}")]
    ReadNpyError(#[from] ndarray_npy::ReadNpyError),
    #[error("Could not write .npy array: {0}")]
    WriteNpyError(#[from] ndarray_npy::WriteNpyError),
    #[error("Could not view memory-mapped .npy array: {0}")]
    ViewNpyError(#[from] ndarray_npy::ViewNpyError),
    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
    #[error("Signal track error: {0}")]
    SignalTrackError(String),

    // File parsing related errors
    #[error("Integer parsing error: {0}")]
    ParseIntError(#[from] ParseIntError),
    #[error("Genome file is invalid: {0}")]
    InvalidGenomeFile(String),
    #[error("BED file is invalid: {0}")]
    InvalidBedFile(String),
    #[error("Invalid strand '{0}': must be either '+', '-', or '.'")]
    InvalidStrand(String),

    // Invalid genomic range errors
    #[error("Range invalid: start ({0}) must be less than end ({1})")]
    InvalidGenomicRange(Position, Position),
    #[error("Range [{start}, {end}) is invalid for sequence '{seqname}' of length {length}")]
    InvalidGenomicRangeForSequence {
        seqname: String,
        start: Position,
        end: Position,
        length: Position,
    },
    #[error("Sequence name '{0}' is not present in the data source")]
    MissingSequence(String),
    #[error("Fetched {actual} basepairs for '{seqname}', expected {expected}")]
    SequenceLengthMismatch {
        seqname: String,
        expected: usize,
        actual: usize,
    },

    // Array store integrity errors
    #[error("Inconsistent shape found in metadata file: {seqname} - {declared:?} vs {actual:?}")]
    InconsistentShape {
        seqname: String,
        declared: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Unsupported array store type '{0}': can only extract from array_bcolz and array_numpy")]
    UnsupportedStoreType(String),
    #[error("Can only extract from 1D/2D arrays, found {0}D")]
    UnsupportedRank(usize),
    #[error("Array for sequence '{seqname}' has layout {actual}, the rest of the store has {expected}")]
    InconsistentLayout {
        seqname: String,
        expected: String,
        actual: String,
    },
    #[error("Array file for sequence '{seqname}' is missing: {path}")]
    MissingArrayFile { seqname: String, path: PathBuf },
    #[error("Array store contains no sequences")]
    EmptyStore,
    #[error("Unsupported nucleotide encoding: {0}")]
    UnsupportedEncoding(String),

    // Tiled array errors
    #[error("Invalid tiled array schema: {0}")]
    InvalidTiledSchema(String),
    #[error("Tiled arrays cannot have an empty secondary dimension")]
    EmptyTiledArray,
    #[error("Corrupt tile {index}: {reason}")]
    CorruptTile { index: usize, reason: String },

    // Extraction contract errors
    #[error("out array has incorrect shape: {actual:?} (need {expected:?})")]
    OutputShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("No intervals given for extraction")]
    EmptyIntervals,
    #[error("Interval {index} has width {width}, but the batch width is {expected}")]
    MixedWidths {
        index: usize,
        width: usize,
        expected: usize,
    },

    // Write path errors
    #[error("Output path {0} already exists")]
    OutputExists(PathBuf),
}
