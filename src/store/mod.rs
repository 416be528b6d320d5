//! Array stores: a directory of per-chromosome arrays and the manifest that
//! describes them.
//!
//! # Layout
//!
//! ```text
//! store/
//!   metadata.json      the [`Manifest`]
//!   chr1.npy           array_numpy: one .npy file per chromosome
//!   chr2/              array_bcolz: one tiled array directory per chromosome
//! ```
//!
//! The manifest is `{"file_shapes": {<chrom>: [dims...]}, "type": ..., "source": ...}`,
//! with an extra `"encoding"` entry on one-hot sequence stores. It is written last
//! (see [`write`]) and is the single source of truth for expected shapes on read
//! (see [`read`]).
//!
//! The chunked backend keeps the `array_bcolz` type name so that existing stores
//! and their consumers keep working; its arrays are [`crate::tiled`] arrays.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::encoding::Encoding;
use crate::error::GenomeLakeError;

pub mod read;
pub mod write;

pub use read::{open_store, ChromArray, ChromArrays, MappedArray};
pub use write::{
    extract_bigwig_to_store, extract_fasta_to_store, write_sequence_store, write_signal_store,
};

/// Name of the manifest file in every store directory.
pub const METADATA_FILENAME: &str = "metadata.json";

const NUMPY_TYPE: &str = "array_numpy";
const CHUNKED_TYPE: &str = "array_bcolz";

/// The storage backend of an array store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreMode {
    /// One dense `.npy` file per chromosome, loaded into memory or memory-mapped.
    Numpy,
    /// One chunked, compressed [`crate::tiled`] array per chromosome.
    Chunked,
}

impl StoreMode {
    /// The value of the manifest `type` field for this backend.
    pub fn manifest_type(&self) -> &'static str {
        match self {
            StoreMode::Numpy => NUMPY_TYPE,
            StoreMode::Chunked => CHUNKED_TYPE,
        }
    }

    /// The on-disk location of chromosome `seqname`'s array in store `dir`.
    pub fn array_path(&self, dir: &Path, seqname: &str) -> PathBuf {
        match self {
            StoreMode::Numpy => dir.join(format!("{}.npy", seqname)),
            StoreMode::Chunked => dir.join(seqname),
        }
    }
}

impl FromStr for StoreMode {
    type Err = GenomeLakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            NUMPY_TYPE => Ok(StoreMode::Numpy),
            CHUNKED_TYPE => Ok(StoreMode::Chunked),
            other => Err(GenomeLakeError::UnsupportedStoreType(other.to_string())),
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.manifest_type())
    }
}

/// Options for converting a data source into an array store.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub mode: StoreMode,
    /// Clear an existing output directory instead of failing.
    pub overwrite: bool,
    /// Replace `NaN` signal values with zero before storage.
    pub nan_as_zero: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            mode: StoreMode::Chunked,
            overwrite: false,
            nan_as_zero: true,
        }
    }
}

impl WriteOptions {
    pub fn new(mode: StoreMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn nan_as_zero(mut self, nan_as_zero: bool) -> Self {
        self.nan_as_zero = nan_as_zero;
        self
    }
}

/// The `metadata.json` manifest of an array store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub file_shapes: IndexMap<String, Vec<usize>>,
    #[serde(rename = "type")]
    pub store_type: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
}

impl Manifest {
    pub fn new(mode: StoreMode, source: impl Into<String>) -> Self {
        Self {
            file_shapes: IndexMap::new(),
            store_type: mode.manifest_type().to_string(),
            source: source.into(),
            encoding: None,
        }
    }

    /// The storage backend named by the `type` field.
    pub fn mode(&self) -> Result<StoreMode, GenomeLakeError> {
        self.store_type.parse()
    }

    /// Read the manifest of the store in `dir`.
    pub fn read(dir: impl AsRef<Path>) -> Result<Self, GenomeLakeError> {
        let reader = BufReader::new(File::open(dir.as_ref().join(METADATA_FILENAME))?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the manifest into `dir`, atomically: it is written and synced to a
    /// temporary file, then renamed into place.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<(), GenomeLakeError> {
        let dir = dir.as_ref();
        let tmp_path = dir.join(format!(".{}.tmp", METADATA_FILENAME));
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp_path, dir.join(METADATA_FILENAME))?;
        Ok(())
    }
}
