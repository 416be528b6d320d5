//! # genomelake
//!
//! Random access to per-basepair genomic data for machine-learning models.
//!
//! Genomic data comes in two flavors here: nucleotide sequence, which is one-hot
//! encoded into an `(length, 4)` matrix, and per-basepair signal (e.g. coverage
//! tracks), which is an `(length,)` vector. Both are stored one array per
//! chromosome, and a batch of equal-width [`Interval`]s is extracted into a dense
//! `(num_intervals, width[, channels])` tensor.
//!
//! The main pieces are:
//!
//!  - [`encoding`]: the one-hot nucleotide encoder.
//!  - [`store`]: converting an indexed FASTA or bigWig file into an array store
//!    directory (a `metadata.json` manifest plus one array per chromosome), and
//!    opening it again with shape verification.
//!  - [`tiled`]: the chunked, tiled, compressed dense-array format used by the
//!    chunked store backend.
//!  - [`extract`]: the [`Extractor`] trait and its three implementations, backed by
//!    an array store, an indexed FASTA file, or a bigWig file.
//!
//! [`Interval`]: crate::ranges::Interval
//! [`Extractor`]: crate::extract::Extractor

pub mod encoding;
pub mod error;
pub mod extract;
pub mod io;
pub mod ranges;
pub mod sequences;
pub mod store;
pub mod test_utilities;
pub mod tiled;

/// Genomic coordinate type, 0-based.
pub type Position = u32;

pub mod prelude {
    pub use crate::encoding::{one_hot_encode, BASE_ORDER, NUM_SEQ_CHARS};
    pub use crate::error::GenomeLakeError;
    pub use crate::extract::{
        ArrayExtractor, BigwigExtractor, Extractor, FastaExtractor, SequenceExtractor,
        SignalExtractor,
    };
    pub use crate::io::{read_bed_intervals, read_genome_sizes};
    pub use crate::ranges::{Interval, Strand};
    pub use crate::sequences::{SequenceSource, SignalSource};
    pub use crate::store::{
        extract_bigwig_to_store, extract_fasta_to_store, open_store, ChromArrays, StoreMode,
        WriteOptions,
    };
    pub use crate::Position;
}
