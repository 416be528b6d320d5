//! Sources of per-basepair genomic data.
//!
//! Two kinds of raw data source feed both the array store write path and the direct
//! extractors:
//!
//!  - a [`SequenceSource`], a nucleotide sequence source such as an indexed FASTA
//!    file ([`nucleotide::IndexedFasta`]) or an in-memory set of sequences
//!    ([`nucleotide::NucleotideSequences`]).
//!  - a [`SignalSource`], a per-basepair numeric track such as a bigWig file
//!    ([`signal::BigWigFile`]) or in-memory tracks ([`signal::SignalTracks`]).
//!
//! Both fail with a bounds error for any region outside `[0, length)` rather than
//! clipping it.

use indexmap::IndexMap;

use crate::error::GenomeLakeError;
use crate::Position;

pub mod lazy;
pub mod nucleotide;
pub mod signal;

pub use nucleotide::{IndexedFasta, NucleotideSequences, Nucleotides};
pub use signal::{BigWigFile, SignalTracks};

/// A random-access source of nucleotide sequence, keyed by sequence name.
pub trait SequenceSource {
    /// The sequence names, in source order.
    fn references(&self) -> Vec<String>;

    /// The sequence lengths, in the same order as [`SequenceSource::references`].
    fn lengths(&self) -> Vec<Position>;

    /// Get the length of a particular sequence.
    fn get_sequence_length(&self, seqname: &str) -> Result<Position, GenomeLakeError> {
        self.references()
            .iter()
            .zip(self.lengths())
            .find(|(name, _)| *name == seqname)
            .map(|(_, length)| length)
            .ok_or(GenomeLakeError::MissingSequence(seqname.to_string()))
    }

    /// Fetch the nucleotides in `[start, end)` of sequence `seqname`.
    fn fetch(
        &mut self,
        seqname: &str,
        start: Position,
        end: Position,
    ) -> Result<Nucleotides, GenomeLakeError>;
}

/// A random-access source of per-basepair `f32` values, keyed by sequence name.
pub trait SignalSource {
    /// The sequence names and their lengths, in source order.
    fn chroms(&self) -> IndexMap<String, Position>;

    /// Fetch the values in `[start, end)` of sequence `seqname`. Positions without
    /// data are `NaN`.
    fn values(
        &mut self,
        seqname: &str,
        start: Position,
        end: Position,
    ) -> Result<Vec<f32>, GenomeLakeError>;
}
