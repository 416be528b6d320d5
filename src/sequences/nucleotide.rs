//! Types and methods for working with per-basepair nucleotide sequence data.
//!
//! Currently this requires the [`noodles::fasta`] module, but their API is unstable
//! and may be a source of future pain.

use bytes::Bytes;
use indexmap::IndexMap;
use noodles::core::{Position as NoodlesPosition, Region};
use noodles::fasta::indexed_reader;
use noodles::fasta::{io::BufReadSeek, reader, record::Sequence, IndexedReader};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str;

use super::SequenceSource;
use crate::error::GenomeLakeError;
use crate::ranges::validate_range;
use crate::Position;

/// A newtype around raw nucleotide [`Bytes`], for making it more
/// display and other operations more convenient.
#[derive(Clone, Debug, PartialEq)]
pub struct Nucleotides(Bytes);

impl fmt::Display for Nucleotides {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl Deref for Nucleotides {
    type Target = Bytes;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&Sequence> for Nucleotides {
    fn from(sequence: &Sequence) -> Self {
        Nucleotides(Bytes::copy_from_slice(sequence.as_ref()))
    }
}

impl From<Vec<u8>> for Nucleotides {
    fn from(seq: Vec<u8>) -> Self {
        Nucleotides(Bytes::from(seq))
    }
}

impl From<String> for Nucleotides {
    fn from(s: String) -> Self {
        Nucleotides(Bytes::from(s.into_bytes()))
    }
}

impl<'a> From<&'a str> for Nucleotides {
    fn from(s: &'a str) -> Self {
        Nucleotides(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl Nucleotides {
    /// Get the length of the nucleotide sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return whether this is an empty object.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A cheap, reference-counted subsequence `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Nucleotides {
        Nucleotides(self.0.slice(start..end))
    }
}

fn length_to_position(seqname: &str, length: u64) -> Result<Position, GenomeLakeError> {
    Position::try_from(length).map_err(|_| {
        GenomeLakeError::InvalidGenomeFile(format!(
            "sequence '{}' of length {} exceeds the supported coordinate range",
            seqname, length
        ))
    })
}

/// [`NucleotideSequences`] for storing a whole genome's nucleotide sequence
/// data in-memory.
#[derive(Clone, Debug, Default)]
pub struct NucleotideSequences {
    data: IndexMap<String, Nucleotides>,
}

impl NucleotideSequences {
    /// Create a new in-memory set of sequences.
    pub fn new(data: IndexMap<String, Nucleotides>) -> Self {
        Self { data }
    }

    /// Load an entire FASTA file into memory, into a [`NucleotideSequences`] object.
    ///
    /// # Arguments
    /// * `filepath`: a path to the FASTA file.
    pub fn from_fasta(filepath: impl AsRef<Path>) -> Result<Self, GenomeLakeError> {
        let mut reader = reader::Builder.build_from_path(filepath)?;
        let mut data = IndexMap::new();
        for result in reader.records() {
            let record = result?;
            let name = String::from_utf8_lossy(record.definition().name()).into_owned();
            data.insert(name, Nucleotides::from(record.sequence()));
        }
        Ok(Self { data })
    }

    /// Retrieve an [`IndexMap`] of the sequence names and their lengths.
    pub fn seqlens(&self) -> Result<IndexMap<String, Position>, GenomeLakeError> {
        self.data
            .iter()
            .map(|(k, v)| Ok((k.clone(), length_to_position(k, v.len() as u64)?)))
            .collect()
    }
}

impl<S: Into<String>, N: Into<Nucleotides>> FromIterator<(S, N)> for NucleotideSequences {
    fn from_iter<I: IntoIterator<Item = (S, N)>>(iter: I) -> Self {
        let data = iter
            .into_iter()
            .map(|(name, seq)| (name.into(), seq.into()))
            .collect();
        Self { data }
    }
}

impl SequenceSource for NucleotideSequences {
    fn references(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn lengths(&self) -> Vec<Position> {
        self.data
            .values()
            .map(|seq| Position::try_from(seq.len()).unwrap_or(Position::MAX))
            .collect()
    }

    fn fetch(
        &mut self,
        seqname: &str,
        start: Position,
        end: Position,
    ) -> Result<Nucleotides, GenomeLakeError> {
        let seq = self
            .data
            .get(seqname)
            .ok_or(GenomeLakeError::MissingSequence(seqname.to_string()))?;
        let length = length_to_position(seqname, seq.len() as u64)?;
        validate_range(seqname, start, end, length)?;
        Ok(seq.slice(start as usize, end as usize))
    }
}

/// A nucleotide sequence source backed by an indexed (`.fai`) FASTA file.
///
/// Each fetch is a region query against the index, so nothing beyond the
/// requested region is held in memory.
pub struct IndexedFasta {
    filepath: PathBuf,
    seqlens: IndexMap<String, Position>,
    reader: IndexedReader<Box<dyn BufReadSeek>>,
}

impl fmt::Debug for IndexedFasta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedFasta")
            .field("filepath", &self.filepath)
            .field("seqlens", &self.seqlens)
            .finish_non_exhaustive()
    }
}

impl IndexedFasta {
    /// Open an indexed FASTA file; the index is expected at `<filepath>.fai`.
    pub fn open(filepath: impl Into<PathBuf>) -> Result<Self, GenomeLakeError> {
        let filepath = filepath.into();
        let reader = indexed_reader::Builder::default().build_from_path(&filepath)?;

        let seqlens = reader
            .index()
            .iter()
            .map(|r| {
                let name = String::from_utf8_lossy(r.name().as_ref()).into_owned();
                let length = length_to_position(&name, r.length())?;
                Ok((name, length))
            })
            .collect::<Result<IndexMap<_, _>, GenomeLakeError>>()?;

        Ok(Self {
            filepath,
            seqlens,
            reader,
        })
    }

    /// The path of the underlying FASTA file.
    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// Get an [`IndexMap`] of the sequence names and their lengths.
    pub fn seqlens(&self) -> &IndexMap<String, Position> {
        &self.seqlens
    }
}

impl SequenceSource for IndexedFasta {
    fn references(&self) -> Vec<String> {
        self.seqlens.keys().cloned().collect()
    }

    fn lengths(&self) -> Vec<Position> {
        self.seqlens.values().copied().collect()
    }

    fn get_sequence_length(&self, seqname: &str) -> Result<Position, GenomeLakeError> {
        self.seqlens
            .get(seqname)
            .copied()
            .ok_or(GenomeLakeError::MissingSequence(seqname.to_string()))
    }

    fn fetch(
        &mut self,
        seqname: &str,
        start: Position,
        end: Position,
    ) -> Result<Nucleotides, GenomeLakeError> {
        let length = self.get_sequence_length(seqname)?;
        validate_range(seqname, start, end, length)?;

        // noodles regions are 1-based and right-inclusive
        let invalid = || GenomeLakeError::InvalidGenomicRange(start, end);
        let region_start = NoodlesPosition::try_from(start as usize + 1).map_err(|_| invalid())?;
        let region_end = NoodlesPosition::try_from(end as usize).map_err(|_| invalid())?;
        let region = Region::new(seqname.as_bytes().to_vec(), region_start..=region_end);

        let record = self.reader.query(&region)?;
        let nucs: Nucleotides = record.sequence().into();
        let expected = (end - start) as usize;
        if nucs.len() != expected {
            return Err(GenomeLakeError::SequenceLengthMismatch {
                seqname: seqname.to_string(),
                expected,
                actual: nucs.len(),
            });
        }
        Ok(nucs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{write_test_fasta, TEST_SEQUENCES};

    #[test]
    fn test_nucleotide_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = write_test_fasta(dir.path()).unwrap();
        let reference = NucleotideSequences::from_fasta(&fasta).expect("could not load reference");

        assert_eq!(reference.references(), vec!["chr1", "chr2"]);
        assert_eq!(
            reference.lengths(),
            vec![TEST_SEQUENCES[0].1.len() as Position, TEST_SEQUENCES[1].1.len() as Position]
        );
        assert_eq!(*reference.seqlens().unwrap().get("chr1").unwrap(), 20);
    }

    #[test]
    fn test_in_memory_fetch() {
        let mut seqs: NucleotideSequences = [("chr1", "ACGTACGTAA")].into_iter().collect();
        assert_eq!(seqs.fetch("chr1", 2, 6).unwrap(), Nucleotides::from("GTAC"));
        assert!(matches!(
            seqs.fetch("chr1", 5, 11),
            Err(GenomeLakeError::InvalidGenomicRangeForSequence { .. })
        ));
        assert!(matches!(
            seqs.fetch("chrX", 0, 1),
            Err(GenomeLakeError::MissingSequence(_))
        ));
    }

    #[test]
    fn test_indexed_fasta_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = write_test_fasta(dir.path()).unwrap();
        let mut reference = IndexedFasta::open(&fasta).expect("could not open indexed FASTA");

        assert_eq!(reference.references(), vec!["chr1", "chr2"]);
        assert_eq!(reference.get_sequence_length("chr2").unwrap(), 20);

        let seq = reference.fetch("chr1", 0, 10).unwrap();
        assert_eq!(seq.to_string(), &TEST_SEQUENCES[0].1[0..10]);

        let seq = reference.fetch("chr2", 3, 8).unwrap();
        assert_eq!(seq.to_string(), &TEST_SEQUENCES[1].1[3..8]);

        // the whole sequence
        let seq = reference.fetch("chr2", 0, 20).unwrap();
        assert_eq!(seq.to_string(), TEST_SEQUENCES[1].1);
    }

    #[test]
    fn test_indexed_fasta_over_chrom_end() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = write_test_fasta(dir.path()).unwrap();
        let mut reference = IndexedFasta::open(&fasta).unwrap();
        assert!(matches!(
            reference.fetch("chr1", 1, 101),
            Err(GenomeLakeError::InvalidGenomicRangeForSequence { length: 20, .. })
        ));
    }
}
