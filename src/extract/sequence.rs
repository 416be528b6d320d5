use ndarray::{ArrayViewMutD, Ix2};
use std::path::PathBuf;

use super::{Extractor, Layout};
use crate::encoding::{one_hot_encode_into, reverse_complement, NUM_SEQ_CHARS};
use crate::error::GenomeLakeError;
use crate::ranges::{Interval, Strand};
use crate::sequences::{IndexedFasta, SequenceSource};

/// An [`Extractor`] that one-hot encodes sequence fetched directly from a
/// [`SequenceSource`].
///
/// With `use_strand` set, intervals on [`Strand::Reverse`] are reverse complemented.
#[derive(Debug)]
pub struct SequenceExtractor<S> {
    source: S,
    use_strand: bool,
}

/// A [`SequenceExtractor`] over an indexed FASTA file.
pub type FastaExtractor = SequenceExtractor<IndexedFasta>;

impl<S: SequenceSource> SequenceExtractor<S> {
    pub fn new(source: S, use_strand: bool) -> Self {
        Self { source, use_strand }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn use_strand(&self) -> bool {
        self.use_strand
    }
}

impl FastaExtractor {
    /// Open an indexed FASTA file (with its `.fai` next to it).
    pub fn open(fasta: impl Into<PathBuf>, use_strand: bool) -> Result<Self, GenomeLakeError> {
        Ok(Self::new(IndexedFasta::open(fasta)?, use_strand))
    }
}

impl<S: SequenceSource> Extractor for SequenceExtractor<S> {
    fn layout(&self) -> Layout {
        Layout::Channels(NUM_SEQ_CHARS)
    }

    fn fill_row(
        &mut self,
        interval: &Interval,
        row: ArrayViewMutD<'_, f32>,
    ) -> Result<(), GenomeLakeError> {
        let seq = self
            .source
            .fetch(&interval.chrom, interval.start, interval.stop)?;
        let mut row = row.into_dimensionality::<Ix2>()?;
        one_hot_encode_into(&seq, row.view_mut())?;
        if self.use_strand && interval.strand == Strand::Reverse {
            reverse_complement(row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::one_hot_encode;
    use crate::sequences::NucleotideSequences;
    use crate::test_utilities::{test_intervals, write_test_fasta, TEST_SEQUENCES};
    use ndarray::Axis;

    #[test]
    fn test_fasta_extract() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = write_test_fasta(dir.path()).unwrap();
        let mut extractor = FastaExtractor::open(&fasta, false).unwrap();

        let out = extractor.extract(&test_intervals(), None).unwrap();
        assert_eq!(out.shape(), &[2, 10, 4]);
        for (i, (_, seq)) in TEST_SEQUENCES.iter().enumerate() {
            let expected = one_hot_encode(&seq.as_bytes()[0..10]);
            assert_eq!(out.index_axis(Axis(0), i), expected.into_dyn());
        }
    }

    #[test]
    fn test_reverse_strand() {
        let source: NucleotideSequences = [("chr1", "AACGN")].into_iter().collect();
        let interval = Interval::with_strand("chr1", 0, 5, Strand::Reverse).unwrap();

        let mut stranded = SequenceExtractor::new(source.clone(), true);
        let out = stranded.extract(&[interval.clone()], None).unwrap();
        let expected = one_hot_encode(b"NCGTT");
        assert_eq!(out.index_axis(Axis(0), 0), expected.into_dyn());

        // strand is ignored unless use_strand is set
        let mut unstranded = SequenceExtractor::new(source, false);
        let out = unstranded.extract(&[interval], None).unwrap();
        assert_eq!(out.index_axis(Axis(0), 0), one_hot_encode(b"AACGN").into_dyn());
    }

    #[test]
    fn test_over_chrom_end() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = write_test_fasta(dir.path()).unwrap();
        let mut extractor = FastaExtractor::open(&fasta, false).unwrap();
        let intervals = vec![
            Interval::new("chr1", 0, 10).unwrap(),
            Interval::new("chr1", 15, 25).unwrap(),
        ];
        assert!(matches!(
            extractor.extract(&intervals, None),
            Err(GenomeLakeError::InvalidGenomicRangeForSequence { .. })
        ));
    }
}
