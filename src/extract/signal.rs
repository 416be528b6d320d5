use ndarray::{ArrayView1, ArrayViewMutD};
use std::path::PathBuf;

use super::{Extractor, Layout};
use crate::error::GenomeLakeError;
use crate::ranges::Interval;
use crate::sequences::{BigWigFile, SignalSource};

/// An [`Extractor`] over values fetched directly from a [`SignalSource`].
///
/// Values are copied as the source returns them; positions without data stay `NaN`.
#[derive(Debug)]
pub struct SignalExtractor<S> {
    source: S,
}

/// A [`SignalExtractor`] over a bigWig file.
pub type BigwigExtractor = SignalExtractor<BigWigFile>;

impl<S: SignalSource> SignalExtractor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl BigwigExtractor {
    pub fn open(bigwig: impl Into<PathBuf>) -> Result<Self, GenomeLakeError> {
        Ok(Self::new(BigWigFile::open(bigwig)?))
    }
}

impl<S: SignalSource> Extractor for SignalExtractor<S> {
    fn layout(&self) -> Layout {
        Layout::Signal
    }

    fn fill_row(
        &mut self,
        interval: &Interval,
        mut row: ArrayViewMutD<'_, f32>,
    ) -> Result<(), GenomeLakeError> {
        let values = self
            .source
            .values(&interval.chrom, interval.start, interval.stop)?;
        if row.len() != values.len() {
            return Err(GenomeLakeError::SequenceLengthMismatch {
                seqname: interval.chrom.clone(),
                expected: row.len(),
                actual: values.len(),
            });
        }
        row.assign(&ArrayView1::from(values.as_slice()));
        Ok(())
    }
}
