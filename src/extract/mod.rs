//! Extracting batches of equal-width [`Interval`]s into dense tensors.
//!
//! Every [`Extractor`] produces an `(num_intervals, width)` tensor for scalar signal
//! or an `(num_intervals, width, channels)` tensor for one-hot sequence. There are
//! three implementations:
//!
//!  - [`ArrayExtractor`]: slices a pre-converted array store (see [`crate::store`]).
//!  - [`SequenceExtractor`]: fetches and one-hot encodes from a [`SequenceSource`],
//!    e.g. an indexed FASTA file ([`FastaExtractor`]).
//!  - [`SignalExtractor`]: fetches values from a [`SignalSource`], e.g. a bigWig
//!    file ([`BigwigExtractor`]).
//!
//! A batch is rejected as a whole: an empty batch, a width mismatch, a
//! caller-supplied output of the wrong shape, or any interval out of its
//! chromosome's bounds fails the call.
//!
//! [`SequenceSource`]: crate::sequences::SequenceSource
//! [`SignalSource`]: crate::sequences::SignalSource

use ndarray::{ArrayD, ArrayViewMutD, Axis, IxDyn};
use std::fmt;

use crate::error::GenomeLakeError;
use crate::ranges::Interval;

pub mod array;
pub mod sequence;
pub mod signal;

pub use array::ArrayExtractor;
pub use sequence::{FastaExtractor, SequenceExtractor};
pub use signal::{BigwigExtractor, SignalExtractor};

/// The per-position layout of an extractor's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// One value per position, from 1D arrays.
    Signal,
    /// A fixed number of channels per position, from 2D arrays.
    Channels(usize),
}

impl Layout {
    /// The layout of arrays with the given shape.
    pub fn from_shape(shape: &[usize]) -> Result<Self, GenomeLakeError> {
        match shape {
            [_] => Ok(Layout::Signal),
            [_, channels] => Ok(Layout::Channels(*channels)),
            other => Err(GenomeLakeError::UnsupportedRank(other.len())),
        }
    }

    /// The tensor shape for `num_intervals` intervals of `width` basepairs.
    pub fn output_shape(&self, num_intervals: usize, width: usize) -> Vec<usize> {
        match self {
            Layout::Signal => vec![num_intervals, width],
            Layout::Channels(channels) => vec![num_intervals, width, *channels],
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Layout::Signal => write!(f, "(length,)"),
            Layout::Channels(channels) => write!(f, "(length, {})", channels),
        }
    }
}

/// The common width of a batch of intervals.
pub fn batch_width(intervals: &[Interval]) -> Result<usize, GenomeLakeError> {
    let first = intervals.first().ok_or(GenomeLakeError::EmptyIntervals)?;
    let expected = first.width() as usize;
    for (index, interval) in intervals.iter().enumerate().skip(1) {
        let width = interval.width() as usize;
        if width != expected {
            return Err(GenomeLakeError::MixedWidths {
                index,
                width,
                expected,
            });
        }
    }
    Ok(expected)
}

/// Check a caller-supplied output tensor against the batch, or allocate a
/// zero-filled one.
pub fn check_or_create_output(
    layout: Layout,
    intervals: &[Interval],
    out: Option<ArrayD<f32>>,
) -> Result<ArrayD<f32>, GenomeLakeError> {
    let width = batch_width(intervals)?;
    let expected = layout.output_shape(intervals.len(), width);
    match out {
        Some(out) if out.shape() != expected.as_slice() => {
            Err(GenomeLakeError::OutputShapeMismatch {
                expected,
                actual: out.shape().to_vec(),
            })
        }
        Some(out) => Ok(out),
        None => Ok(ArrayD::zeros(IxDyn(&expected))),
    }
}

/// A source of dense per-basepair tensors for batches of intervals.
pub trait Extractor {
    /// The per-position layout this extractor produces.
    fn layout(&self) -> Layout;

    /// Write the data for one interval into its output row, of shape `(width,)`
    /// or `(width, channels)`.
    fn fill_row(
        &mut self,
        interval: &Interval,
        row: ArrayViewMutD<'_, f32>,
    ) -> Result<(), GenomeLakeError>;

    /// Extract a batch of equal-width intervals.
    ///
    /// # Arguments
    /// * `intervals` - the batch; every interval must have the width of the first.
    /// * `out` - an optional pre-allocated output, which must have exactly the
    ///   batch's output shape. It is filled and returned.
    fn extract(
        &mut self,
        intervals: &[Interval],
        out: Option<ArrayD<f32>>,
    ) -> Result<ArrayD<f32>, GenomeLakeError> {
        let mut out = check_or_create_output(self.layout(), intervals, out)?;
        for (index, interval) in intervals.iter().enumerate() {
            self.fill_row(interval, out.index_axis_mut(Axis(0), index))?;
        }
        Ok(out)
    }
}
