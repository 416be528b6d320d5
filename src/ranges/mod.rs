//! Genomic intervals.
//!
//! All coordinates are 0-based and right-exclusive: an [`Interval`] covers
//! `[start, stop)` on its chromosome.

use std::fmt;
use std::str::FromStr;

use crate::{error::GenomeLakeError, Position};

/// Strand of an interval, as written in BED column six.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
    #[default]
    Unknown,
}

impl FromStr for Strand {
    type Err = GenomeLakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            "." => Ok(Strand::Unknown),
            other => Err(GenomeLakeError::InvalidStrand(other.to_string())),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
            Strand::Unknown => ".",
        };
        write!(f, "{}", symbol)
    }
}

/// A genomic interval `[start, stop)` on a named chromosome, with an optional strand.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    pub chrom: String,
    pub start: Position,
    pub stop: Position,
    pub strand: Strand,
}

impl Interval {
    /// Create a new unstranded interval.
    ///
    /// # Arguments
    /// * `chrom` - the chromosome (sequence) name.
    /// * `start` - the 0-based start position.
    /// * `stop` - the right-exclusive end position; must be greater than `start`.
    pub fn new(
        chrom: impl Into<String>,
        start: Position,
        stop: Position,
    ) -> Result<Self, GenomeLakeError> {
        Self::with_strand(chrom, start, stop, Strand::Unknown)
    }

    /// Create a new interval on the given strand.
    pub fn with_strand(
        chrom: impl Into<String>,
        start: Position,
        stop: Position,
        strand: Strand,
    ) -> Result<Self, GenomeLakeError> {
        if start >= stop {
            return Err(GenomeLakeError::InvalidGenomicRange(start, stop));
        }
        Ok(Self {
            chrom: chrom.into(),
            start,
            stop,
            strand,
        })
    }

    /// The number of basepairs covered.
    pub fn width(&self) -> Position {
        self.stop.saturating_sub(self.start)
    }

    /// Check that this interval is non-empty and lies within a sequence of `length`.
    pub fn validate(&self, length: Position) -> Result<(), GenomeLakeError> {
        validate_range(&self.chrom, self.start, self.stop, length)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.chrom, self.start, self.stop, self.strand)
    }
}

/// Validates whether a given range is valid for accessing a sequence of a given `length`.
///
/// # Arguments
///
/// * `seqname` - The sequence name, used in the error message.
/// * `start` - The 0-based start position.
/// * `end` - The right-exclusive end position.
/// * `length` - The length of the sequence.
pub fn validate_range(
    seqname: &str,
    start: Position,
    end: Position,
    length: Position,
) -> Result<(), GenomeLakeError> {
    if start >= end {
        return Err(GenomeLakeError::InvalidGenomicRange(start, end));
    }

    if end > length {
        return Err(GenomeLakeError::InvalidGenomicRangeForSequence {
            seqname: seqname.to_string(),
            start,
            end,
            length,
        });
    }
    Ok(())
}
