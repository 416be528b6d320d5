//! One-hot encoding of nucleotide sequences.
//!
//! A sequence of length `n` encodes to an `(n, 4)` `f32` matrix. The four canonical
//! bases, in the order given by [`BASE_ORDER`], map to unit basis vectors (case
//! insensitive); every other byte (`N`, IUPAC ambiguity codes, gaps, garbage) maps
//! to the uniform vector `(0.25, 0.25, 0.25, 0.25)`.
//!
//! The channel order is part of the on-disk format: sequence stores record it in
//! their manifest as an [`Encoding`], and readers refuse stores with a different one.
//! Because the order is `A, C, G, T`, reversing the channel axis complements a base,
//! which [`reverse_complement`] relies on.

use ndarray::{s, Array2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::error::GenomeLakeError;

/// Number of channels in a one-hot encoded sequence.
pub const NUM_SEQ_CHARS: usize = 4;

/// Channel order of the one-hot encoding.
pub const BASE_ORDER: [u8; NUM_SEQ_CHARS] = *b"ACGT";

/// Version of the one-hot encoding, bumped whenever [`BASE_ORDER`] or the
/// ambiguity handling changes.
pub const ENCODING_VERSION: u32 = 1;

const UNIFORM: [f32; NUM_SEQ_CHARS] = [0.25; NUM_SEQ_CHARS];

const fn build_lookup_table() -> [[f32; NUM_SEQ_CHARS]; 256] {
    let mut table = [UNIFORM; 256];
    let mut i = 0;
    while i < NUM_SEQ_CHARS {
        let mut row = [0.0; NUM_SEQ_CHARS];
        row[i] = 1.0;
        table[BASE_ORDER[i] as usize] = row;
        table[BASE_ORDER[i].to_ascii_lowercase() as usize] = row;
        i += 1;
    }
    table
}

static ONE_HOT_TABLE: [[f32; NUM_SEQ_CHARS]; 256] = build_lookup_table();

/// The one-hot row for a single nucleotide byte.
#[inline]
pub fn encode_base(base: u8) -> &'static [f32; NUM_SEQ_CHARS] {
    &ONE_HOT_TABLE[base as usize]
}

/// One-hot encode a nucleotide sequence into a new `(seq.len(), 4)` matrix.
///
/// # Examples
///
/// ```
/// use genomelake::encoding::one_hot_encode;
///
/// let encoded = one_hot_encode(b"ACGTN");
/// assert_eq!(encoded.shape(), &[5, 4]);
/// assert_eq!(encoded.row(2).to_vec(), vec![0.0, 0.0, 1.0, 0.0]);
/// assert_eq!(encoded.row(4).to_vec(), vec![0.25; 4]);
/// ```
pub fn one_hot_encode(seq: &[u8]) -> Array2<f32> {
    let mut out = Array2::zeros((seq.len(), NUM_SEQ_CHARS));
    fill_rows(seq, out.view_mut());
    out
}

/// One-hot encode a nucleotide sequence into an existing `(seq.len(), 4)` view.
///
/// Fails with [`GenomeLakeError::OutputShapeMismatch`] if `out` does not have
/// exactly that shape.
pub fn one_hot_encode_into(seq: &[u8], out: ArrayViewMut2<f32>) -> Result<(), GenomeLakeError> {
    let expected = [seq.len(), NUM_SEQ_CHARS];
    if out.shape() != expected {
        return Err(GenomeLakeError::OutputShapeMismatch {
            expected: expected.to_vec(),
            actual: out.shape().to_vec(),
        });
    }
    fill_rows(seq, out);
    Ok(())
}

fn fill_rows(seq: &[u8], mut out: ArrayViewMut2<f32>) {
    if let Some(flat) = out.as_slice_mut() {
        for (chunk, &base) in flat.chunks_exact_mut(NUM_SEQ_CHARS).zip(seq) {
            chunk.copy_from_slice(encode_base(base));
        }
    } else {
        for (mut row, &base) in out.rows_mut().into_iter().zip(seq) {
            for (cell, &value) in row.iter_mut().zip(encode_base(base)) {
                *cell = value;
            }
        }
    }
}

/// Reverse complement a one-hot encoded `(width, 4)` block in place, by reversing
/// both the position and channel axes.
pub fn reverse_complement(mut block: ArrayViewMut2<f32>) {
    let flipped = block.slice(s![..;-1, ..;-1]).to_owned();
    block.assign(&flipped);
}

/// The encoding recorded in a sequence store manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    pub alphabet: String,
    pub version: u32,
}

impl Encoding {
    /// The encoding this build of the library writes and reads.
    pub fn current() -> Self {
        Self {
            alphabet: String::from_utf8_lossy(&BASE_ORDER).into_owned(),
            version: ENCODING_VERSION,
        }
    }

    /// Check that a stored encoding matches [`Encoding::current`].
    pub fn check(&self) -> Result<(), GenomeLakeError> {
        let current = Self::current();
        if *self != current {
            return Err(GenomeLakeError::UnsupportedEncoding(format!(
                "store was written with alphabet {} (version {}), this library reads {} (version {})",
                self.alphabet, self.version, current.alphabet, current.version
            )));
        }
        Ok(())
    }
}
