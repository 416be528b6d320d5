use ndarray::ArrayViewMutD;
use std::path::{Path, PathBuf};

use super::{Extractor, Layout};
use crate::error::GenomeLakeError;
use crate::ranges::Interval;
use crate::store::{open_store, ChromArrays};

/// An [`Extractor`] over a pre-converted array store directory.
#[derive(Debug)]
pub struct ArrayExtractor {
    datafile: PathBuf,
    data: ChromArrays,
    layout: Layout,
}

impl ArrayExtractor {
    /// Open the store in `datafile`; see [`open_store`] for `in_memory`.
    pub fn new(datafile: impl Into<PathBuf>, in_memory: bool) -> Result<Self, GenomeLakeError> {
        let datafile = datafile.into();
        let data = open_store(&datafile, in_memory)?;
        Self::from_arrays(datafile, data)
    }

    /// Build an extractor over already-opened arrays. Every array must share the
    /// layout of the first.
    pub fn from_arrays(
        datafile: impl Into<PathBuf>,
        data: ChromArrays,
    ) -> Result<Self, GenomeLakeError> {
        let mut arrays = data.iter();
        let (_, first) = arrays.next().ok_or(GenomeLakeError::EmptyStore)?;
        let layout = Layout::from_shape(&first.shape())?;
        for (seqname, array) in arrays {
            let other = Layout::from_shape(&array.shape())?;
            if other != layout {
                return Err(GenomeLakeError::InconsistentLayout {
                    seqname: seqname.clone(),
                    expected: layout.to_string(),
                    actual: other.to_string(),
                });
            }
        }
        Ok(Self {
            datafile: datafile.into(),
            data,
            layout,
        })
    }

    pub fn datafile(&self) -> &Path {
        &self.datafile
    }

    pub fn arrays(&self) -> &ChromArrays {
        &self.data
    }

    /// True only when every array has been materialized in memory, so no file
    /// handle or memory map is shared by copies of this extractor.
    pub fn multiprocessing_safe(&self) -> bool {
        self.data.is_in_memory()
    }
}

impl Extractor for ArrayExtractor {
    fn layout(&self) -> Layout {
        self.layout
    }

    fn fill_row(
        &mut self,
        interval: &Interval,
        row: ArrayViewMutD<'_, f32>,
    ) -> Result<(), GenomeLakeError> {
        let array = self
            .data
            .get(&interval.chrom)
            .ok_or_else(|| GenomeLakeError::MissingSequence(interval.chrom.clone()))?;
        array.copy_rows_into(&interval.chrom, interval.start, interval.stop, row)
    }
}
