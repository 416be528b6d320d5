//! The array store read path: opening a store directory into a
//! chromosome-keyed set of array handles.

use indexmap::IndexMap;
use log::{debug, info};
use memmap2::Mmap;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, Slice};
use ndarray_npy::{read_npy, ViewNpyExt};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{Manifest, StoreMode};
use crate::error::GenomeLakeError;
use crate::ranges::validate_range;
use crate::tiled::TiledArray;
use crate::Position;

/// A memory-mapped `.npy` array of `f32`.
pub struct MappedArray {
    path: PathBuf,
    mmap: Mmap,
    shape: Vec<usize>,
}

impl std::fmt::Debug for MappedArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedArray")
            .field("path", &self.path)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl MappedArray {
    /// Memory-map the `.npy` file at `path`, parsing its header once.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GenomeLakeError> {
        let path = path.into();
        let file = File::open(&path)?;
        // SAFETY: store arrays are never modified after the manifest is written.
        let mmap = unsafe { Mmap::map(&file)? };
        let shape = ArrayViewD::<f32>::view_npy(&mmap[..])?.shape().to_vec();
        Ok(Self { path, mmap, shape })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// A zero-copy view into the mapped data.
    pub fn view(&self) -> Result<ArrayViewD<'_, f32>, GenomeLakeError> {
        Ok(ArrayViewD::<f32>::view_npy(&self.mmap[..])?)
    }
}

/// The handle to one chromosome's array, in one of the three storage states.
#[derive(Debug)]
pub enum ChromArray {
    /// Fully materialized in memory (either backend with `in_memory = true`).
    InMemory(ArrayD<f32>),
    /// A memory-mapped `.npy` file.
    Mapped(MappedArray),
    /// An on-disk tiled array, read tile by tile.
    Tiled(TiledArray),
}

impl ChromArray {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            ChromArray::InMemory(arr) => arr.shape().to_vec(),
            ChromArray::Mapped(arr) => arr.shape().to_vec(),
            ChromArray::Tiled(arr) => arr.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// The number of basepairs (the length of the leading axis).
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, ChromArray::InMemory(_))
    }

    /// Copy rows `[start, stop)` of the leading axis into `out`, which must have
    /// shape `(stop - start[, channels])`.
    ///
    /// Fails with a bounds error if the range is not within the array.
    pub fn copy_rows_into(
        &self,
        seqname: &str,
        start: Position,
        stop: Position,
        mut out: ArrayViewMutD<'_, f32>,
    ) -> Result<(), GenomeLakeError> {
        let length = Position::try_from(self.len()).unwrap_or(Position::MAX);
        validate_range(seqname, start, stop, length)?;

        let mut expected = self.shape();
        expected[0] = (stop - start) as usize;
        if out.shape() != expected.as_slice() {
            return Err(GenomeLakeError::OutputShapeMismatch {
                expected,
                actual: out.shape().to_vec(),
            });
        }

        let rows = Slice::from(start as usize..stop as usize);
        match self {
            ChromArray::InMemory(arr) => out.assign(&arr.slice_axis(Axis(0), rows)),
            ChromArray::Mapped(arr) => out.assign(&arr.view()?.slice_axis(Axis(0), rows)),
            ChromArray::Tiled(arr) => {
                out.assign(&arr.read_rows(start as usize, stop as usize)?)
            }
        }
        Ok(())
    }
}

/// An opened array store: the manifest and one [`ChromArray`] per chromosome, in
/// manifest order.
#[derive(Debug)]
pub struct ChromArrays {
    manifest: Manifest,
    arrays: IndexMap<String, ChromArray>,
    in_memory: bool,
}

impl ChromArrays {
    /// Assemble a store from already-open arrays, e.g. arrays built in memory.
    pub fn new(manifest: Manifest, arrays: IndexMap<String, ChromArray>) -> Self {
        let in_memory = arrays.values().all(ChromArray::is_in_memory);
        Self {
            manifest,
            arrays,
            in_memory,
        }
    }

    pub fn get(&self, seqname: &str) -> Option<&ChromArray> {
        self.arrays.get(seqname)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ChromArray> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Whether every array has been fully materialized in memory.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The chromosome names and lengths.
    pub fn seqlens(&self) -> IndexMap<String, Position> {
        self.arrays
            .iter()
            .map(|(name, arr)| {
                (
                    name.clone(),
                    Position::try_from(arr.len()).unwrap_or(Position::MAX),
                )
            })
            .collect()
    }
}

fn open_array(
    mode: StoreMode,
    path: &Path,
    in_memory: bool,
) -> Result<ChromArray, GenomeLakeError> {
    Ok(match (mode, in_memory) {
        (StoreMode::Numpy, true) => ChromArray::InMemory(read_npy::<_, ArrayD<f32>>(path)?),
        (StoreMode::Numpy, false) => ChromArray::Mapped(MappedArray::open(path)?),
        (StoreMode::Chunked, true) => ChromArray::InMemory(TiledArray::open(path)?.read_all()?),
        (StoreMode::Chunked, false) => ChromArray::Tiled(TiledArray::open(path)?),
    })
}

/// Open the array store in `dir`.
///
/// Every chromosome in the manifest must have its array on disk with exactly the
/// declared shape; this is checked for every array up front, whether or not
/// `in_memory` is set. With `in_memory`, every array is read fully into memory and
/// no file handles are kept open.
pub fn open_store(dir: impl AsRef<Path>, in_memory: bool) -> Result<ChromArrays, GenomeLakeError> {
    let dir = dir.as_ref();
    let manifest = Manifest::read(dir)?;
    let mode = manifest.mode()?;
    if let Some(encoding) = &manifest.encoding {
        encoding.check()?;
    }
    info!(
        "opening {} store {} ({} sequences, in_memory={})",
        mode,
        dir.display(),
        manifest.file_shapes.len(),
        in_memory
    );

    let mut arrays = IndexMap::with_capacity(manifest.file_shapes.len());
    for (seqname, declared) in manifest.file_shapes.iter() {
        let path = mode.array_path(dir, seqname);
        if !path.exists() {
            return Err(GenomeLakeError::MissingArrayFile {
                seqname: seqname.clone(),
                path,
            });
        }
        let array = open_array(mode, &path, in_memory)?;
        let actual = array.shape();
        if &actual != declared {
            return Err(GenomeLakeError::InconsistentShape {
                seqname: seqname.clone(),
                declared: declared.clone(),
                actual,
            });
        }
        debug!("opened {} with shape {:?}", seqname, actual);
        arrays.insert(seqname.clone(), array);
    }

    Ok(ChromArrays {
        manifest,
        arrays,
        in_memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{write_sequence_store, write_signal_store, WriteOptions};
    use crate::test_utilities::{test_sequences, test_signal_tracks};
    use ndarray::Array2;

    fn sequence_store(mode: StoreMode) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        let mut source = test_sequences();
        write_sequence_store(&mut source, "test", &output, &WriteOptions::new(mode)).unwrap();
        (dir, output)
    }

    #[test]
    fn test_open_store_all_states() {
        for mode in [StoreMode::Numpy, StoreMode::Chunked] {
            let (_dir, output) = sequence_store(mode);
            for in_memory in [true, false] {
                let store = open_store(&output, in_memory).unwrap();
                assert_eq!(store.len(), 2);
                assert_eq!(store.is_in_memory(), in_memory);
                let chr1 = store.get("chr1").unwrap();
                assert_eq!(chr1.shape(), vec![20, 4]);
                assert_eq!(chr1.is_in_memory(), in_memory);
                assert_eq!(*store.seqlens().get("chr2").unwrap(), 20);
            }
        }
    }

    #[test]
    fn test_copy_rows_into() {
        let (_dir, output) = sequence_store(StoreMode::Numpy);
        let store = open_store(&output, false).unwrap();
        let chr1 = store.get("chr1").unwrap();
        let mut out = Array2::<f32>::zeros((4, 4)).into_dyn();
        // chr1 is ACCGTACCGT...
        chr1.copy_rows_into("chr1", 0, 4, out.view_mut()).unwrap();
        assert_eq!(out.sum(), 4.0);
        assert_eq!(out[[0, 0]], 1.0);
        assert_eq!(out[[1, 1]], 1.0);
        assert_eq!(out[[3, 2]], 1.0);

        assert!(matches!(
            chr1.copy_rows_into("chr1", 18, 22, out.view_mut()),
            Err(GenomeLakeError::InvalidGenomicRangeForSequence { length: 20, .. })
        ));
        assert!(matches!(
            chr1.copy_rows_into("chr1", 0, 5, out.view_mut()),
            Err(GenomeLakeError::OutputShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_signal_store_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("signal");
        let mut source = test_signal_tracks();
        write_signal_store(&mut source, "tracks", &output, &WriteOptions::default()).unwrap();
        let store = open_store(&output, false).unwrap();
        assert_eq!(store.get("chr1").unwrap().shape(), vec![20]);
        assert_eq!(store.get("chr1").unwrap().ndim(), 1);
    }

    #[test]
    fn test_tampered_manifest_shape() {
        for mode in [StoreMode::Numpy, StoreMode::Chunked] {
            let (_dir, output) = sequence_store(mode);
            let mut manifest = Manifest::read(&output).unwrap();
            manifest.file_shapes.insert("chr2".to_string(), vec![21, 4]);
            manifest.write(&output).unwrap();
            for in_memory in [true, false] {
                match open_store(&output, in_memory) {
                    Err(GenomeLakeError::InconsistentShape {
                        seqname,
                        declared,
                        actual,
                    }) => {
                        assert_eq!(seqname, "chr2");
                        assert_eq!(declared, vec![21, 4]);
                        assert_eq!(actual, vec![20, 4]);
                    }
                    other => panic!("expected InconsistentShape, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_unsupported_store_type() {
        let (_dir, output) = sequence_store(StoreMode::Numpy);
        let mut manifest = Manifest::read(&output).unwrap();
        manifest.store_type = "array_zarr".to_string();
        manifest.write(&output).unwrap();
        assert!(matches!(
            open_store(&output, false),
            Err(GenomeLakeError::UnsupportedStoreType(_))
        ));
    }

    #[test]
    fn test_missing_array_file() {
        let (_dir, output) = sequence_store(StoreMode::Numpy);
        std::fs::remove_file(output.join("chr2.npy")).unwrap();
        assert!(matches!(
            open_store(&output, true),
            Err(GenomeLakeError::MissingArrayFile { .. })
        ));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open_store(dir.path(), false),
            Err(GenomeLakeError::IOError(_))
        ));
    }

    #[test]
    fn test_unsupported_encoding() {
        let (_dir, output) = sequence_store(StoreMode::Numpy);
        let mut manifest = Manifest::read(&output).unwrap();
        if let Some(encoding) = manifest.encoding.as_mut() {
            encoding.alphabet = "TGCA".to_string();
        }
        manifest.write(&output).unwrap();
        assert!(matches!(
            open_store(&output, false),
            Err(GenomeLakeError::UnsupportedEncoding(_))
        ));
    }
}
