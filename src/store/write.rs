//! The array store write path: converting a [`SequenceSource`] or
//! [`SignalSource`] into a store directory.
//!
//! Each chromosome is fetched whole, converted (one-hot encoded, or `NaN` filtered),
//! and written as its own array. The manifest goes in only after every array has
//! been flushed and closed, so an interrupted conversion leaves a directory with no
//! manifest, which [`open_store`](super::open_store) refuses to open.

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayViewD};
use ndarray_npy::WriteNpyExt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use super::{Manifest, StoreMode, WriteOptions};
use crate::encoding::{one_hot_encode, Encoding, NUM_SEQ_CHARS};
use crate::error::GenomeLakeError;
use crate::sequences::{BigWigFile, IndexedFasta, SequenceSource, SignalSource};
use crate::tiled::write_tiled;

/// Create the output directory, failing if it already exists unless `overwrite`
/// is set, in which case the existing directory or file is removed first.
pub fn prepare_output_dir(dir: &Path, overwrite: bool) -> Result<(), GenomeLakeError> {
    if dir.exists() {
        if !overwrite {
            return Err(GenomeLakeError::OutputExists(dir.to_path_buf()));
        }
        debug!("clearing existing output {}", dir.display());
        if dir.is_dir() {
            fs::remove_dir_all(dir)?;
        } else {
            fs::remove_file(dir)?;
        }
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn write_array(
    arr: ArrayViewD<'_, f32>,
    dir: &Path,
    seqname: &str,
    mode: StoreMode,
) -> Result<(), GenomeLakeError> {
    let path = mode.array_path(dir, seqname);
    match mode {
        StoreMode::Numpy => {
            let mut writer = BufWriter::new(File::create(&path)?);
            arr.write_npy(&mut writer)?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        }
        StoreMode::Chunked => {
            write_tiled(arr.view(), &path, false)?;
        }
    }
    debug!("wrote {} array {:?} to {}", seqname, arr.shape(), path.display());
    Ok(())
}

/// Write every sequence of `source`, one-hot encoded, into a new store at `output_dir`.
///
/// # Arguments
/// * `source` - the nucleotide sequence source.
/// * `source_name` - recorded as the manifest `source` (usually the source path).
/// * `output_dir` - the store directory to create.
/// * `options` - backend and overwrite behavior; `nan_as_zero` is ignored.
pub fn write_sequence_store<S: SequenceSource>(
    source: &mut S,
    source_name: &str,
    output_dir: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<Manifest, GenomeLakeError> {
    let output_dir = output_dir.as_ref();
    prepare_output_dir(output_dir, options.overwrite)?;

    let references = source.references();
    info!(
        "writing {} sequences from {} to {} ({})",
        references.len(),
        source_name,
        output_dir.display(),
        options.mode
    );

    let mut manifest = Manifest::new(options.mode, source_name);
    manifest.encoding = Some(Encoding::current());
    for (seqname, length) in references.iter().zip(source.lengths()) {
        let data = if length == 0 {
            Array2::zeros((0, NUM_SEQ_CHARS))
        } else {
            let seq = source.fetch(seqname, 0, length)?;
            one_hot_encode(&seq)
        };
        write_array(data.view().into_dyn(), output_dir, seqname, options.mode)?;
        manifest
            .file_shapes
            .insert(seqname.clone(), data.shape().to_vec());
    }

    manifest.write(output_dir)?;
    Ok(manifest)
}

/// Write every chromosome of `source` into a new store at `output_dir`.
///
/// With `options.nan_as_zero` set, positions without data (`NaN`) are stored as `0.0`.
pub fn write_signal_store<S: SignalSource>(
    source: &mut S,
    source_name: &str,
    output_dir: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<Manifest, GenomeLakeError> {
    let output_dir = output_dir.as_ref();
    prepare_output_dir(output_dir, options.overwrite)?;

    let chroms = source.chroms();
    info!(
        "writing {} signal tracks from {} to {} ({})",
        chroms.len(),
        source_name,
        output_dir.display(),
        options.mode
    );

    let mut manifest = Manifest::new(options.mode, source_name);
    for (seqname, &length) in chroms.iter() {
        let mut values = if length == 0 {
            Vec::new()
        } else {
            source.values(seqname, 0, length)?
        };
        if options.nan_as_zero {
            let mut replaced = 0usize;
            for value in values.iter_mut().filter(|v| v.is_nan()) {
                *value = 0.0;
                replaced += 1;
            }
            if replaced > 0 {
                warn!("{}: replaced {} NaN values with 0", seqname, replaced);
            }
        }
        let data = Array1::from(values);
        write_array(data.view().into_dyn(), output_dir, seqname, options.mode)?;
        manifest
            .file_shapes
            .insert(seqname.clone(), data.shape().to_vec());
    }

    manifest.write(output_dir)?;
    Ok(manifest)
}

/// Convert an indexed FASTA file into a one-hot sequence store.
pub fn extract_fasta_to_store(
    fasta: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<Manifest, GenomeLakeError> {
    let fasta = fasta.as_ref();
    let mut source = IndexedFasta::open(fasta)?;
    write_sequence_store(
        &mut source,
        &fasta.to_string_lossy(),
        output_dir,
        options,
    )
}

/// Convert a bigWig file into a signal store.
pub fn extract_bigwig_to_store(
    bigwig: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<Manifest, GenomeLakeError> {
    let bigwig = bigwig.as_ref();
    let mut source = BigWigFile::open(bigwig)?;
    write_signal_store(
        &mut source,
        &bigwig.to_string_lossy(),
        output_dir,
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::METADATA_FILENAME;
    use crate::sequences::{NucleotideSequences, Nucleotides};
    use crate::test_utilities::{
        test_sequences, test_signal_tracks, write_test_bigwig, write_test_fasta,
    };
    use crate::Position;

    /// Serves the first sequence, then fails on every later fetch.
    struct FailingSource {
        inner: NucleotideSequences,
        fetches: usize,
    }

    impl SequenceSource for FailingSource {
        fn references(&self) -> Vec<String> {
            self.inner.references()
        }

        fn lengths(&self) -> Vec<Position> {
            self.inner.lengths()
        }

        fn fetch(
            &mut self,
            seqname: &str,
            start: Position,
            end: Position,
        ) -> Result<Nucleotides, GenomeLakeError> {
            self.fetches += 1;
            if self.fetches > 1 {
                return Err(GenomeLakeError::MissingSequence(seqname.to_string()));
            }
            self.inner.fetch(seqname, start, end)
        }
    }

    #[test]
    fn test_write_sequence_store_numpy() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        let mut source = test_sequences();
        let options = WriteOptions::new(StoreMode::Numpy);
        let manifest = write_sequence_store(&mut source, "test", &output, &options).unwrap();

        assert_eq!(manifest.store_type, "array_numpy");
        assert_eq!(manifest.encoding, Some(Encoding::current()));
        assert_eq!(manifest.file_shapes.get("chr1"), Some(&vec![20, 4]));
        assert!(output.join("chr1.npy").is_file());
        assert!(output.join("chr2.npy").is_file());
        assert_eq!(Manifest::read(&output).unwrap(), manifest);
    }

    #[test]
    fn test_write_sequence_store_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        let fasta = write_test_fasta(dir.path()).unwrap();
        let manifest = extract_fasta_to_store(&fasta, &output, &WriteOptions::default()).unwrap();
        assert_eq!(manifest.store_type, "array_bcolz");
        assert_eq!(manifest.source, fasta.to_string_lossy());
        assert!(output.join("chr1").is_dir());
    }

    #[test]
    fn test_write_signal_store_nan_handling() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = test_signal_tracks();

        let output = dir.path().join("zeroed");
        let options = WriteOptions::new(StoreMode::Numpy);
        write_signal_store(&mut source, "tracks", &output, &options).unwrap();
        let chr2: Array1<f32> = ndarray_npy::read_npy(output.join("chr2.npy")).unwrap();
        assert!(chr2.iter().all(|v| !v.is_nan()));
        assert_eq!(chr2[19], 0.0);

        let output = dir.path().join("raw");
        let options = WriteOptions::new(StoreMode::Numpy).nan_as_zero(false);
        let manifest = write_signal_store(&mut source, "tracks", &output, &options).unwrap();
        assert_eq!(manifest.file_shapes.get("chr2"), Some(&vec![20]));
        assert!(manifest.encoding.is_none());
        let chr2: Array1<f32> = ndarray_npy::read_npy(output.join("chr2.npy")).unwrap();
        assert!(chr2[19].is_nan());
    }

    #[test]
    fn test_existing_output_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        fs::create_dir_all(&output).unwrap();
        let sentinel = output.join("keep.txt");
        fs::write(&sentinel, b"untouched").unwrap();

        let mut source = test_sequences();
        let result = write_sequence_store(&mut source, "test", &output, &WriteOptions::default());
        assert!(matches!(result, Err(GenomeLakeError::OutputExists(_))));
        assert_eq!(fs::read(&sentinel).unwrap(), b"untouched");
        assert!(!output.join(METADATA_FILENAME).exists());
    }

    #[test]
    fn test_existing_output_with_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        fs::create_dir_all(&output).unwrap();
        let stale = output.join("stale.npy");
        fs::write(&stale, b"old").unwrap();

        let mut source = test_sequences();
        let options = WriteOptions::default().overwrite(true);
        write_sequence_store(&mut source, "test", &output, &options).unwrap();
        assert!(!stale.exists());
        assert!(output.join(METADATA_FILENAME).is_file());
    }

    #[test]
    fn test_existing_file_with_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        fs::write(&output, b"not a directory").unwrap();

        let mut source = test_sequences();
        let result = write_sequence_store(&mut source, "test", &output, &WriteOptions::default());
        assert!(matches!(result, Err(GenomeLakeError::OutputExists(_))));

        let options = WriteOptions::default().overwrite(true);
        write_sequence_store(&mut source, "test", &output, &options).unwrap();
        assert!(output.is_dir());
        assert!(output.join(METADATA_FILENAME).is_file());
    }

    #[test]
    fn test_empty_sequence_every_mode() {
        let dir = tempfile::tempdir().unwrap();
        for mode in [StoreMode::Numpy, StoreMode::Chunked] {
            let output = dir.path().join(format!("store_{:?}", mode));
            let mut source: NucleotideSequences =
                [("chr1", "ACGT"), ("chrEmpty", "")].into_iter().collect();
            let manifest =
                write_sequence_store(&mut source, "test", &output, &WriteOptions::new(mode))
                    .unwrap();
            assert_eq!(manifest.file_shapes.get("chrEmpty"), Some(&vec![0, 4]));

            let store = crate::store::open_store(&output, false).unwrap();
            assert_eq!(store.get("chrEmpty").unwrap().shape(), vec![0, 4]);
            assert_eq!(store.get("chr1").unwrap().shape(), vec![4, 4]);
        }
    }

    #[test]
    fn test_failed_conversion_leaves_no_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("store");
        let mut source = FailingSource {
            inner: test_sequences(),
            fetches: 0,
        };
        let result = write_sequence_store(&mut source, "test", &output, &WriteOptions::default());
        assert!(matches!(result, Err(GenomeLakeError::MissingSequence(_))));
        assert!(output.join("chr1").is_dir());
        assert!(!output.join(METADATA_FILENAME).exists());
    }

    #[test]
    fn test_extract_bigwig_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let bigwig = write_test_bigwig(dir.path()).unwrap();
        let output = dir.path().join("store");
        let options = WriteOptions::new(StoreMode::Numpy);
        let manifest = extract_bigwig_to_store(&bigwig, &output, &options).unwrap();
        assert_eq!(manifest.source, bigwig.to_string_lossy());
        assert_eq!(manifest.file_shapes.get("chr1"), Some(&vec![20]));
        assert!(manifest.encoding.is_none());

        let chr2: Array1<f32> = ndarray_npy::read_npy(output.join("chr2.npy")).unwrap();
        assert_eq!(chr2[0], 0.0);
        assert_eq!(chr2[14], 9.0);
        // uncovered positions are zeroed
        assert!(chr2.iter().skip(15).all(|&v| v == 0.0));
    }
}
