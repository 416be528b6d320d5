//! Per-basepair numeric signal sources: bigWig files and in-memory tracks.

use bigtools::BigWigRead;
use indexmap::IndexMap;
use ndarray::Array1;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::SignalSource;
use crate::error::GenomeLakeError;
use crate::ranges::validate_range;
use crate::Position;

/// A signal source backed by a bigWig file, read through [`bigtools`].
///
/// Positions not covered by any bigWig entry are returned as `NaN`.
pub struct BigWigFile {
    filepath: PathBuf,
    seqlens: IndexMap<String, Position>,
    reader: BigWigRead<File>,
}

impl fmt::Debug for BigWigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigWigFile")
            .field("filepath", &self.filepath)
            .field("seqlens", &self.seqlens)
            .finish_non_exhaustive()
    }
}

impl BigWigFile {
    /// Open a bigWig file.
    pub fn open(filepath: impl Into<PathBuf>) -> Result<Self, GenomeLakeError> {
        let filepath = filepath.into();
        let file = File::open(&filepath)?;
        let reader = BigWigRead::open(file).map_err(|e| {
            GenomeLakeError::SignalTrackError(format!(
                "could not open bigWig file {}: {}",
                filepath.display(),
                e
            ))
        })?;
        let seqlens = reader
            .chroms()
            .iter()
            .map(|chrom| (chrom.name.clone(), chrom.length))
            .collect();
        Ok(Self {
            filepath,
            seqlens,
            reader,
        })
    }

    /// The path of the underlying bigWig file.
    pub fn filepath(&self) -> &Path {
        &self.filepath
    }
}

impl SignalSource for BigWigFile {
    fn chroms(&self) -> IndexMap<String, Position> {
        self.seqlens.clone()
    }

    fn values(
        &mut self,
        seqname: &str,
        start: Position,
        end: Position,
    ) -> Result<Vec<f32>, GenomeLakeError> {
        let length = *self
            .seqlens
            .get(seqname)
            .ok_or(GenomeLakeError::MissingSequence(seqname.to_string()))?;
        validate_range(seqname, start, end, length)?;
        self.reader.values(seqname, start, end).map_err(|e| {
            GenomeLakeError::SignalTrackError(format!(
                "could not read {}:{}-{} from {}: {}",
                seqname,
                start,
                end,
                self.filepath.display(),
                e
            ))
        })
    }
}

/// A one-dimensional `f32` per-basepair container, held in memory.
///
/// # Examples
///
/// ```
/// use genomelake::sequences::{SignalSource, SignalTracks};
/// use ndarray::array;
///
/// let mut tracks: SignalTracks = [("chr1", array![0.5, 1.0, f32::NAN])].into_iter().collect();
/// assert_eq!(tracks.values("chr1", 0, 2).unwrap(), vec![0.5, 1.0]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SignalTracks {
    data: IndexMap<String, Array1<f32>>,
}

impl SignalTracks {
    /// Create a new in-memory per-basepair signal container.
    pub fn new(data: IndexMap<String, Array1<f32>>) -> Self {
        Self { data }
    }
}

impl<S: Into<String>> FromIterator<(S, Array1<f32>)> for SignalTracks {
    fn from_iter<I: IntoIterator<Item = (S, Array1<f32>)>>(iter: I) -> Self {
        let data = iter
            .into_iter()
            .map(|(name, track)| (name.into(), track))
            .collect();
        Self { data }
    }
}

impl SignalSource for SignalTracks {
    fn chroms(&self) -> IndexMap<String, Position> {
        self.data
            .iter()
            .map(|(name, track)| {
                (
                    name.clone(),
                    Position::try_from(track.len()).unwrap_or(Position::MAX),
                )
            })
            .collect()
    }

    fn values(
        &mut self,
        seqname: &str,
        start: Position,
        end: Position,
    ) -> Result<Vec<f32>, GenomeLakeError> {
        let track = self
            .data
            .get(seqname)
            .ok_or(GenomeLakeError::MissingSequence(seqname.to_string()))?;
        let length = Position::try_from(track.len()).unwrap_or(Position::MAX);
        validate_range(seqname, start, end, length)?;
        Ok(track
            .slice(ndarray::s![start as usize..end as usize])
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{test_signal_tracks, write_test_bigwig};

    #[test]
    fn test_signal_tracks_chroms() {
        let tracks = test_signal_tracks();
        let chroms = tracks.chroms();
        assert_eq!(chroms.keys().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
        assert_eq!(*chroms.get("chr1").unwrap(), 20);
    }

    #[test]
    fn test_signal_tracks_values() {
        let mut tracks = test_signal_tracks();
        assert_eq!(tracks.values("chr1", 0, 3).unwrap(), vec![0.1; 3]);
        let chr2 = tracks.values("chr2", 0, 10).unwrap();
        assert_eq!(chr2[0], 0.0);
        assert_eq!(&chr2[1..], &[9.0; 9]);
    }

    #[test]
    fn test_signal_tracks_out_of_bounds() {
        let mut tracks = test_signal_tracks();
        assert!(matches!(
            tracks.values("chr1", 15, 25),
            Err(GenomeLakeError::InvalidGenomicRangeForSequence { .. })
        ));
        assert!(matches!(
            tracks.values("chr3", 0, 1),
            Err(GenomeLakeError::MissingSequence(_))
        ));
    }

    #[test]
    fn test_bigwig_file_matches_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_bigwig(dir.path()).unwrap();
        let mut bigwig = BigWigFile::open(&path).unwrap();
        let mut tracks = test_signal_tracks();
        assert_eq!(bigwig.filepath(), path.as_path());
        assert_eq!(bigwig.chroms(), tracks.chroms());

        assert_eq!(bigwig.values("chr1", 3, 8).unwrap(), vec![0.1; 5]);
        let values = bigwig.values("chr2", 0, 20).unwrap();
        let expected = tracks.values("chr2", 0, 20).unwrap();
        // positions without data are NaN in both
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&values), bits(&expected));
        assert!(values[15].is_nan());
    }

    #[test]
    fn test_bigwig_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut bigwig = BigWigFile::open(write_test_bigwig(dir.path()).unwrap()).unwrap();
        assert!(matches!(
            bigwig.values("chr1", 15, 21),
            Err(GenomeLakeError::InvalidGenomicRangeForSequence { .. })
        ));
        assert!(matches!(
            bigwig.values("chrX", 0, 1),
            Err(GenomeLakeError::MissingSequence(_))
        ));
    }

    #[test]
    fn test_bigwig_open_missing_file() {
        assert!(BigWigFile::open("does/not/exist.bw").is_err());
    }

    #[test]
    fn test_bigwig_open_not_a_bigwig() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.bw");
        std::fs::write(&path, b"definitely not a bigwig").unwrap();
        assert!(matches!(
            BigWigFile::open(&path),
            Err(GenomeLakeError::SignalTrackError(_))
        ));
    }
}
