//! Reading extraction intervals from BED files.
//!
//! Only the first three columns (sequence name, start and end) are required; the
//! strand is taken from column six when present. Lines starting with `#`, and
//! `track`/`browser` header lines, are skipped.

use csv::{Reader, ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use super::file::is_gzipped_file;
use crate::error::GenomeLakeError;
use crate::ranges::{Interval, Strand};
use crate::Position;

const STRAND_COLUMN: usize = 5;

/// Build a TSV reader which ignores comment lines and works on gzip-compressed files.
pub fn build_tsv_reader(
    filepath: impl Into<PathBuf>,
) -> Result<Reader<Box<dyn Read>>, GenomeLakeError> {
    let filepath = filepath.into();
    let file = File::open(&filepath)?;
    let is_gzipped = is_gzipped_file(&filepath)?;
    let stream: Box<dyn Read> = if is_gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(stream);
    Ok(reader)
}

/// An iterator over the [`Interval`]s in a BED file.
pub struct BedIntervalIterator {
    inner: csv::StringRecordsIntoIter<Box<dyn Read>>,
}

impl std::fmt::Debug for BedIntervalIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedIntervalIterator").finish_non_exhaustive()
    }
}

impl BedIntervalIterator {
    pub fn new(filepath: impl Into<PathBuf>) -> Result<Self, GenomeLakeError> {
        let reader = build_tsv_reader(filepath)?;
        Ok(Self {
            inner: reader.into_records(),
        })
    }
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map_or(false, |first| first.starts_with("track") || first.starts_with("browser"))
}

fn parse_record(record: &StringRecord) -> Result<Interval, GenomeLakeError> {
    if record.len() < 3 {
        return Err(GenomeLakeError::InvalidBedFile(format!(
            "too few columns; the first three columns must be sequence name, start, and end: {:?}",
            record
        )));
    }
    let chrom = &record[0];
    let start: Position = record[1].trim().parse()?;
    let stop: Position = record[2].trim().parse()?;
    let strand = match record.get(STRAND_COLUMN) {
        Some(column) => column.trim().parse()?,
        None => Strand::Unknown,
    };
    Interval::with_strand(chrom, start, stop, strand)
}

impl Iterator for BedIntervalIterator {
    type Item = Result<Interval, GenomeLakeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.inner.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };
            if is_header(&record) {
                continue;
            }
            return Some(parse_record(&record));
        }
    }
}

/// Read all intervals from a BED file, in file order.
pub fn read_bed_intervals(
    filepath: impl Into<PathBuf>,
) -> Result<Vec<Interval>, GenomeLakeError> {
    BedIntervalIterator::new(filepath)?.collect()
}
