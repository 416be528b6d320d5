//! Input file handling with [`InputFile`], and the genome-size file reader.
//!
//! [`InputFile`] abstracts over reading both plaintext and gzip-compressed input.

use flate2::read::GzDecoder;
use indexmap::IndexMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;

use crate::error::GenomeLakeError;
use crate::Position;

/// Read a whitespace-delimited *genome file* of sequence (i.e. chromosome) names and
/// their lengths, preserving file order.
///
/// Blank lines are skipped. A line without exactly two columns, or a duplicated
/// sequence name, is a [`GenomeLakeError::InvalidGenomeFile`].
pub fn read_genome_sizes(
    filepath: impl Into<PathBuf>,
) -> Result<IndexMap<String, Position>, GenomeLakeError> {
    let input_file = InputFile::new(filepath);
    let reader = input_file.reader()?;

    let mut seqlens = IndexMap::new();
    for result in reader.lines() {
        let line = result?;
        let mut columns = line.split_whitespace();
        let (seqname, length) = match (columns.next(), columns.next(), columns.next()) {
            (None, _, _) => continue,
            (Some(seqname), Some(length), None) => (seqname, length),
            _ => {
                return Err(GenomeLakeError::InvalidGenomeFile(format!(
                    "expected 'name length', found '{}'",
                    line
                )))
            }
        };
        let length: Position = length.parse()?;
        if seqlens.contains_key(seqname) {
            return Err(GenomeLakeError::InvalidGenomeFile(format!(
                "sequence '{}' is duplicated",
                seqname
            )));
        }
        seqlens.insert(seqname.to_string(), length);
    }
    Ok(seqlens)
}

/// Check if a file is a gzipped by looking for the magic numbers
pub fn is_gzipped_file(file_path: impl Into<PathBuf>) -> io::Result<bool> {
    let file = File::open(file_path.into())?;
    let mut buffer = Vec::with_capacity(2);
    file.take(2).read_to_end(&mut buffer)?;

    Ok(buffer == [0x1f, 0x8b])
}

/// Represents an input file.
///
/// This abstracts how data is read in, allowing for both plaintext and
/// gzip-compressed input to be read through a common interface.
#[derive(Clone, Debug)]
pub struct InputFile {
    pub filepath: PathBuf,
}

impl InputFile {
    /// Constructs a new `InputFile`.
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
        }
    }

    /// Opens the file and returns a buffered reader, decompressing gzip
    /// input (detected by its magic number) on the fly.
    pub fn reader(&self) -> io::Result<BufReader<Box<dyn Read>>> {
        let file = File::open(&self.filepath)?;
        let is_gzipped = is_gzipped_file(&self.filepath)?;
        let reader: Box<dyn Read> = if is_gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }
}
