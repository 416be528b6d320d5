//! Test cases and test utility functions.
//!

use byteorder::{LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use ndarray::Array1;
use rand::{thread_rng, Rng};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{
    error::GenomeLakeError,
    ranges::{Interval, Strand},
    sequences::{NucleotideSequences, SignalTracks},
    Position,
};

/// Two short sequences; `chr2` exercises soft-masking and `N`.
pub const TEST_SEQUENCES: [(&str, &str); 2] = [
    ("chr1", "ACCGTACCGTACCGTACCGT"),
    ("chr2", "ACGTNACGTNacgtnACGTN"),
];

/// Bases per FASTA line in [`write_test_fasta`]; shorter than the sequences, so
/// fetches cross line breaks.
pub const TEST_FASTA_LINE_BASES: usize = 8;

const NUCLEOTIDES: &[u8] = b"ACGT";

/// Write [`TEST_SEQUENCES`] to `test.fa` in `dir`, with a matching `test.fa.fai`
/// index, and return the FASTA path.
pub fn write_test_fasta(dir: &Path) -> Result<PathBuf, GenomeLakeError> {
    write_fasta(dir, "test.fa", &TEST_SEQUENCES)
}

/// Write `sequences` as a line-wrapped FASTA file with its `.fai` index.
pub fn write_fasta(
    dir: &Path,
    name: &str,
    sequences: &[(&str, &str)],
) -> Result<PathBuf, GenomeLakeError> {
    let path = dir.join(name);
    let mut fasta = File::create(&path)?;
    let mut fai = File::create(dir.join(format!("{}.fai", name)))?;

    let mut offset = 0;
    for (seqname, seq) in sequences {
        let header = format!(">{}\n", seqname);
        fasta.write_all(header.as_bytes())?;
        offset += header.len();
        writeln!(
            fai,
            "{}\t{}\t{}\t{}\t{}",
            seqname,
            seq.len(),
            offset,
            TEST_FASTA_LINE_BASES,
            TEST_FASTA_LINE_BASES + 1
        )?;
        for line in seq.as_bytes().chunks(TEST_FASTA_LINE_BASES) {
            fasta.write_all(line)?;
            fasta.write_all(b"\n")?;
            offset += line.len() + 1;
        }
    }
    fasta.flush()?;
    Ok(path)
}

/// [`TEST_SEQUENCES`] in memory.
pub fn test_sequences() -> NucleotideSequences {
    TEST_SEQUENCES.iter().copied().collect()
}

/// Two 20bp signal tracks: `chr1` is constant `0.1`; `chr2` is `0.0` at position
/// 0, `9.0` through position 14, and `NaN` (no data) from 15 on.
pub fn test_signal_tracks() -> SignalTracks {
    let chr1 = Array1::from_elem(20, 0.1f32);
    let chr2 = Array1::from_shape_fn(20, |i| match i {
        0 => 0.0,
        1..=14 => 9.0,
        _ => f32::NAN,
    });
    [("chr1", chr1), ("chr2", chr2)].into_iter().collect()
}

const BIGWIG_MAGIC: u32 = 0x888F_FC26;
const BPT_MAGIC: u32 = 0x78CA_8C91;
const CIR_TREE_MAGIC: u32 = 0x2468_ACE0;
const BIGWIG_HEADER_LEN: u64 = 64;
const SUMMARY_LEN: u64 = 40;
const BPT_HEADER_LEN: u64 = 32;
const CIR_HEADER_LEN: u64 = 48;
const NODE_HEADER_LEN: u64 = 4;
const SECTION_HEADER_LEN: usize = 24;
const BEDGRAPH_SECTION: u8 = 1;

/// One chromosome of a bigWig fixture: its name, length and bedGraph entries
/// `(start, end, value)`, sorted and non-overlapping.
pub type BigWigChrom<'a> = (&'a str, u32, &'a [(u32, u32, f32)]);

/// [`test_signal_tracks`] as bedGraph entries; positions 15..20 of `chr2` have
/// no entry.
pub const TEST_BIGWIG_ENTRIES: [BigWigChrom<'static>; 2] = [
    ("chr1", 20, &[(0, 20, 0.1)]),
    ("chr2", 20, &[(0, 1, 0.0), (1, 15, 9.0)]),
];

/// Write [`TEST_BIGWIG_ENTRIES`] to `test.bw` in `dir`, and return its path.
pub fn write_test_bigwig(dir: &Path) -> Result<PathBuf, GenomeLakeError> {
    write_bigwig(dir, "test.bw", &TEST_BIGWIG_ENTRIES)
}

/// Write a minimal uncompressed bigWig file with no zoom levels: one bedGraph
/// section per chromosome, a single-leaf chromosome B+ tree and a single-leaf
/// R-tree index.
pub fn write_bigwig(
    dir: &Path,
    name: &str,
    chroms: &[BigWigChrom<'_>],
) -> Result<PathBuf, GenomeLakeError> {
    let key_size = chroms.iter().map(|(c, _, _)| c.len()).max().unwrap_or(1);
    let chrom_tree_offset = BIGWIG_HEADER_LEN + SUMMARY_LEN;
    let chrom_items_len = (chroms.len() * (key_size + 8)) as u64;
    let data_offset = chrom_tree_offset + BPT_HEADER_LEN + NODE_HEADER_LEN + chrom_items_len;

    // data sections, laid out after the section count
    let mut sections = Vec::new();
    let mut leaves = Vec::new();
    let mut offset = data_offset + 4;
    for (chrom_id, (_, _, entries)) in chroms.iter().enumerate() {
        let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
            continue;
        };
        let mut section = Vec::with_capacity(SECTION_HEADER_LEN + entries.len() * 12);
        section.write_u32::<LittleEndian>(chrom_id as u32)?;
        section.write_u32::<LittleEndian>(first.0)?;
        section.write_u32::<LittleEndian>(last.1)?;
        section.write_u32::<LittleEndian>(0)?;
        section.write_u32::<LittleEndian>(0)?;
        section.write_u8(BEDGRAPH_SECTION)?;
        section.write_u8(0)?;
        section.write_u16::<LittleEndian>(entries.len() as u16)?;
        for &(start, end, value) in entries.iter() {
            section.write_u32::<LittleEndian>(start)?;
            section.write_u32::<LittleEndian>(end)?;
            section.write_f32::<LittleEndian>(value)?;
        }
        leaves.push((chrom_id as u32, first.0, last.1, offset, section.len() as u64));
        offset += section.len() as u64;
        sections.push(section);
    }
    let index_offset = offset;

    let covered = chroms.iter().flat_map(|(_, _, entries)| entries.iter());
    let (mut bases, mut min, mut max, mut sum, mut sum_squares) =
        (0u64, f64::INFINITY, f64::NEG_INFINITY, 0f64, 0f64);
    for &(start, end, value) in covered {
        let span = u64::from(end - start);
        let value = f64::from(value);
        bases += span;
        min = min.min(value);
        max = max.max(value);
        sum += value * span as f64;
        sum_squares += value * value * span as f64;
    }

    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(BIGWIG_MAGIC)?;
    buf.write_u16::<LittleEndian>(4)?; // version
    buf.write_u16::<LittleEndian>(0)?; // zoom levels
    buf.write_u64::<LittleEndian>(chrom_tree_offset)?;
    buf.write_u64::<LittleEndian>(data_offset)?;
    buf.write_u64::<LittleEndian>(index_offset)?;
    buf.write_u16::<LittleEndian>(0)?; // field count
    buf.write_u16::<LittleEndian>(0)?; // defined field count
    buf.write_u64::<LittleEndian>(0)?; // autoSql offset
    buf.write_u64::<LittleEndian>(BIGWIG_HEADER_LEN)?;
    buf.write_u32::<LittleEndian>(0)?; // uncompressed
    buf.write_u64::<LittleEndian>(0)?; // extension offset

    buf.write_u64::<LittleEndian>(bases)?;
    for stat in [min, max, sum, sum_squares] {
        buf.write_f64::<LittleEndian>(if bases == 0 { 0.0 } else { stat })?;
    }

    buf.write_u32::<LittleEndian>(BPT_MAGIC)?;
    buf.write_u32::<LittleEndian>(chroms.len().max(1) as u32)?;
    buf.write_u32::<LittleEndian>(key_size as u32)?;
    buf.write_u32::<LittleEndian>(8)?;
    buf.write_u64::<LittleEndian>(chroms.len() as u64)?;
    buf.write_u64::<LittleEndian>(0)?;
    buf.write_u8(1)?; // leaf
    buf.write_u8(0)?;
    buf.write_u16::<LittleEndian>(chroms.len() as u16)?;
    for (chrom_id, (chrom, length, _)) in chroms.iter().enumerate() {
        let mut key = chrom.as_bytes().to_vec();
        key.resize(key_size, 0);
        buf.write_all(&key)?;
        buf.write_u32::<LittleEndian>(chrom_id as u32)?;
        buf.write_u32::<LittleEndian>(*length)?;
    }

    buf.write_u32::<LittleEndian>(sections.len() as u32)?;
    for section in sections.iter() {
        buf.write_all(section)?;
    }

    let first = leaves.first().copied().unwrap_or_default();
    let last = leaves.last().copied().unwrap_or_default();
    let items_per_slot = chroms.iter().map(|(_, _, e)| e.len()).max().unwrap_or(1);
    buf.write_u32::<LittleEndian>(CIR_TREE_MAGIC)?;
    buf.write_u32::<LittleEndian>(leaves.len().max(1) as u32)?;
    buf.write_u64::<LittleEndian>(leaves.len() as u64)?;
    buf.write_u32::<LittleEndian>(first.0)?;
    buf.write_u32::<LittleEndian>(first.1)?;
    buf.write_u32::<LittleEndian>(last.0)?;
    buf.write_u32::<LittleEndian>(last.2)?;
    buf.write_u64::<LittleEndian>(index_offset)?;
    buf.write_u32::<LittleEndian>(items_per_slot as u32)?;
    buf.write_u32::<LittleEndian>(0)?;
    buf.write_u8(1)?; // leaf
    buf.write_u8(0)?;
    buf.write_u16::<LittleEndian>(leaves.len() as u16)?;
    for (chrom_id, start, end, offset, size) in leaves {
        buf.write_u32::<LittleEndian>(chrom_id)?;
        buf.write_u32::<LittleEndian>(start)?;
        buf.write_u32::<LittleEndian>(chrom_id)?;
        buf.write_u32::<LittleEndian>(end)?;
        buf.write_u64::<LittleEndian>(offset)?;
        buf.write_u64::<LittleEndian>(size)?;
    }
    buf.write_u32::<LittleEndian>(BIGWIG_MAGIC)?;

    let path = dir.join(name);
    std::fs::write(&path, buf)?;
    Ok(path)
}

fn unstranded(chrom: &str, start: Position, stop: Position) -> Interval {
    Interval {
        chrom: chrom.to_string(),
        start,
        stop,
        strand: Strand::Unknown,
    }
}

/// `chr1:0-10` and `chr2:0-10`.
pub fn test_intervals() -> Vec<Interval> {
    vec![unstranded("chr1", 0, 10), unstranded("chr2", 0, 10)]
}

/// Generate a random nucleotide sequence of the given length.
pub fn random_sequence(len: usize) -> Vec<u8> {
    let mut rng = thread_rng();
    (0..len)
        .map(|_| NUCLEOTIDES[rng.gen_range(0..NUCLEOTIDES.len())])
        .collect()
}

/// Sample `n` random intervals of `width` (> 0) basepairs from chromosomes of the
/// given lengths. Chromosomes shorter than `width` are never sampled.
pub fn random_intervals(
    seqlens: &IndexMap<String, Position>,
    n: usize,
    width: Position,
) -> Vec<Interval> {
    let mut rng = thread_rng();
    let chroms: Vec<_> = seqlens.iter().filter(|(_, &len)| len >= width).collect();
    if chroms.is_empty() {
        return Vec::new();
    }
    (0..n)
        .map(|_| {
            let (chrom, &len) = chroms[rng.gen_range(0..chroms.len())];
            let start = rng.gen_range(0..=len - width);
            unstranded(chrom, start, start + width)
        })
        .collect()
}
