//! A chunked, tiled, compressed dense-array format for one- and two-dimensional
//! per-basepair data.
//!
//! # Layout
//!
//! A tiled array is a directory holding two files:
//!
//!  - `__array_schema.json`: the [`TiledSchema`], describing the genome coordinate
//!    dimension (`uint32`, domain `[0, n)`, tiled), an optional secondary
//!    dimension spanning the full width of 2D data, the single `float32` value
//!    attribute [`GENOME_VALUE_NAME`], and the byte range of every tile.
//!  - `v.tdb`: the tiles, back to back. Each tile holds up to
//!    [`DEFAULT_GENOME_TILE_EXTENT`] consecutive rows in row-major cell order, as
//!    little-endian `f32`, compressed with zlib.
//!
//! The schema is written last, after every tile is flushed, so a directory
//! without a schema is an incomplete write and cannot be opened.
//!
//! # Access
//!
//! [`write_tiled`] creates an array; [`TiledArray::open`] gives a read-only handle.
//! The handle has no mutating methods at all, so the read-only invariant is part
//! of its type rather than a runtime check.

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::GenomeLakeError;
use crate::sequences::lazy::LazyLoader;

pub const GENOME_DOMAIN_NAME: &str = "genome_coord";
pub const SECONDARY_DOMAIN_NAME: &str = "signal_coord";
pub const GENOME_VALUE_NAME: &str = "v";

pub const DEFAULT_GENOME_TILE_EXTENT: usize = 9000;
pub const DEFAULT_COMPRESSOR: &str = "zlib";
pub const DEFAULT_COMPRESSOR_LEVEL: u32 = 6;

const TILED_FORMAT_VERSION: u32 = 1;
const SCHEMA_FILENAME: &str = "__array_schema.json";
const ROW_MAJOR: &str = "row-major";
const COORD_DTYPE: &str = "uint32";
const VALUE_DTYPE: &str = "float32";

/// One dimension of a tiled array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    /// Half-open `[low, high)` coordinate domain; empty when `low == high`.
    pub domain: [u32; 2],
    pub tile: u32,
    pub dtype: String,
}

impl Dimension {
    fn new(name: &str, extent: usize, tile: usize) -> Result<Self, GenomeLakeError> {
        let high = u32::try_from(extent).map_err(|_| {
            GenomeLakeError::InvalidTiledSchema(format!(
                "dimension '{}' of extent {} does not fit a uint32 domain",
                name, extent
            ))
        })?;
        Ok(Self {
            name: name.to_string(),
            domain: [0, high],
            tile: tile as u32,
            dtype: COORD_DTYPE.to_string(),
        })
    }

    /// Number of cells along this dimension.
    pub fn len(&self) -> usize {
        (self.domain[1] - self.domain[0]) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The value attribute of a tiled array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub dtype: String,
    pub compressor: String,
    pub level: u32,
}

/// The byte range of one compressed tile in the data file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileEntry {
    pub offset: u64,
    pub length: u64,
}

/// The schema of a tiled array, stored as JSON alongside the tile data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TiledSchema {
    pub version: u32,
    pub dims: Vec<Dimension>,
    pub attr: Attribute,
    pub cell_order: String,
    pub tile_order: String,
    pub tiles: Vec<TileEntry>,
}

impl TiledSchema {
    /// The array shape, `(n,)` or `(n, m)`.
    pub fn shape(&self) -> Vec<usize> {
        self.dims.iter().map(Dimension::len).collect()
    }

    /// Number of genome coordinate rows per tile.
    pub fn tile_extent(&self) -> usize {
        self.dims[0].tile as usize
    }

    /// Number of values in each row: 1 for 1D arrays, `m` for 2D.
    pub fn row_width(&self) -> usize {
        self.dims.get(1).map_or(1, Dimension::len)
    }

    fn num_tiles(&self) -> usize {
        self.dims[0].len().div_ceil(self.tile_extent())
    }

    fn validate(&self) -> Result<(), GenomeLakeError> {
        let invalid = |msg: String| Err(GenomeLakeError::InvalidTiledSchema(msg));
        if self.version != TILED_FORMAT_VERSION {
            return invalid(format!("unsupported format version {}", self.version));
        }
        let expected_names = [GENOME_DOMAIN_NAME, SECONDARY_DOMAIN_NAME];
        if self.dims.is_empty() || self.dims.len() > expected_names.len() {
            return invalid(format!("expected 1 or 2 dimensions, found {}", self.dims.len()));
        }
        for (dim, expected) in self.dims.iter().zip(expected_names) {
            if dim.name != expected || dim.dtype != COORD_DTYPE {
                return invalid(format!(
                    "expected {} dimension '{}', found {} '{}'",
                    COORD_DTYPE, expected, dim.dtype, dim.name
                ));
            }
            if dim.domain[0] != 0 || dim.domain[1] < dim.domain[0] || dim.tile == 0 {
                return invalid(format!("dimension '{}' has an invalid domain or tile", dim.name));
            }
        }
        if let Some(secondary) = self.dims.get(1) {
            if secondary.len() == 0 || secondary.tile as usize != secondary.len() {
                return invalid("secondary dimension must be a single non-empty tile".to_string());
            }
        }
        if self.attr.name != GENOME_VALUE_NAME || self.attr.dtype != VALUE_DTYPE {
            return invalid(format!(
                "expected {} attribute '{}', found {} '{}'",
                VALUE_DTYPE, GENOME_VALUE_NAME, self.attr.dtype, self.attr.name
            ));
        }
        if self.attr.compressor != DEFAULT_COMPRESSOR {
            return invalid(format!("unsupported compressor '{}'", self.attr.compressor));
        }
        if self.cell_order != ROW_MAJOR || self.tile_order != ROW_MAJOR {
            return invalid("only row-major cell and tile order is supported".to_string());
        }
        if self.tiles.len() != self.num_tiles() {
            return invalid(format!(
                "expected {} tiles, found {}",
                self.num_tiles(),
                self.tiles.len()
            ));
        }
        Ok(())
    }
}

fn schema_path(path: &Path) -> PathBuf {
    path.join(SCHEMA_FILENAME)
}

fn data_path(path: &Path) -> PathBuf {
    path.join(format!("{}.tdb", GENOME_VALUE_NAME))
}

/// Write a tiled array to disk at `path`.
///
/// If `path` exists, this fails with [`GenomeLakeError::OutputExists`] unless
/// `overwrite` is set, in which case the existing file or directory is removed
/// first. Only 1D and 2D arrays are supported. An array with no rows is written
/// with zero tiles, but the secondary dimension of a 2D array must be non-empty.
pub fn write_tiled(
    arr: ArrayViewD<'_, f32>,
    path: impl AsRef<Path>,
    overwrite: bool,
) -> Result<TiledSchema, GenomeLakeError> {
    let path = path.as_ref();
    if path.exists() {
        if !overwrite {
            return Err(GenomeLakeError::OutputExists(path.to_path_buf()));
        }
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }

    let n = arr.shape().first().copied().unwrap_or(0);
    let tile = DEFAULT_GENOME_TILE_EXTENT.min(n.max(1));
    let dims = match arr.ndim() {
        1 => vec![Dimension::new(GENOME_DOMAIN_NAME, n, tile)?],
        2 => {
            let m = arr.shape()[1];
            if m == 0 {
                return Err(GenomeLakeError::EmptyTiledArray);
            }
            vec![
                Dimension::new(GENOME_DOMAIN_NAME, n, tile)?,
                Dimension::new(SECONDARY_DOMAIN_NAME, m, m)?,
            ]
        }
        ndim => return Err(GenomeLakeError::UnsupportedRank(ndim)),
    };
    let extent = dims[0].tile as usize;

    fs::create_dir_all(path)?;
    let mut writer = BufWriter::new(File::create(data_path(path))?);
    let mut tiles = Vec::with_capacity(n.div_ceil(extent));
    let mut offset = 0u64;
    for tile in arr.axis_chunks_iter(Axis(0), extent) {
        let values: Vec<f32> = tile.iter().copied().collect();
        let mut raw = vec![0u8; values.len() * std::mem::size_of::<f32>()];
        LittleEndian::write_f32_into(&values, &mut raw);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(DEFAULT_COMPRESSOR_LEVEL));
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;

        writer.write_all(&compressed)?;
        let length = compressed.len() as u64;
        tiles.push(TileEntry { offset, length });
        offset += length;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    let schema = TiledSchema {
        version: TILED_FORMAT_VERSION,
        dims,
        attr: Attribute {
            name: GENOME_VALUE_NAME.to_string(),
            dtype: VALUE_DTYPE.to_string(),
            compressor: DEFAULT_COMPRESSOR.to_string(),
            level: DEFAULT_COMPRESSOR_LEVEL,
        },
        cell_order: ROW_MAJOR.to_string(),
        tile_order: ROW_MAJOR.to_string(),
        tiles,
    };
    let schema_file = File::create(schema_path(path))?;
    serde_json::to_writer(&schema_file, &schema)?;
    schema_file.sync_all()?;

    debug!(
        "wrote tiled array {} with shape {:?} in {} tiles",
        path.display(),
        schema.shape(),
        schema.tiles.len()
    );
    Ok(schema)
}

/// Open the tiled array at `path` read-only.
pub fn load_tiled(path: impl Into<PathBuf>) -> Result<TiledArray, GenomeLakeError> {
    TiledArray::open(path)
}

/// A read-only handle to a tiled array on disk.
///
/// Tiles are decompressed on demand; the most recently read tile is cached.
/// Reads go through a single open file handle, so a [`TiledArray`] is not `Sync`.
pub struct TiledArray {
    path: PathBuf,
    schema: TiledSchema,
    tiles: LazyLoader<File, Vec<f32>, usize>,
}

impl std::fmt::Debug for TiledArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiledArray")
            .field("path", &self.path)
            .field("shape", &self.schema.shape())
            .finish_non_exhaustive()
    }
}

fn read_tile(
    file: &mut File,
    entries: &[TileEntry],
    index: usize,
    expected_values: usize,
) -> Result<Vec<f32>, GenomeLakeError> {
    let corrupt = |reason: String| GenomeLakeError::CorruptTile { index, reason };
    let entry = entries
        .get(index)
        .ok_or_else(|| corrupt("tile index out of range".to_string()))?;

    file.seek(SeekFrom::Start(entry.offset))?;
    let mut compressed = Vec::with_capacity(entry.length as usize);
    Read::by_ref(file)
        .take(entry.length)
        .read_to_end(&mut compressed)?;
    if compressed.len() as u64 != entry.length {
        return Err(corrupt(format!(
            "expected {} compressed bytes, found {}",
            entry.length,
            compressed.len()
        )));
    }

    let mut raw = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| corrupt(e.to_string()))?;
    let expected_bytes = expected_values * std::mem::size_of::<f32>();
    if raw.len() != expected_bytes {
        return Err(corrupt(format!(
            "expected {} bytes after decompression, found {}",
            expected_bytes,
            raw.len()
        )));
    }

    let mut values = vec![0f32; expected_values];
    LittleEndian::read_f32_into(&raw, &mut values);
    Ok(values)
}

impl TiledArray {
    /// Open an existing tiled array read-only, validating its schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GenomeLakeError> {
        let path = path.into();
        let schema: TiledSchema = serde_json::from_reader(File::open(schema_path(&path))?)?;
        schema.validate()?;

        let file = File::open(data_path(&path))?;
        let entries = schema.tiles.clone();
        let rows = schema.dims[0].len();
        let extent = schema.tile_extent();
        let width = schema.row_width();
        let tiles = LazyLoader::new(file, move |file: &mut File, index: &usize| {
            let tile_rows = extent.min(rows.saturating_sub(index * extent));
            read_tile(file, &entries, *index, tile_rows * width)
        });

        Ok(Self {
            path,
            schema,
            tiles,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &TiledSchema {
        &self.schema
    }

    pub fn shape(&self) -> Vec<usize> {
        self.schema.shape()
    }

    pub fn ndim(&self) -> usize {
        self.schema.dims.len()
    }

    /// Number of genome coordinate rows.
    pub fn len(&self) -> usize {
        self.schema.dims[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the values of rows `[start, stop)` along the genome coordinate, as an
    /// array of shape `(stop - start,)` or `(stop - start, m)`.
    pub fn read_rows(&self, start: usize, stop: usize) -> Result<ArrayD<f32>, GenomeLakeError> {
        let rows = self.len();
        if start > stop || stop > rows {
            return Err(GenomeLakeError::InvalidGenomicRangeForSequence {
                seqname: self.path.display().to_string(),
                start: start as u32,
                end: stop as u32,
                length: rows as u32,
            });
        }

        let extent = self.schema.tile_extent();
        let width = self.schema.row_width();
        let mut values = Vec::with_capacity((stop - start) * width);
        if start < stop {
            for index in (start / extent)..=((stop - 1) / extent) {
                let tile_start = index * extent;
                let tile = self.tiles.get_data(&index)?;
                let lo = start.max(tile_start) - tile_start;
                let hi = stop.min(tile_start + extent) - tile_start;
                values.extend_from_slice(&tile[lo * width..hi * width]);
            }
        }

        let mut shape = self.shape();
        shape[0] = stop - start;
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    /// Read the whole array into memory.
    pub fn read_all(&self) -> Result<ArrayD<f32>, GenomeLakeError> {
        self.read_rows(0, self.len())
    }

    /// Read the rows covered by a [`Slice`] with a unit step, e.g. `Slice::from(10..20)`.
    pub fn get(&self, slice: Slice) -> Result<ArrayD<f32>, GenomeLakeError> {
        let rows = self.len() as isize;
        let resolve = |i: isize| -> usize {
            let clamped = if i < 0 { (rows + i).max(0) } else { i.min(rows) };
            clamped as usize
        };
        let start = resolve(slice.start);
        let stop = slice.end.map_or(self.len(), resolve);
        if slice.step != 1 {
            return Err(GenomeLakeError::InvalidTiledSchema(format!(
                "tiled arrays only support unit-step slices, got step {}",
                slice.step
            )));
        }
        self.read_rows(start, stop.max(start))
    }
}
