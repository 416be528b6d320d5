//! Types and methods for reading collaborator input files: genome-size files
//! and BED interval files.

pub mod bed;
pub mod file;

pub use bed::{read_bed_intervals, BedIntervalIterator};
pub use file::{read_genome_sizes, InputFile};
