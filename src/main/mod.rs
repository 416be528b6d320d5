use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use genomelake::{
    extract::{ArrayExtractor, BigwigExtractor, Extractor, FastaExtractor},
    prelude::{
        extract_bigwig_to_store, extract_fasta_to_store, read_bed_intervals, read_genome_sizes,
        GenomeLakeError, StoreMode, WriteOptions,
    },
};
use log::{info, LevelFilter};

const INFO: &str = "\
genomelake: random access to per-basepair genomic data
usage: genomelake [--help] <subcommand>

Subcommands:

  fasta: convert an indexed FASTA file into a one-hot sequence array store.
  bigwig: convert a bigWig file into a signal array store.
  extract: extract the intervals of a BED file into a .npy tensor.

";

#[derive(Parser)]
#[clap(name = "genomelake")]
#[clap(about = INFO)]
struct Cli {
    /// increase logging verbosity (-d for info, -dd for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct StoreArgs {
    /// the output array store directory
    #[arg(required = true)]
    output: PathBuf,

    /// the storage backend
    #[arg(long, value_enum, default_value = "chunked")]
    mode: StoreMode,

    /// replace the output directory if it already exists
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// an array store directory
    #[arg(long)]
    store: Option<PathBuf>,

    /// an indexed FASTA file
    #[arg(long)]
    fasta: Option<PathBuf>,

    /// a bigWig file
    #[arg(long)]
    bigwig: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    Fasta {
        /// an indexed FASTA file (with its .fai index alongside)
        #[arg(required = true)]
        fasta: PathBuf,

        #[command(flatten)]
        store: StoreArgs,
    },
    Bigwig {
        /// a bigWig file
        #[arg(required = true)]
        bigwig: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// store positions without data as NaN rather than 0
        #[arg(long)]
        keep_nan: bool,
    },
    Extract {
        /// a BED file of equal-width intervals
        #[arg(required = true)]
        bedfile: PathBuf,

        #[command(flatten)]
        source: Source,

        /// the output .npy file
        #[arg(long, required = true)]
        output: PathBuf,

        /// load the whole array store into memory (--store only)
        #[arg(long)]
        in_memory: bool,

        /// reverse complement intervals on the minus strand (--fasta only)
        #[arg(long)]
        use_strand: bool,

        /// a TSV genome file of chromosome names and their lengths, to check the
        /// intervals against before extracting
        #[arg(long)]
        genome: Option<PathBuf>,
    },
}

impl StoreArgs {
    fn options(&self) -> WriteOptions {
        WriteOptions::new(self.mode).overwrite(self.overwrite)
    }
}

fn open_extractor(
    source: &Source,
    in_memory: bool,
    use_strand: bool,
) -> Result<Box<dyn Extractor>, GenomeLakeError> {
    if let Some(store) = &source.store {
        Ok(Box::new(ArrayExtractor::new(store, in_memory)?))
    } else if let Some(fasta) = &source.fasta {
        Ok(Box::new(FastaExtractor::open(fasta, use_strand)?))
    } else if let Some(bigwig) = &source.bigwig {
        Ok(Box::new(BigwigExtractor::open(bigwig)?))
    } else {
        Err(GenomeLakeError::IOError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "one of --store, --fasta, or --bigwig is required",
        )))
    }
}

fn genomelake_extract(
    bedfile: &PathBuf,
    source: &Source,
    output: &PathBuf,
    in_memory: bool,
    use_strand: bool,
    genome: Option<&PathBuf>,
) -> Result<(), GenomeLakeError> {
    let intervals = read_bed_intervals(bedfile)?;
    info!("read {} intervals from {}", intervals.len(), bedfile.display());

    if let Some(genome) = genome {
        let seqlens = read_genome_sizes(genome)?;
        for interval in intervals.iter() {
            let length = seqlens
                .get(&interval.chrom)
                .ok_or_else(|| GenomeLakeError::MissingSequence(interval.chrom.clone()))?;
            interval.validate(*length)?;
        }
    }

    let mut extractor = open_extractor(source, in_memory, use_strand)?;
    let out = extractor.extract(&intervals, None)?;
    ndarray_npy::write_npy(output, &out)?;
    info!("wrote tensor {:?} to {}", out.shape(), output.display());
    Ok(())
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run() -> Result<(), GenomeLakeError> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    match &cli.command {
        Some(Commands::Fasta { fasta, store }) => {
            extract_fasta_to_store(fasta, &store.output, &store.options()).map(|_| ())
        }
        Some(Commands::Bigwig {
            bigwig,
            store,
            keep_nan,
        }) => {
            let options = store.options().nan_as_zero(!keep_nan);
            extract_bigwig_to_store(bigwig, &store.output, &options).map(|_| ())
        }
        Some(Commands::Extract {
            bedfile,
            source,
            output,
            in_memory,
            use_strand,
            genome,
        }) => genomelake_extract(
            bedfile,
            source,
            output,
            *in_memory,
            *use_strand,
            genome.as_ref(),
        ),
        None => {
            println!("{}\n", INFO);
            std::process::exit(1);
        }
    }
}

fn main() {
    match run() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
