//! End-to-end runs of the `genomelake` binary.

use genomelake::test_utilities::write_test_fasta;
use ndarray::{ArrayD, IxDyn};
use ndarray_npy::read_npy;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn genomelake_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_genomelake"))
}

fn write_bed(dir: &Path) -> PathBuf {
    let bed = dir.join("intervals.bed");
    fs::write(&bed, "chr1\t0\t10\nchr2\t5\t15\n").unwrap();
    bed
}

#[test]
fn test_fasta_store_then_extract() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = write_test_fasta(dir.path()).unwrap();
    let bed = write_bed(dir.path());
    let store = dir.path().join("store");

    let status = Command::new(genomelake_binary_path())
        .arg("fasta")
        .arg(&fasta)
        .arg(&store)
        .arg("--mode")
        .arg("numpy")
        .status()
        .expect("genomelake fasta failed");
    assert!(status.success());
    assert!(store.join("metadata.json").is_file());
    assert!(store.join("chr1.npy").is_file());

    let from_store = dir.path().join("from_store.npy");
    let status = Command::new(genomelake_binary_path())
        .arg("extract")
        .arg(&bed)
        .arg("--store")
        .arg(&store)
        .arg("--output")
        .arg(&from_store)
        .status()
        .expect("genomelake extract failed");
    assert!(status.success());

    let from_fasta = dir.path().join("from_fasta.npy");
    let status = Command::new(genomelake_binary_path())
        .arg("extract")
        .arg(&bed)
        .arg("--fasta")
        .arg(&fasta)
        .arg("--output")
        .arg(&from_fasta)
        .status()
        .expect("genomelake extract failed");
    assert!(status.success());

    let a: ArrayD<f32> = read_npy(&from_store).unwrap();
    let b: ArrayD<f32> = read_npy(&from_fasta).unwrap();
    assert_eq!(a.raw_dim(), IxDyn(&[2, 10, 4]));
    assert_eq!(a, b);
}

#[test]
fn test_existing_store_is_not_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = write_test_fasta(dir.path()).unwrap();
    let store = dir.path().join("store");

    let run = |overwrite: bool| {
        let mut cmd = Command::new(genomelake_binary_path());
        cmd.arg("fasta").arg(&fasta).arg(&store);
        if overwrite {
            cmd.arg("--overwrite");
        }
        cmd.output().expect("genomelake fasta failed")
    };

    assert!(run(false).status.success());
    let second = run(false);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));
    assert!(run(true).status.success());
}

#[test]
fn test_extract_checks_genome_file() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = write_test_fasta(dir.path()).unwrap();
    let bed = write_bed(dir.path());
    let genome = dir.path().join("genome.tsv");
    // chr2 is declared shorter than the BED interval on it
    fs::write(&genome, "chr1\t20\nchr2\t12\n").unwrap();

    let output = Command::new(genomelake_binary_path())
        .arg("extract")
        .arg(&bed)
        .arg("--fasta")
        .arg(&fasta)
        .arg("--output")
        .arg(dir.path().join("out.npy"))
        .arg("--genome")
        .arg(&genome)
        .output()
        .expect("genomelake extract failed");
    assert!(!output.status.success());
    assert!(!dir.path().join("out.npy").exists());
}
