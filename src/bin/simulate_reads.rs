//! Sample fixed-length reads from a genome and write them as FASTQ.
//!
//! Reads carry a constant quality of `I`; the sampler is seeded so the same
//! arguments always produce the same file.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bio::io::{fasta, fastq};
use clap::Parser;

use kmer_walk::{ReadSource, SimulatedReadSource};

#[derive(Parser, Debug)]
#[command(name = "simulate_reads")]
#[command(about = "Sample reads from a genome FASTA into a FASTQ file")]
struct Args {
    /// Input genome FASTA (records are concatenated)
    #[arg(long, short)]
    input: PathBuf,

    /// Output FASTQ path (default: input with .fq)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Read length
    #[arg(long, default_value_t = 150)]
    read_len: usize,

    /// Target coverage
    #[arg(long, default_value_t = 20.0)]
    coverage: f64,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("fq"));

    let reader = fasta::Reader::from_file(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut genome = String::new();
    for record in reader.records() {
        let record = record?;
        genome.push_str(&String::from_utf8_lossy(record.seq()).to_ascii_uppercase());
    }
    if genome.is_empty() {
        bail!("{} contains no sequence", args.input.display());
    }

    let label = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "genome".to_string());
    let source =
        SimulatedReadSource::with_name(&label, &genome, args.read_len, args.coverage, args.seed);

    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = fastq::Writer::new(BufWriter::new(file));
    let num_reads = source.num_reads()?;
    for id in 0..num_reads {
        let name = source.get_name(id)?.unwrap_or_else(|| format!("r{}", id + 1));
        let seq = source.get_seq(id)?;
        let qual = vec![b'I'; seq.len()];
        writer.write(&name, None, seq.as_bytes(), &qual)?;
    }
    writer.flush()?;

    println!(
        "Wrote {} reads ({} bp, {}x) from {} bp genome to {}",
        num_reads,
        args.read_len,
        args.coverage,
        genome.len(),
        output.display()
    );
    Ok(())
}
