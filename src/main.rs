use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use bio::io::{fasta, fastq};
use clap::Parser;
use flate2::read::MultiGzDecoder;
use serde_json::json;

use kmer_walk::{
    assemble, AssemblyConfig, AssemblyResult, Contig, KmerGraph, SeedOrder, SimulatedReadSource,
    DEFAULT_K, DEFAULT_LENGTH_CAP,
};

/// Greedy k-mer graph assembler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// FASTQ/FASTA/plain-line read files (gzip allowed)
    reads: Vec<String>,

    /// Simulate reads from this genome FASTA instead of reading read files
    #[arg(long, conflicts_with = "reads")]
    simulate: Option<String>,

    /// Read length for --simulate
    #[arg(long, default_value_t = 150)]
    read_len: usize,

    /// Coverage for --simulate
    #[arg(long, default_value_t = 20.0)]
    coverage: f64,

    /// Random seed for --simulate
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// k-mer length (nodes are (k-1)-mers)
    #[arg(short, long, default_value_t = DEFAULT_K)]
    k: usize,

    /// Maximum contig length
    #[arg(long, default_value_t = DEFAULT_LENGTH_CAP)]
    length_cap: usize,

    /// Seed order for walks: sources-first or lexicographic
    #[arg(long, default_value_t = SeedOrder::SourcesFirst)]
    seed_order: SeedOrder,

    /// Optional reference FASTA used to check contigs after assembly
    #[arg(long)]
    reference: Option<String>,

    /// Optional output FASTA path for the contigs
    #[arg(long)]
    output_fasta: Option<String>,

    /// Wrap FASTA lines to this width (0 = no-wrap)
    #[arg(long, default_value_t = 60)]
    fasta_line_width: usize,

    /// Optional JSON file for the assembly summary
    #[arg(long)]
    summary_json: Option<String>,

    /// Optional output file for the k-mer graph (JSON node/edge list)
    #[arg(long)]
    export_graph_json: Option<String>,

    /// Walk contigs on a thread pool (requires the `parallel` feature)
    #[arg(long, default_value_t = false)]
    threads: bool,

    /// Number of worker threads when --threads is set (default: max available - 1)
    #[arg(long, default_value_t = num_cpus::get().saturating_sub(1).max(1))]
    max_workers: usize,

    /// Verbose/info output (default: quiet)
    #[arg(long, short = 'v', alias = "info")]
    verbose: bool,

    /// Debug output
    #[arg(long)]
    debug: bool,

    /// Trace output
    #[arg(long)]
    trace: bool,
}

fn main() {
    let args = Args::parse();
    let log_level = if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "error"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("kmer_walk {}", env!("CARGO_PKG_VERSION"));

    match run_pipeline(&args) {
        Ok(result) => {
            println!(
                "contigs={} total={} bp longest={} shortest={} N50={}",
                result.num_contigs,
                result.total_length,
                result.longest,
                result.shortest,
                result.n50
            );
        }
        Err(error) => {
            eprintln!("Assembly failed: {error:?}");
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequenceFormat {
    Fastq,
    Fasta,
    Lines,
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("bgz"))
        .unwrap_or(false)
}

fn infer_format(path: &Path) -> SequenceFormat {
    let mut ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    if ext == "gz" || ext == "bgz" {
        if let Some(stem) = path.file_stem() {
            ext = Path::new(stem)
                .extension()
                .and_then(|e| e.to_str())
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_default();
        }
    }

    match ext.as_str() {
        "fastq" | "fq" => SequenceFormat::Fastq,
        "fasta" | "fa" | "fna" => SequenceFormat::Fasta,
        _ => SequenceFormat::Lines,
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if is_gzip(path) {
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn uppercase_sequence(bytes: &[u8]) -> Result<String> {
    let upper = bytes
        .iter()
        .map(|b| b.to_ascii_uppercase())
        .collect::<Vec<u8>>();
    String::from_utf8(upper).map_err(|_| anyhow!("Encountered non-UTF-8 symbols in sequence data"))
}

fn read_sequences(path: &Path) -> Result<Vec<String>> {
    let format = infer_format(path);
    let reader = open_reader(path)?;
    let mut sequences = Vec::new();

    match format {
        SequenceFormat::Fastq => {
            for record in fastq::Reader::new(reader).records() {
                let record = record.with_context(|| {
                    format!("Error reading FASTQ record from {}", path.display())
                })?;
                sequences.push(uppercase_sequence(record.seq())?);
            }
        }
        SequenceFormat::Fasta => {
            for record in fasta::Reader::new(reader).records() {
                let record = record.with_context(|| {
                    format!("Error reading FASTA record from {}", path.display())
                })?;
                sequences.push(uppercase_sequence(record.seq())?);
            }
        }
        SequenceFormat::Lines => {
            for line in reader.lines() {
                let line = line?;
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    sequences.push(trimmed.to_ascii_uppercase());
                }
            }
        }
    }
    Ok(sequences)
}

/// Concatenate every record of a FASTA/plain file into one sequence.
fn load_genome(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        bail!("Genome path {} does not exist", path.display());
    }
    let sequences = read_sequences(path)?;
    if sequences.is_empty() {
        return Ok(None);
    }
    Ok(Some(sequences.concat()))
}

fn ensure_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_wrapped<W: Write>(out: &mut W, sequence: &str, width: usize) -> Result<()> {
    if width == 0 {
        writeln!(out, "{sequence}")?;
        return Ok(());
    }
    let mut i = 0;
    while i < sequence.len() {
        let end = std::cmp::min(i + width, sequence.len());
        writeln!(out, "{}", &sequence[i..end])?;
        i = end;
    }
    Ok(())
}

fn write_contigs_fasta(path: &str, contigs: &[Contig], width: usize) -> Result<()> {
    ensure_parent(path)?;
    let mut fh = File::create(path).with_context(|| format!("Failed to create {path}"))?;
    for (idx, contig) in contigs.iter().enumerate() {
        writeln!(
            fh,
            ">contig_{} len={} edges={} stop={:?}",
            idx + 1,
            contig.len(),
            contig.edges,
            contig.termination
        )?;
        write_wrapped(&mut fh, &contig.sequence, width)?;
    }
    Ok(())
}

fn collect_reads(args: &Args) -> Result<(Vec<String>, Option<String>)> {
    if let Some(genome_path) = &args.simulate {
        let genome = load_genome(Path::new(genome_path))?
            .ok_or_else(|| anyhow!("Genome file {} contains no sequence", genome_path))?;
        let source = SimulatedReadSource::new(&genome, args.read_len, args.coverage, args.seed);
        let reads = source.into_reads();
        info!(
            "Simulated {} reads ({} bp, {}x) from {} bp genome",
            reads.len(),
            args.read_len,
            args.coverage,
            genome.len()
        );
        return Ok((reads, Some(genome)));
    }

    if args.reads.is_empty() {
        bail!("No read files given (pass read paths or --simulate <genome>)");
    }
    let mut reads = Vec::new();
    for path in &args.reads {
        let batch = read_sequences(Path::new(path))
            .with_context(|| format!("Failed to parse reads from {}", path))?;
        info!("{}: {} reads", path, batch.len());
        reads.extend(batch);
    }
    let reference = match &args.reference {
        Some(path) => load_genome(Path::new(path))?,
        None => None,
    };
    Ok((reads, reference))
}

#[cfg(feature = "parallel")]
fn walk_contigs(graph: &KmerGraph, config: &AssemblyConfig, args: &Args) -> Result<Vec<Contig>> {
    if args.threads {
        info!("Walking contigs on {} threads", args.max_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(args.max_workers)
            .build()
            .context("Failed to build thread pool")?;
        return Ok(pool.install(|| kmer_walk::par_assemble(graph, config.walk_config())));
    }
    Ok(assemble(graph, config.walk_config()).collect())
}

#[cfg(not(feature = "parallel"))]
fn walk_contigs(graph: &KmerGraph, config: &AssemblyConfig, args: &Args) -> Result<Vec<Contig>> {
    if args.threads {
        warn!("--threads ignored: built without the `parallel` feature");
    }
    Ok(assemble(graph, config.walk_config()).collect())
}

fn run_pipeline(args: &Args) -> Result<AssemblyResult> {
    let config = AssemblyConfig {
        k: args.k,
        length_cap: args.length_cap,
        seed_order: args.seed_order,
    };
    config.validate()?;

    let (reads, reference) = collect_reads(args)?;
    if reads.is_empty() {
        warn!("No reads supplied; nothing to assemble");
    }
    if let Some(longest) = reads.iter().map(String::len).max() {
        if longest < config.k {
            bail!("k = {} exceeds the longest read ({} bp)", config.k, longest);
        }
    }

    let started = Instant::now();
    let graph = KmerGraph::build(reads.as_slice(), config.k)?;

    if let Some(graph_path) = &args.export_graph_json {
        ensure_parent(graph_path)?;
        let mut file = File::create(graph_path)?;
        writeln!(file, "{}", serde_json::to_string_pretty(&graph.to_json())?)?;
        info!("k-mer graph written to {}", graph_path);
    }

    let contigs = walk_contigs(&graph, &config, args)?;
    let mut diagnostics = kmer_walk::Diagnostics::from_graph(&graph);
    for contig in &contigs {
        diagnostics.record(contig);
    }
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!("Walk terminations: {:?}", diagnostics);

    if let Some(path) = &args.output_fasta {
        write_contigs_fasta(path, &contigs, args.fasta_line_width)?;
        info!("{} contigs written to {}", contigs.len(), path);
    }

    let mut result = kmer_walk::summarize(contigs);
    result.diagnostics = diagnostics;
    info!(
        "Assembly took {:.1} ms: {} contigs, N50 {}",
        elapsed_ms, result.num_contigs, result.n50
    );

    if let Some(reference_seq) = &reference {
        let exact = result
            .contigs
            .iter()
            .filter(|contig| reference_seq.contains(contig.as_str()))
            .count();
        info!(
            "{} of {} contigs occur verbatim in the reference ({} bp)",
            exact,
            result.num_contigs,
            reference_seq.len()
        );
        if result.contigs.iter().any(|contig| contig == reference_seq) {
            info!("A contig matches the reference sequence exactly.");
        }
    }

    if let Some(json_path) = &args.summary_json {
        ensure_parent(json_path)?;
        let summary = json!({
            "inputs": args.reads,
            "simulated_from": args.simulate,
            "k": config.k,
            "length_cap": config.length_cap,
            "seed_order": config.seed_order.to_string(),
            "n_reads": reads.len(),
            "genome_len": reference.as_ref().map(String::len),
            "assembly_time_ms": elapsed_ms,
            "num_contigs": result.num_contigs,
            "total_length": result.total_length,
            "longest": result.longest,
            "shortest": result.shortest,
            "n50": result.n50,
            "n90": result.n90,
            "mean_length": result.mean_length,
            "diagnostics": result.diagnostics,
        });
        let mut file = File::create(json_path)?;
        writeln!(file, "{}", serde_json::to_string_pretty(&summary)?)?;
        info!("Summary written to {}", json_path);
    }

    Ok(result)
}
