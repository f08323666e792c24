//! kmer_walk library
//!
//! Greedy assembly of short reads over a k-mer overlap graph: reads are cut
//! into k-mers, each k-mer links its (k-1)-prefix to its (k-1)-suffix, and
//! contigs are read off the graph by deterministic greedy walks guarded
//! against cycles. [`assemble_genome`] runs the whole pipeline and reports
//! N50 alongside the contigs.

pub mod error;
pub mod graph;
pub mod read_source;
pub mod stats;
pub mod traverse;

use log::{info, warn};

pub use error::{AssemblyError, Result};
pub use graph::{BuildReport, Edge, GraphBuilder, KmerGraph, NodeId, MIN_K};
pub use read_source::{InMemoryReadSource, ReadSource, ReadSourceError, SimulatedReadSource};
pub use stats::{n50, nx, summarize, AssemblyResult, Diagnostics};
pub use traverse::{
    assemble, seed_order, Contig, ContigWalker, SeedOrder, Termination, WalkConfig,
    DEFAULT_LENGTH_CAP,
};

#[cfg(feature = "parallel")]
pub use traverse::par_assemble;

/// Window size used when none is given.
pub const DEFAULT_K: usize = 31;

/// Options that govern one assembly run.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyConfig {
    /// k-mer length; nodes are (k-1)-mers.
    pub k: usize,
    /// Maximum contig length in symbols.
    pub length_cap: usize,
    pub seed_order: SeedOrder,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            length_cap: DEFAULT_LENGTH_CAP,
            seed_order: SeedOrder::default(),
        }
    }
}

impl AssemblyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k < MIN_K {
            return Err(AssemblyError::InvalidConfig(format!(
                "k must be at least {MIN_K}, got {}",
                self.k
            )));
        }
        if self.length_cap < self.k - 1 {
            return Err(AssemblyError::InvalidConfig(format!(
                "length cap {} is shorter than a single node (k - 1 = {})",
                self.length_cap,
                self.k - 1
            )));
        }
        Ok(())
    }

    pub fn walk_config(&self) -> WalkConfig {
        WalkConfig {
            length_cap: self.length_cap,
            seed_order: self.seed_order,
        }
    }
}

/// Assemble `reads` with window size `k` and an optional per-contig length cap.
///
/// No reads, or reads whose every window is filtered out, give an empty
/// result rather than an error.
pub fn assemble_genome<R: ReadSource + ?Sized>(
    reads: &R,
    k: usize,
    length_cap: Option<usize>,
) -> Result<AssemblyResult> {
    let config = AssemblyConfig {
        k,
        length_cap: length_cap.unwrap_or(DEFAULT_LENGTH_CAP),
        ..AssemblyConfig::default()
    };
    assemble_with_config(reads, &config)
}

/// Checks that can run before any graph work, then builds the graph.
fn prepare_graph<R: ReadSource + ?Sized>(reads: &R, config: &AssemblyConfig) -> Result<KmerGraph> {
    config.validate()?;
    if let Some(longest) = reads.max_len()? {
        if longest < config.k {
            return Err(AssemblyError::InvalidConfig(format!(
                "k = {} exceeds the longest read ({} bp)",
                config.k, longest
            )));
        }
    }
    KmerGraph::build(reads, config.k)
}

fn finish(graph: &KmerGraph, contigs: Vec<Contig>) -> AssemblyResult {
    let mut diagnostics = Diagnostics::from_graph(graph);
    for contig in &contigs {
        diagnostics.record(contig);
    }
    let mut result = summarize(contigs);
    result.diagnostics = diagnostics;
    info!(
        "Assembled {} contigs, {} bp total, N50 {}",
        result.num_contigs, result.total_length, result.n50
    );
    if diagnostics.length_capped > 0 {
        warn!(
            "{} contigs stopped at the length cap",
            diagnostics.length_capped
        );
    }
    result
}

/// Assemble `reads` with explicit options.
pub fn assemble_with_config<R: ReadSource + ?Sized>(
    reads: &R,
    config: &AssemblyConfig,
) -> Result<AssemblyResult> {
    let graph = prepare_graph(reads, config)?;
    let contigs: Vec<Contig> = assemble(&graph, config.walk_config()).collect();
    Ok(finish(&graph, contigs))
}

/// Like [`assemble_with_config`], with walks on the rayon pool.
#[cfg(feature = "parallel")]
pub fn par_assemble_with_config<R: ReadSource + ?Sized>(
    reads: &R,
    config: &AssemblyConfig,
) -> Result<AssemblyResult> {
    let graph = prepare_graph(reads, config)?;
    let contigs = par_assemble(&graph, config.walk_config());
    Ok(finish(&graph, contigs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AssemblyConfig::default();
        assert_eq!(config.k, 31);
        assert_eq!(config.length_cap, 2_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cap_shorter_than_a_node_is_rejected() {
        let config = AssemblyConfig {
            k: 5,
            length_cap: 3,
            ..AssemblyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AssemblyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn k_longer_than_every_read_is_rejected() {
        let reads = vec!["ACGT".to_string(), "ACG".to_string()];
        assert!(matches!(
            assemble_genome(reads.as_slice(), 5, None),
            Err(AssemblyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn filtered_windows_give_an_empty_result() {
        let reads = vec!["NNNNNN".to_string()];
        let result = assemble_genome(reads.as_slice(), 4, None).unwrap();
        assert_eq!(result.num_contigs, 0);
        assert_eq!(result.diagnostics.windows_discarded, 3);
        assert_eq!(result.diagnostics.reads_seen, 1);
    }
}
