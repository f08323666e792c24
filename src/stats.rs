//! Assembly statistics (N50 and friends).

use serde::Serialize;

use crate::graph::KmerGraph;
use crate::traverse::{Contig, Termination};

/// Where the reads and walks of a run went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub reads_seen: usize,
    pub reads_skipped: usize,
    pub windows_discarded: usize,
    pub kmers_counted: usize,
    pub nodes: usize,
    pub edges: usize,
    pub dead_ends: usize,
    pub revisits: usize,
    pub length_capped: usize,
}

impl Diagnostics {
    pub fn from_graph(graph: &KmerGraph) -> Self {
        let report = graph.report();
        Diagnostics {
            reads_seen: report.reads_seen,
            reads_skipped: report.reads_skipped,
            windows_discarded: report.windows_discarded,
            kmers_counted: report.kmers_counted(),
            nodes: graph.num_nodes(),
            edges: graph.num_edges(),
            ..Diagnostics::default()
        }
    }

    pub fn record(&mut self, contig: &Contig) {
        match contig.termination {
            Termination::DeadEnd => self.dead_ends += 1,
            Termination::Revisit => self.revisits += 1,
            Termination::LengthCap => self.length_capped += 1,
        }
    }
}

/// Contigs of one run plus summary statistics.
///
/// With no contigs every numeric field is zero, including `longest` and
/// `shortest`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyResult {
    pub contigs: Vec<String>,
    pub num_contigs: usize,
    pub total_length: usize,
    pub longest: usize,
    pub shortest: usize,
    pub n50: usize,
    pub n90: usize,
    pub mean_length: f64,
    pub diagnostics: Diagnostics,
}

/// Nx of lengths already sorted in descending order: the length at which the
/// running sum first covers `percent`% of the total. Zero for no lengths.
pub fn nx(sorted_desc: &[usize], percent: usize) -> usize {
    let total: usize = sorted_desc.iter().sum();
    if total == 0 {
        return 0;
    }
    let mut cumulative = 0usize;
    for &length in sorted_desc {
        cumulative += length;
        if cumulative * 100 >= total * percent {
            return length;
        }
    }
    0
}

/// N50 of arbitrary-order lengths.
pub fn n50(lengths: &[usize]) -> usize {
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    nx(&sorted, 50)
}

/// Summarise a contig set. Contig order is preserved in the result.
pub fn summarize<I, S>(contigs: I) -> AssemblyResult
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let contigs: Vec<String> = contigs.into_iter().map(Into::into).collect();
    let mut lengths: Vec<usize> = contigs.iter().map(String::len).collect();
    lengths.sort_unstable_by(|a, b| b.cmp(a));

    let total_length: usize = lengths.iter().sum();
    let mean_length = if lengths.is_empty() {
        0.0
    } else {
        total_length as f64 / lengths.len() as f64
    };

    AssemblyResult {
        num_contigs: contigs.len(),
        total_length,
        longest: lengths.first().copied().unwrap_or(0),
        shortest: lengths.last().copied().unwrap_or(0),
        n50: nx(&lengths, 50),
        n90: nx(&lengths, 90),
        mean_length,
        contigs,
        diagnostics: Diagnostics::default(),
    }
}
