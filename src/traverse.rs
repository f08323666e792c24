//! Greedy contig extraction.
//!
//! A walk starts from an unvisited seed, repeatedly follows the preferred
//! outgoing edge (heaviest, then smallest target) and appends the last symbol
//! of each node it reaches. It stops at a dead end, when it steps onto a node
//! that some walk of the same run already visited, or when the contig reaches
//! the length cap. One visited set is shared by every walk of a run.

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::Serialize;

use crate::graph::{KmerGraph, NodeId};

/// Per-contig length bound for highly repetitive input.
pub const DEFAULT_LENGTH_CAP: usize = 2_000_000;

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The current node has no outgoing edge.
    DeadEnd,
    /// The walk stepped onto an already visited node (cycle guard).
    Revisit,
    /// The contig reached the length cap.
    LengthCap,
}

/// Order in which unvisited nodes are tried as walk seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedOrder {
    /// Nodes without predecessors first, then the rest; content order in each group.
    #[default]
    SourcesFirst,
    /// Plain content order.
    Lexicographic,
}

impl FromStr for SeedOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sources-first" | "sources_first" | "sources" => Ok(SeedOrder::SourcesFirst),
            "lexicographic" | "lex" => Ok(SeedOrder::Lexicographic),
            other => Err(format!(
                "unknown seed order '{other}' (expected 'sources-first' or 'lexicographic')"
            )),
        }
    }
}

impl fmt::Display for SeedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedOrder::SourcesFirst => write!(f, "sources-first"),
            SeedOrder::Lexicographic => write!(f, "lexicographic"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalkConfig {
    /// Maximum contig length in symbols.
    pub length_cap: usize,
    pub seed_order: SeedOrder,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            length_cap: DEFAULT_LENGTH_CAP,
            seed_order: SeedOrder::default(),
        }
    }
}

/// Sequence produced by a single walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contig {
    pub sequence: String,
    pub seed: NodeId,
    /// Number of edges followed; `sequence.len() == k - 1 + edges`.
    pub edges: usize,
    pub termination: Termination,
}

impl Contig {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl From<Contig> for String {
    fn from(contig: Contig) -> Self {
        contig.sequence
    }
}

/// Seed candidates for `graph` in the requested order.
pub fn seed_order(graph: &KmerGraph, order: SeedOrder) -> Vec<NodeId> {
    match order {
        SeedOrder::Lexicographic => (0..graph.num_nodes()).collect(),
        SeedOrder::SourcesFirst => {
            let mut seeds: Vec<NodeId> = graph.sources().collect();
            seeds.extend((0..graph.num_nodes()).filter(|&id| graph.in_degree(id) > 0));
            seeds
        }
    }
}

/// Walk from an already claimed `seed`. `claim` marks a node visited and
/// returns false when it had been visited before.
fn walk<F>(graph: &KmerGraph, seed: NodeId, length_cap: usize, mut claim: F) -> Contig
where
    F: FnMut(NodeId) -> bool,
{
    let mut sequence = graph.node(seed).to_string();
    let mut current = seed;
    let mut edges = 0usize;

    let termination = loop {
        let Some(edge) = graph.best_successor(current) else {
            break Termination::DeadEnd;
        };
        if sequence.len() >= length_cap {
            break Termination::LengthCap;
        }
        let label = graph.node(edge.target);
        // Labels are ASCII, the last byte is the last symbol.
        sequence.push_str(&label[label.len() - 1..]);
        edges += 1;
        trace!(
            "{} -> {} (multiplicity {})",
            graph.node(current),
            label,
            edge.multiplicity
        );
        current = edge.target;
        if !claim(current) {
            break Termination::Revisit;
        }
    };

    debug!(
        "Contig from {} finished after {} edges ({} bp, {:?})",
        graph.node(seed),
        edges,
        sequence.len(),
        termination
    );
    Contig {
        sequence,
        seed,
        edges,
        termination,
    }
}

/// Lazy contig sequence for one graph.
///
/// The walker owns the visited set of its run, so it can be consumed once;
/// a fresh run needs a fresh walker.
pub struct ContigWalker<'g> {
    graph: &'g KmerGraph,
    config: WalkConfig,
    visited: Vec<bool>,
    seeds: std::vec::IntoIter<NodeId>,
}

impl<'g> ContigWalker<'g> {
    pub fn new(graph: &'g KmerGraph, config: WalkConfig) -> Self {
        ContigWalker {
            graph,
            config,
            visited: vec![false; graph.num_nodes()],
            seeds: seed_order(graph, config.seed_order).into_iter(),
        }
    }

    pub fn is_visited(&self, id: NodeId) -> bool {
        self.visited[id]
    }

    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|&&v| v).count()
    }

    /// Walk from a specific node. Returns `None` when it was already visited.
    pub fn walk_from(&mut self, seed: NodeId) -> Option<Contig> {
        if std::mem::replace(&mut self.visited[seed], true) {
            return None;
        }
        let visited = &mut self.visited;
        Some(walk(self.graph, seed, self.config.length_cap, |id| {
            !std::mem::replace(&mut visited[id], true)
        }))
    }
}

impl Iterator for ContigWalker<'_> {
    type Item = Contig;

    fn next(&mut self) -> Option<Contig> {
        loop {
            let seed = self.seeds.next()?;
            if let Some(contig) = self.walk_from(seed) {
                return Some(contig);
            }
        }
    }
}

/// Contigs of `graph`, produced lazily.
pub fn assemble(graph: &KmerGraph, config: WalkConfig) -> ContigWalker<'_> {
    ContigWalker::new(graph, config)
}

/// Concurrent variant of [`assemble`].
///
/// Walks run on the rayon pool and claim nodes with an atomic test-and-set,
/// so each node is a seed or a walk step of exactly one contig. Contigs come
/// back in seed order.
#[cfg(feature = "parallel")]
pub fn par_assemble(graph: &KmerGraph, config: WalkConfig) -> Vec<Contig> {
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    let visited: Vec<AtomicBool> = (0..graph.num_nodes())
        .map(|_| AtomicBool::new(false))
        .collect();
    let claim = |id: NodeId| !visited[id].swap(true, Ordering::AcqRel);
    let seeds = seed_order(graph, config.seed_order);

    let mut contigs: Vec<(usize, Contig)> = seeds
        .par_iter()
        .enumerate()
        .filter_map(|(rank, &seed)| {
            if !claim(seed) {
                return None;
            }
            Some((rank, walk(graph, seed, config.length_cap, claim)))
        })
        .collect();
    contigs.sort_unstable_by_key(|(rank, _)| *rank);
    contigs.into_iter().map(|(_, contig)| contig).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from(reads: &[&str], k: usize) -> KmerGraph {
        KmerGraph::build(reads, k).expect("valid k")
    }

    #[test]
    fn unique_path_is_walked_to_the_end() {
        let graph = graph_from(&["ACGTT", "CGTTG", "GTTGC", "TTGCA"], 4);
        let contigs: Vec<Contig> = assemble(&graph, WalkConfig::default()).collect();
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].sequence, "ACGTTGCA");
        assert_eq!(contigs[0].termination, Termination::DeadEnd);
        assert_eq!(contigs[0].edges, 5);
        assert_eq!(contigs[0].len(), graph.k() - 1 + contigs[0].edges);
    }

    #[test]
    fn revisit_stops_the_walk() {
        // "AAA" occurs twice; both its successors are tied and AAG wins.
        let genome = "GCAAATCGAAAGT";
        let reads: Vec<String> = (0..=genome.len() - 5)
            .map(|i| genome[i..i + 5].to_string())
            .collect();
        let graph = KmerGraph::build(reads.as_slice(), 4).unwrap();
        let contigs: Vec<Contig> = assemble(&graph, WalkConfig::default()).collect();
        let sequences: Vec<&str> = contigs.iter().map(|c| c.sequence.as_str()).collect();
        assert_eq!(sequences, vec!["GCAAAGT", "AATCGAAA"]);
        assert_eq!(contigs[0].termination, Termination::DeadEnd);
        assert_eq!(contigs[1].termination, Termination::Revisit);
    }

    #[test]
    fn self_loop_terminates() {
        let graph = graph_from(&["AAAAAAAA"], 3);
        let contigs: Vec<Contig> = assemble(&graph, WalkConfig::default()).collect();
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].sequence, "AAA");
        assert_eq!(contigs[0].termination, Termination::Revisit);
    }

    #[test]
    fn length_cap_bounds_every_contig() {
        let graph = graph_from(&["ACGTTGCA"], 4);
        let config = WalkConfig {
            length_cap: 5,
            ..WalkConfig::default()
        };
        let contigs: Vec<Contig> = assemble(&graph, config).collect();
        assert_eq!(contigs[0].sequence, "ACGTT");
        assert_eq!(contigs[0].termination, Termination::LengthCap);
        assert!(contigs.iter().all(|c| c.len() <= 5));
        let sequences: Vec<&str> = contigs.iter().map(|c| c.sequence.as_str()).collect();
        assert_eq!(sequences, vec!["ACGTT", "GCA", "TGCA", "TTGC"]);
    }

    #[test]
    fn seed_orders() {
        let graph = graph_from(&["TTGCA", "ACGTT"], 4);
        let lex: Vec<&str> = seed_order(&graph, SeedOrder::Lexicographic)
            .into_iter()
            .map(|id| graph.node(id))
            .collect();
        assert_eq!(lex, vec!["ACG", "CGT", "GCA", "GTT", "TGC", "TTG"]);
        let sources_first: Vec<&str> = seed_order(&graph, SeedOrder::SourcesFirst)
            .into_iter()
            .map(|id| graph.node(id))
            .collect();
        assert_eq!(sources_first, vec!["ACG", "TTG", "CGT", "GCA", "GTT", "TGC"]);
    }

    #[test]
    fn every_node_is_visited_once_per_run() {
        let graph = graph_from(&["ACGTACGGTCATGCAAGT", "GGTCATTACG"], 4);
        let mut walker = assemble(&graph, WalkConfig::default());
        let contigs: Vec<Contig> = walker.by_ref().collect();
        assert!(!contigs.is_empty());
        assert_eq!(walker.visited_count(), graph.num_nodes());
        assert!(walker.next().is_none());
        assert!(walker.walk_from(0).is_none());
    }

    #[test]
    fn empty_graph_yields_nothing() {
        let graph = graph_from(&[], 4);
        assert_eq!(assemble(&graph, WalkConfig::default()).count(), 0);
    }

    #[test]
    fn seed_order_parses() {
        assert_eq!("lex".parse::<SeedOrder>(), Ok(SeedOrder::Lexicographic));
        assert_eq!(
            "sources-first".parse::<SeedOrder>(),
            Ok(SeedOrder::SourcesFirst)
        );
        assert!("random".parse::<SeedOrder>().is_err());
        assert_eq!(SeedOrder::Lexicographic.to_string(), "lexicographic");
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_walks_cover_every_node_once() {
        let graph = graph_from(&["ACGTTGCA"], 4);
        let contigs = par_assemble(&graph, WalkConfig::default());
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].sequence, "ACGTTGCA");
    }
}
