//! k-mer overlap graph construction.
//!
//! Every window of length `k` in a read contributes one observation of the
//! edge `window[..k-1] -> window[1..]`. Nodes are the distinct (k-1)-mers and
//! are identified by their content: once [`GraphBuilder::finish`] runs, the
//! node table is sorted lexicographically and a [`NodeId`] is simply a rank in
//! that table, so ids (and therefore every downstream decision) do not depend
//! on the order in which reads were supplied.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;

use crate::error::{AssemblyError, Result};
use crate::read_source::ReadSource;

/// Index of a node in the content-sorted node table.
pub type NodeId = usize;

/// Smallest window size that still yields non-empty nodes.
pub const MIN_K: usize = 2;

/// Outgoing edge of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub target: NodeId,
    /// Number of k-mer observations supporting the edge, always >= 1.
    pub multiplicity: usize,
}

/// Counters collected while streaming reads into the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub reads_seen: usize,
    /// Reads shorter than `k`.
    pub reads_skipped: usize,
    pub windows_seen: usize,
    /// Windows dropped because they touch a symbol outside `ACGT`.
    pub windows_discarded: usize,
}

impl BuildReport {
    pub fn kmers_counted(&self) -> usize {
        self.windows_seen - self.windows_discarded
    }

    /// True when no k-mer made it into the graph.
    pub fn is_empty(&self) -> bool {
        self.kmers_counted() == 0
    }
}

#[inline]
pub fn is_canonical_base(symbol: u8) -> bool {
    matches!(symbol, b'A' | b'C' | b'G' | b'T')
}

/// Streaming accumulator for edge multiplicities.
#[derive(Debug)]
pub struct GraphBuilder {
    k: usize,
    labels: Vec<String>,
    index: HashMap<String, NodeId>,
    counts: HashMap<(NodeId, NodeId), usize>,
    report: BuildReport,
}

impl GraphBuilder {
    pub fn new(k: usize) -> Result<Self> {
        if k < MIN_K {
            return Err(AssemblyError::InvalidConfig(format!(
                "k must be at least {MIN_K}, got {k}"
            )));
        }
        Ok(GraphBuilder {
            k,
            labels: Vec::new(),
            index: HashMap::new(),
            counts: HashMap::new(),
            report: BuildReport::default(),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn report(&self) -> BuildReport {
        self.report
    }

    fn intern(&mut self, label: &str) -> NodeId {
        if let Some(&id) = self.index.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), id);
        id
    }

    /// Count every valid k-mer window of `read`.
    pub fn add_read(&mut self, read: &str) {
        self.report.reads_seen += 1;
        let k = self.k;
        let bytes = read.as_bytes();
        if bytes.len() < k {
            self.report.reads_skipped += 1;
            return;
        }

        // Windows starting before `clean_from` overlap a non-ACGT symbol.
        let mut clean_from = 0usize;
        for end in 0..bytes.len() {
            if !is_canonical_base(bytes[end]) {
                clean_from = end + 1;
            }
            if end + 1 < k {
                continue;
            }
            let start = end + 1 - k;
            self.report.windows_seen += 1;
            if start < clean_from {
                self.report.windows_discarded += 1;
                continue;
            }
            // The whole window is ASCII here, so these byte ranges are char boundaries.
            let source = self.intern(&read[start..end]);
            let target = self.intern(&read[start + 1..=end]);
            *self.counts.entry((source, target)).or_insert(0) += 1;
        }
    }

    /// Freeze the accumulated counts into an immutable graph.
    pub fn finish(self) -> KmerGraph {
        let GraphBuilder {
            k,
            labels,
            counts,
            report,
            ..
        } = self;

        let mut ranked: Vec<(String, NodeId)> = labels
            .into_iter()
            .enumerate()
            .map(|(old_id, label)| (label, old_id))
            .collect();
        ranked.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut remap = vec![0; ranked.len()];
        for (new_id, (_, old_id)) in ranked.iter().enumerate() {
            remap[*old_id] = new_id;
        }
        let nodes: Vec<String> = ranked.into_iter().map(|(label, _)| label).collect();

        let mut edges: Vec<Vec<Edge>> = vec![Vec::new(); nodes.len()];
        let mut in_degree = vec![0usize; nodes.len()];
        for ((source, target), multiplicity) in counts {
            let target = remap[target];
            edges[remap[source]].push(Edge {
                target,
                multiplicity,
            });
            in_degree[target] += 1;
        }
        // Preferred successor first: heaviest edge, ties to the smallest target.
        // Ids follow content order, so comparing ids compares content.
        for list in edges.iter_mut() {
            list.sort_unstable_by(|a, b| {
                b.multiplicity
                    .cmp(&a.multiplicity)
                    .then(a.target.cmp(&b.target))
            });
        }

        KmerGraph {
            k,
            nodes,
            edges,
            in_degree,
            report,
        }
    }
}

/// Immutable k-mer overlap graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerGraph {
    k: usize,
    nodes: Vec<String>,
    edges: Vec<Vec<Edge>>,
    in_degree: Vec<usize>,
    report: BuildReport,
}

impl KmerGraph {
    /// Build the graph for every read of `reads` with window size `k`.
    pub fn build<R: ReadSource + ?Sized>(reads: &R, k: usize) -> Result<Self> {
        let mut builder = GraphBuilder::new(k)?;
        let num_reads = reads.num_reads()?;
        info!("Building k-mer graph from {} reads (k = {})", num_reads, k);
        for id in 0..num_reads {
            let seq = reads.get_seq(id)?;
            builder.add_read(&seq);
        }
        let graph = builder.finish();

        let report = graph.report();
        if report.reads_skipped > 0 {
            debug!(
                "Skipped {} of {} reads shorter than k = {}",
                report.reads_skipped, report.reads_seen, k
            );
        }
        if report.windows_discarded > 0 {
            debug!(
                "Discarded {} windows containing non-ACGT symbols",
                report.windows_discarded
            );
        }
        if graph.is_empty() {
            warn!("No k-mers survived filtering; the graph is empty");
        } else {
            info!(
                "Graph built: {} nodes, {} edges from {} k-mers",
                graph.num_nodes(),
                graph.num_edges(),
                report.kmers_counted()
            );
        }
        Ok(graph)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn report(&self) -> BuildReport {
        self.report
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Content of node `id`.
    pub fn node(&self, id: NodeId) -> &str {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.nodes.iter().map(String::as_str).enumerate()
    }

    /// Look a node up by content.
    pub fn node_id(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .binary_search_by(|node| node.as_str().cmp(label))
            .ok()
    }

    /// Outgoing edges of `id`, preferred successor first.
    pub fn successors(&self, id: NodeId) -> &[Edge] {
        &self.edges[id]
    }

    /// Heaviest outgoing edge, ties broken by the smallest target content.
    pub fn best_successor(&self, id: NodeId) -> Option<&Edge> {
        self.edges[id].first()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.edges[id].len()
    }

    /// Number of distinct predecessors of `id`.
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.in_degree[id]
    }

    /// Nodes without predecessors, in content order.
    pub fn sources(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(move |&id| self.in_degree[id] == 0)
    }

    /// Multiplicity of the edge `source -> target`, looked up by content.
    pub fn multiplicity(&self, source: &str, target: &str) -> Option<usize> {
        let source = self.node_id(source)?;
        let target = self.node_id(target)?;
        self.edges[source]
            .iter()
            .find(|edge| edge.target == target)
            .map(|edge| edge.multiplicity)
    }

    /// Every edge as `(source, target, multiplicity)`, grouped by source.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, usize)> + '_ {
        self.edges.iter().enumerate().flat_map(|(source, list)| {
            list.iter()
                .map(move |edge| (source, edge.target, edge.multiplicity))
        })
    }

    /// JSON node/edge list suitable for external inspection.
    pub fn to_json(&self) -> serde_json::Value {
        let nodes: Vec<_> = self
            .nodes()
            .map(|(id, sequence)| {
                json!({
                    "id": id,
                    "sequence": sequence,
                    "in_degree": self.in_degree(id),
                    "out_degree": self.out_degree(id),
                })
            })
            .collect();
        let edges: Vec<_> = self
            .edges()
            .map(|(source, target, weight)| {
                json!({"source": source, "target": target, "weight": weight})
            })
            .collect();
        json!({"k": self.k, "nodes": nodes, "edges": edges, "report": self.report})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from(reads: &[&str], k: usize) -> KmerGraph {
        KmerGraph::build(reads, k).expect("valid k")
    }

    #[test]
    fn sliding_windows_become_weighted_edges() {
        let graph = graph_from(&["ACGTT", "CGTTG", "GTTGC", "TTGCA"], 4);
        assert_eq!(graph.num_nodes(), 6);
        assert_eq!(graph.num_edges(), 5);
        assert_eq!(graph.multiplicity("ACG", "CGT"), Some(1));
        assert_eq!(graph.multiplicity("CGT", "GTT"), Some(2));
        assert_eq!(graph.multiplicity("GTT", "TTG"), Some(2));
        assert_eq!(graph.multiplicity("TTG", "TGC"), Some(2));
        assert_eq!(graph.multiplicity("TGC", "GCA"), Some(1));
        assert_eq!(graph.multiplicity("GCA", "ACG"), None);
        assert_eq!(graph.report().kmers_counted(), 8);
    }

    #[test]
    fn node_ids_follow_content_order() {
        let graph = graph_from(&["TTGCA", "ACGTT"], 4);
        let labels: Vec<&str> = graph.nodes().map(|(_, label)| label).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
        assert_eq!(graph.node_id("ACG"), Some(0));
        assert_eq!(graph.node_id("AAA"), None);
    }

    #[test]
    fn malformed_symbols_only_drop_their_windows() {
        let graph = graph_from(&["ACGNACGT"], 3);
        let report = graph.report();
        assert_eq!(report.windows_seen, 6);
        assert_eq!(report.windows_discarded, 3);
        assert_eq!(graph.multiplicity("AC", "CG"), Some(2));
        assert_eq!(graph.multiplicity("CG", "GT"), Some(1));
        assert_eq!(graph.node_id("GN"), None);
    }

    #[test]
    fn short_reads_are_skipped_and_counted() {
        let graph = graph_from(&["ACG", "AC", "ACGTA"], 4);
        let report = graph.report();
        assert_eq!(report.reads_seen, 3);
        assert_eq!(report.reads_skipped, 2);
        assert_eq!(graph.num_edges(), 2);
    }

    #[test]
    fn all_reads_skipped_gives_empty_graph() {
        let graph = graph_from(&["AC", "GT"], 5);
        assert!(graph.is_empty());
        assert!(graph.report().is_empty());
        assert_eq!(graph.sources().count(), 0);
    }

    #[test]
    fn rejects_k_below_two() {
        let reads = ["ACGT"];
        assert!(matches!(
            KmerGraph::build(&reads[..], 1),
            Err(AssemblyError::InvalidConfig(_))
        ));
        assert!(GraphBuilder::new(0).is_err());
    }

    #[test]
    fn successors_prefer_weight_then_smallest_target() {
        let tied = graph_from(&["AACA", "AACT"], 3);
        let ac = tied.node_id("AC").unwrap();
        let best = tied.best_successor(ac).unwrap();
        assert_eq!(tied.node(best.target), "CA");

        let weighted = graph_from(&["AACA", "AACT", "ACTG"], 3);
        let ac = weighted.node_id("AC").unwrap();
        let best = weighted.best_successor(ac).unwrap();
        assert_eq!(weighted.node(best.target), "CT");
        assert_eq!(best.multiplicity, 2);
        assert_eq!(weighted.out_degree(ac), 2);
    }

    #[test]
    fn degrees_and_sources() {
        let graph = graph_from(&["ACGTTGCA"], 4);
        let sources: Vec<&str> = graph.sources().map(|id| graph.node(id)).collect();
        assert_eq!(sources, vec!["ACG"]);
        let gca = graph.node_id("GCA").unwrap();
        assert_eq!(graph.in_degree(gca), 1);
        assert_eq!(graph.out_degree(gca), 0);
    }

    #[test]
    fn json_export_lists_nodes_and_edges() {
        let graph = graph_from(&["ACGTT"], 4);
        let value = graph.to_json();
        assert_eq!(value["k"], 4);
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["edges"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["report"]["reads_seen"], 1);
    }
}
