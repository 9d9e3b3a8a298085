//! Compiled graphs.

use std::collections::HashMap;
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use weft_core::{Digest, Type};

use crate::graph::{Node, walk};

/// Counters collected while compiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Fusion passes run.
    pub passes: usize,
    /// Chains replaced by composite nodes.
    pub fusions: usize,
    /// Matched chains left unfused because their builder failed.
    pub fallbacks: usize,
    /// Sub-expressions folded into constants.
    pub folded: usize,
}

/// A compiled set of root nodes ready for execution.
///
/// Holds the rewritten roots and a deduplicated view of every reachable
/// node. Edges point from an input to the node consuming it and carry the
/// parameter name.
pub struct CompiledGraph {
    roots: Vec<Node>,
    graph: DiGraph<Node, String>,
    indices: HashMap<Digest, NodeIndex>,
    stats: CompileStats,
}

impl CompiledGraph {
    /// Creates a compiled graph from rewritten roots.
    pub(crate) fn new(roots: Vec<Node>, stats: CompileStats) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for node in walk(&roots) {
            let index = graph.add_node(node.clone());
            indices.insert(node.digest(), index);
            for (param, input) in node.inputs().into_iter().flat_map(|i| i.iter()) {
                if let Some(&from) = indices.get(&input.digest()) {
                    graph.add_edge(from, index, param.to_owned());
                }
            }
        }

        Self {
            roots,
            graph,
            indices,
            stats,
        }
    }

    /// Returns the rewritten roots, in the order they were given.
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Returns the declared types of the roots.
    pub fn output_types(&self) -> Vec<&Type> {
        self.roots.iter().map(Node::output_type).collect()
    }

    /// Returns the compile statistics.
    pub fn stats(&self) -> CompileStats {
        self.stats
    }

    /// Returns the number of distinct nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of input edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the node with the given digest.
    pub fn node(&self, digest: &Digest) -> Option<&Node> {
        self.indices
            .get(digest)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Iterates every distinct node, inputs before consumers.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Iterates the composite nodes synthesized by pushdown.
    pub fn composites(&self) -> impl Iterator<Item = &Node> {
        self.nodes()
            .filter(|node| node.op().is_some_and(|op| op.is_composite()))
    }

    /// Returns the nodes consuming the node with the given digest.
    pub fn consumers(&self, digest: &Digest) -> impl Iterator<Item = &Node> {
        self.indices.get(digest).into_iter().flat_map(|&idx| {
            self.graph
                .neighbors_directed(idx, Direction::Outgoing)
                .filter_map(|succ| self.graph.node_weight(succ))
        })
    }

    /// Returns the nodes in topological order (inputs first).
    pub fn topological_order(&self) -> Vec<&Node> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|indices| {
                indices
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a reference to the underlying petgraph.
    pub fn inner(&self) -> &DiGraph<Node, String> {
        &self.graph
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("roots", &self.roots.len())
            .field("node_count", &self.graph.node_count())
            .field("edge_count", &self.graph.edge_count())
            .field("stats", &self.stats)
            .finish()
    }
}
