//! Split a resolved circuit graph into fragments, and record how the
//! fragments talk to each other across cuts.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{CircuitGraph, Node};
use crate::ops::CutId;

/// A weakly connected piece of a resolved [`CircuitGraph`].
///
/// Connectivity ignores [`CircuitEdge::Cut`](crate::graph::CircuitEdge::Cut)
/// links, so the two placeholders of a cut only share a fragment when the
/// circuit connects them some other way. Such a link is kept inside the
/// fragment graph.
#[derive(Clone, Debug)]
pub struct Fragment {
    graph: CircuitGraph,
    /// The handle each local node had in the graph the fragment was cut
    /// from, indexed by local handle.
    origin: Vec<Node>,
}

impl Fragment {
    /// The fragment as a standalone graph, with its own node handles.
    pub fn graph(&self) -> &CircuitGraph {
        &self.graph
    }

    /// Consume the fragment, returning its graph.
    pub fn into_graph(self) -> CircuitGraph {
        self.graph
    }

    /// The handle a fragment node had in the graph the fragment was cut from.
    pub fn origin(&self, local: Node) -> Option<Node> {
        self.origin.get(local.index()).copied()
    }

    /// The number of measure and prepare placeholders in the fragment.
    pub fn num_placeholders(&self) -> usize {
        self.graph
            .nodes()
            .filter(|&n| self.graph.op(n).op.is_placeholder())
            .count()
    }
}

/// The two placeholders of a cut, as handles local to their fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CutPair {
    /// The cut.
    pub cut: CutId,
    /// The measure placeholder, in the source fragment.
    pub measure: Node,
    /// The prepare placeholder, in the target fragment.
    pub prepare: Node,
}

/// A cut seen from the fragments: the source fragment measures, the target
/// fragment prepares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunicationEdge {
    /// Index of the fragment holding the measure placeholder.
    pub source: usize,
    /// Index of the fragment holding the prepare placeholder.
    pub target: usize,
    /// The placeholders joined by the cut.
    pub pair: CutPair,
}

/// Fragment-level multigraph with one edge per cut.
///
/// Source and target coincide for a cut whose two sides ended up in the same
/// fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationGraph {
    num_fragments: usize,
    edges: Vec<CommunicationEdge>,
}

impl CommunicationGraph {
    /// A graph over `num_fragments` fragments with no edges.
    pub fn new(num_fragments: usize) -> Self {
        Self {
            num_fragments,
            edges: Vec::new(),
        }
    }

    /// Add an edge.
    ///
    /// # Panics
    ///
    /// If either endpoint is not a fragment of the graph.
    pub fn add_edge(&mut self, edge: CommunicationEdge) {
        assert!(
            edge.source < self.num_fragments && edge.target < self.num_fragments,
            "communication edge {} -> {} leaves a graph of {} fragments",
            edge.source,
            edge.target,
            self.num_fragments
        );
        self.edges.push(edge);
    }

    /// The number of fragments.
    pub fn num_fragments(&self) -> usize {
        self.num_fragments
    }

    /// The edges, in insertion order.
    pub fn edges(&self) -> &[CommunicationEdge] {
        &self.edges
    }

    /// The number of edges, equal to the number of cuts.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// The edge for a cut.
    pub fn edge_for_cut(&self, cut: CutId) -> Option<&CommunicationEdge> {
        self.edges.iter().find(|e| e.pair.cut == cut)
    }

    /// The edges touching a fragment, in insertion order.
    pub fn edges_of(&self, fragment: usize) -> impl Iterator<Item = &CommunicationEdge> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.source == fragment || e.target == fragment)
    }
}

/// Split `graph` into its fragments.
///
/// Fragments are ordered by their lowest node handle in `graph`, and the
/// communication graph lists the cuts in edge order of `graph`, so the result
/// only depends on the insertion order of the graph.
pub fn fragment_graph(graph: &CircuitGraph) -> (Vec<Fragment>, CommunicationGraph) {
    let components = graph.partition(|e| e.weight().is_cut());

    let mut location: HashMap<Node, (usize, Node)> = HashMap::new();
    let fragments = components
        .into_iter()
        .enumerate()
        .map(|(index, nodes)| {
            let (sub, map) = graph.induced_subgraph(&nodes);
            let mut origin = nodes.clone();
            for (old, new) in map {
                origin[new.index()] = old;
                location.insert(old, (index, new));
            }
            Fragment { graph: sub, origin }
        })
        .collect_vec();

    let mut comm = CommunicationGraph::new(fragments.len());
    for (measure, prepare, cut) in graph.cut_edges() {
        let (source, measure) = location[&measure];
        let (target, prepare) = location[&prepare];
        comm.add_edge(CommunicationEdge {
            source,
            target,
            pair: CutPair {
                cut,
                measure,
                prepare,
            },
        });
    }

    debug!(
        fragments = fragments.len(),
        cuts = comm.num_edges(),
        "fragmented circuit graph"
    );
    (fragments, comm)
}
