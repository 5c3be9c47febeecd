//! Directed multigraph representation of a circuit.
//!
//! Every [`Operation`] of a [`Program`] is a node. An edge `a -> b` labelled
//! with [`CircuitEdge::Wire`] means `b` consumes the state `a` left on that
//! wire; two operations sharing several wires are joined by several distinct
//! edges. [`CircuitEdge::Cut`] edges join the two placeholders of a cut and
//! carry no data.

use std::collections::HashMap;
use std::fmt;

use derive_more::{Display, From};
use itertools::Itertools;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, EdgeReference, NodeIndex, StableDiGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::ops::{CutId, InvalidOperation, OpType, Operation, Wire};
use crate::program::Program;

/// A handle to a node in a [`CircuitGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Node {
    index: NodeIndex,
}

impl Node {
    /// The raw index of the node.
    pub fn index(self) -> usize {
        self.index.index()
    }
}

impl From<u32> for Node {
    fn from(index: u32) -> Self {
        NodeIndex::new(index as usize).into()
    }
}

impl From<Node> for NodeIndex {
    fn from(node: Node) -> Self {
        node.index
    }
}

impl From<Node> for u32 {
    fn from(node: Node) -> Self {
        node.index.index() as u32
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.index())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Label of an edge in a [`CircuitGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum CircuitEdge {
    /// Data dependency along a wire.
    #[display("{_0}")]
    Wire(Wire),
    /// Link from a measure placeholder to its prepare partner.
    #[display("{_0}")]
    Cut(CutId),
}

impl CircuitEdge {
    /// The wire of a data edge.
    pub fn as_wire(&self) -> Option<Wire> {
        match self {
            CircuitEdge::Wire(w) => Some(*w),
            CircuitEdge::Cut(_) => None,
        }
    }

    /// Returns `true` for the link between two placeholders.
    pub fn is_cut(&self) -> bool {
        matches!(self, CircuitEdge::Cut(_))
    }
}

/// A data edge `source -> target` along `wire`.
///
/// Cut placement methods propose cuts as lists of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireEdge {
    /// The operation producing the state.
    pub source: Node,
    /// The operation consuming the state.
    pub target: Node,
    /// The wire carrying it.
    pub wire: Wire,
}

impl fmt::Display for WireEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.wire, self.target)
    }
}

/// Errors building a [`CircuitGraph`] from a malformed [`Program`].
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// An operation of the program is malformed.
    #[error("operation {index} ({op}) is malformed: {source}")]
    InvalidOperation {
        /// Position of the operation in the program.
        index: usize,
        /// The offending operation kind.
        op: OpType,
        /// What is wrong with it.
        source: InvalidOperation,
    },
    /// A read-out factor was placed in the body of the program.
    #[error("operation {index} is a read-out factor, which cannot appear in a program body")]
    ObserveInBody {
        /// Position of the operation in the program.
        index: usize,
    },
    /// A read-out lists the same wire twice.
    #[error("read-out {read_out} observes wire {wire} more than once")]
    DuplicateReadOutWire {
        /// Index of the read-out.
        read_out: usize,
        /// The repeated wire.
        wire: Wire,
    },
    /// Two placeholders of the same kind share a cut identifier.
    #[error("operation {index} reuses the identifier of {cut}")]
    DuplicatePlaceholder {
        /// Position of the second placeholder in the program.
        index: usize,
        /// The shared identifier.
        cut: CutId,
    },
    /// An operation acts on a wire that a measure placeholder has ended.
    #[error("operation {index} acts on wire {wire} after it was measured for {cut}")]
    UseAfterMeasure {
        /// Position of the operation in the program.
        index: usize,
        /// The measured wire.
        wire: Wire,
        /// The cut of the measure placeholder.
        cut: CutId,
    },
    /// A read-out observes a wire that a measure placeholder has ended.
    #[error("read-out {read_out} observes wire {wire} after it was measured for {cut}")]
    ObserveAfterMeasure {
        /// Index of the read-out.
        read_out: usize,
        /// The measured wire.
        wire: Wire,
        /// The cut of the measure placeholder.
        cut: CutId,
    },
    /// A prepare placeholder acts on a wire still carrying a state.
    ///
    /// Only a measure placeholder may come before a prepare on the same wire.
    #[error("operation {index} prepares wire {wire} for {cut} but the wire is already in use")]
    PrepareInUse {
        /// Position of the prepare placeholder in the program.
        index: usize,
        /// The wire in use.
        wire: Wire,
        /// The cut of the prepare placeholder.
        cut: CutId,
    },
    /// A placeholder has no partner in the program.
    #[error("{cut} has a {op} but no partner")]
    UnpairedPlaceholder {
        /// The identifier of the lone placeholder.
        cut: CutId,
        /// The lone placeholder.
        op: OpType,
    },
}

/// A circuit as a directed multigraph of operations.
///
/// Nodes live in an arena and are addressed by [`Node`] handles, which stay
/// valid when other nodes are removed.
#[derive(Clone, Debug, Default)]
pub struct CircuitGraph {
    graph: StableDiGraph<Operation, CircuitEdge>,
    /// Number of read-outs of the program the graph was built from.
    num_read_outs: usize,
    /// Lowest unused cut identifier.
    next_cut: u32,
}

impl CircuitGraph {
    /// Create an empty graph producing `num_read_outs` read-outs.
    pub fn new(num_read_outs: usize) -> Self {
        Self {
            num_read_outs,
            ..Default::default()
        }
    }

    /// Build the graph of a program.
    ///
    /// For every wire, an edge is added from the most recent operation on that
    /// wire to the next one, in program order. Each factor of each read-out
    /// becomes a single-wire [`OpType::Observe`] node after the last operation
    /// on its wire; read-out factors never advance the wire, so several
    /// read-outs may observe the same wire.
    ///
    /// Placeholders already present in the program are linked by a
    /// [`CircuitEdge::Cut`]; both halves of every cut must be present. A
    /// measure placeholder ends its wire and a prepare placeholder starts one,
    /// so neither gets a data edge on that side. The only operation allowed
    /// on a wire after a measure is a prepare.
    pub fn from_program(program: &Program) -> Result<Self, BuildError> {
        let mut circ = Self::new(program.read_outs().len());
        let mut frontier: HashMap<Wire, NodeIndex> = HashMap::new();
        let mut measures = HashMap::new();
        let mut prepares = HashMap::new();

        for (index, op) in program.operations().iter().enumerate() {
            op.validate()
                .map_err(|source| BuildError::InvalidOperation {
                    index,
                    op: op.op.clone(),
                    source,
                })?;
            let n = circ.graph.add_node(op.clone());
            match op.op {
                OpType::Observe { .. } => return Err(BuildError::ObserveInBody { index }),
                OpType::MeasureNode(cut) => {
                    if measures.insert(cut, n).is_some() {
                        return Err(BuildError::DuplicatePlaceholder { index, cut });
                    }
                }
                OpType::PrepareNode(cut) => {
                    if prepares.insert(cut, n).is_some() {
                        return Err(BuildError::DuplicatePlaceholder { index, cut });
                    }
                }
                _ => {}
            }
            if let Some(id) = op.op.cut_id() {
                circ.next_cut = circ.next_cut.max(id.index() + 1);
            }
            for &w in &op.wires {
                let Some(prev) = frontier.insert(w, n) else {
                    continue;
                };
                let measured = match circ.graph[prev].op {
                    OpType::MeasureNode(cut) => Some(cut),
                    _ => None,
                };
                match (measured, &op.op) {
                    (Some(_), OpType::PrepareNode(_)) => {}
                    (Some(cut), _) => {
                        return Err(BuildError::UseAfterMeasure {
                            index,
                            wire: w,
                            cut,
                        });
                    }
                    (None, &OpType::PrepareNode(cut)) => {
                        return Err(BuildError::PrepareInUse {
                            index,
                            wire: w,
                            cut,
                        });
                    }
                    (None, _) => {
                        circ.graph.add_edge(prev, n, CircuitEdge::Wire(w));
                    }
                }
            }
        }

        for (read_out, r) in program.read_outs().iter().enumerate() {
            if let Some(&wire) = r.factors().iter().map(|(w, _)| w).duplicates().next() {
                return Err(BuildError::DuplicateReadOutWire { read_out, wire });
            }
            for &(w, pauli) in r.factors() {
                let measured = frontier.get(&w).and_then(|&prev| match circ.graph[prev].op {
                    OpType::MeasureNode(cut) => Some(cut),
                    _ => None,
                });
                if let Some(cut) = measured {
                    return Err(BuildError::ObserveAfterMeasure {
                        read_out,
                        wire: w,
                        cut,
                    });
                }
                let n = circ
                    .graph
                    .add_node(Operation::new(OpType::Observe { read_out, pauli }, [w]));
                if let Some(&prev) = frontier.get(&w) {
                    circ.graph.add_edge(prev, n, CircuitEdge::Wire(w));
                }
            }
        }

        for (id, meas) in measures.into_iter().sorted_by_key(|(id, _)| *id) {
            let Some(prep) = prepares.remove(&id) else {
                return Err(BuildError::UnpairedPlaceholder {
                    cut: id,
                    op: OpType::MeasureNode(id),
                });
            };
            circ.graph.add_edge(meas, prep, CircuitEdge::Cut(id));
        }
        if let Some(&id) = prepares.keys().min() {
            return Err(BuildError::UnpairedPlaceholder {
                cut: id,
                op: OpType::PrepareNode(id),
            });
        }

        trace!(
            nodes = circ.num_nodes(),
            edges = circ.num_edges(),
            "built circuit graph"
        );
        Ok(circ)
    }

    /// The number of read-outs every program generated from this graph has.
    pub fn num_read_outs(&self) -> usize {
        self.num_read_outs
    }

    /// The number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// The number of edges, of either kind.
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over the nodes in handle order.
    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.graph.node_indices().map_into()
    }

    /// The operation at a node, if the node exists.
    pub fn get_op(&self, node: Node) -> Option<&Operation> {
        self.graph.node_weight(node.index)
    }

    /// The operation at a node.
    ///
    /// # Panics
    ///
    /// If the node is not in the graph.
    pub fn op(&self, node: Node) -> &Operation {
        self.get_op(node)
            .unwrap_or_else(|| panic!("{node} is not in the graph"))
    }

    /// Returns `true` if the node is in the graph.
    pub fn contains_node(&self, node: Node) -> bool {
        self.graph.contains_node(node.index)
    }

    /// The [`OpType::WireCut`] markers, in handle order.
    pub fn wire_cuts(&self) -> Vec<Node> {
        self.nodes().filter(|&n| self.op(n).op.is_wire_cut()).collect()
    }

    /// The data edges, in edge order.
    pub fn wire_edges(&self) -> impl Iterator<Item = WireEdge> + '_ {
        self.graph.edge_references().filter_map(|e| {
            e.weight().as_wire().map(|wire| WireEdge {
                source: e.source().into(),
                target: e.target().into(),
                wire,
            })
        })
    }

    /// The links between placeholders, in edge order, as
    /// `(measure, prepare, cut)` triples.
    pub fn cut_edges(&self) -> impl Iterator<Item = (Node, Node, CutId)> + '_ {
        self.graph.edge_references().filter_map(|e| match e.weight() {
            CircuitEdge::Cut(id) => Some((e.source().into(), e.target().into(), *id)),
            CircuitEdge::Wire(_) => None,
        })
    }

    /// The operation feeding `node` on `wire`, if any.
    pub fn wire_predecessor(&self, node: Node, wire: Wire) -> Option<Node> {
        self.graph
            .edges_directed(node.index, Direction::Incoming)
            .find(|e| *e.weight() == CircuitEdge::Wire(wire))
            .map(|e| e.source().into())
    }

    /// The operations fed by `node` on `wire`.
    ///
    /// There is at most one unless the successors are read-out factors.
    pub fn wire_successors(&self, node: Node, wire: Wire) -> Vec<Node> {
        let mut succs = self
            .graph
            .edges_directed(node.index, Direction::Outgoing)
            .filter(|e| *e.weight() == CircuitEdge::Wire(wire))
            .map(|e| Node::from(e.target()))
            .collect_vec();
        succs.sort_unstable();
        succs
    }

    /// Returns `true` if a data edge on `wire` enters `node`.
    pub fn has_wire_input(&self, node: Node, wire: Wire) -> bool {
        self.wire_predecessor(node, wire).is_some()
    }

    /// The data edges together with their edge indices.
    pub(crate) fn indexed_wire_edges(&self) -> impl Iterator<Item = (EdgeIndex, WireEdge)> + '_ {
        self.graph.edge_references().filter_map(|e| {
            e.weight().as_wire().map(|wire| {
                let edge = WireEdge {
                    source: e.source().into(),
                    target: e.target().into(),
                    wire,
                };
                (e.id(), edge)
            })
        })
    }

    /// The data edges entering `node`, with their wires.
    pub(crate) fn wire_inputs(&self, node: Node) -> impl Iterator<Item = (EdgeIndex, Wire)> + '_ {
        self.graph
            .edges_directed(node.index, Direction::Incoming)
            .filter_map(|e| e.weight().as_wire().map(|w| (e.id(), w)))
    }

    /// The edge index of the data edge `edge`, if present.
    pub(crate) fn find_wire_edge(&self, edge: WireEdge) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(edge.source.index, edge.target.index)
            .find(|e| *e.weight() == CircuitEdge::Wire(edge.wire))
            .map(|e| e.id())
    }

    /// Allocate a cut identifier not used anywhere in the graph.
    pub fn fresh_cut_id(&mut self) -> CutId {
        let id = CutId::new(self.next_cut);
        self.next_cut += 1;
        id
    }

    /// Add an operation as a new, unconnected node.
    pub fn add_op(&mut self, op: Operation) -> Node {
        if let Some(id) = op.op.cut_id() {
            self.next_cut = self.next_cut.max(id.index() + 1);
        }
        self.graph.add_node(op).into()
    }

    /// Add a data edge.
    pub fn connect(&mut self, source: Node, target: Node, wire: Wire) {
        self.graph
            .add_edge(source.index, target.index, CircuitEdge::Wire(wire));
    }

    /// Link a measure placeholder to its prepare partner.
    pub fn connect_cut(&mut self, measure: Node, prepare: Node, cut: CutId) {
        self.graph
            .add_edge(measure.index, prepare.index, CircuitEdge::Cut(cut));
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, node: Node) -> Option<Operation> {
        self.graph.remove_node(node.index)
    }

    pub(crate) fn remove_edge(&mut self, edge: EdgeIndex) -> Option<CircuitEdge> {
        self.graph.remove_edge(edge)
    }

    /// The underlying petgraph graph.
    pub fn as_petgraph(&self) -> &StableDiGraph<Operation, CircuitEdge> {
        &self.graph
    }

    /// Group the nodes into weakly connected components, ignoring every edge
    /// for which `is_boundary` holds.
    ///
    /// Components are ordered by their lowest node handle and each lists its
    /// nodes in handle order.
    pub(crate) fn partition(
        &self,
        mut is_boundary: impl FnMut(EdgeReference<'_, CircuitEdge>) -> bool,
    ) -> Vec<Vec<Node>> {
        let mut uf = UnionFind::<usize>::new(NodeIndexable::node_bound(&self.graph));
        for e in self.graph.edge_references() {
            if !is_boundary(e) {
                uf.union(e.source().index(), e.target().index());
            }
        }
        let mut component_of_root: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<Node>> = Vec::new();
        for n in self.nodes() {
            let root = uf.find(n.index());
            let c = *component_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[c].push(n);
        }
        components
    }

    /// Copy the nodes `nodes`, and every edge between them, into a new graph.
    ///
    /// Returns the new graph and the map from old to new handles.
    pub(crate) fn induced_subgraph(&self, nodes: &[Node]) -> (Self, HashMap<Node, Node>) {
        let mut sub = Self::new(self.num_read_outs);
        sub.next_cut = self.next_cut;
        let map: HashMap<Node, Node> = nodes
            .iter()
            .map(|&n| (n, sub.graph.add_node(self.op(n).clone()).into()))
            .collect();
        for e in self.graph.edge_references() {
            let (s, t) = (Node::from(e.source()), Node::from(e.target()));
            if let (Some(&s), Some(&t)) = (map.get(&s), map.get(&t)) {
                sub.graph.add_edge(s.index, t.index, *e.weight());
            }
        }
        (sub, map)
    }
}

impl TryFrom<&Program> for CircuitGraph {
    type Error = BuildError;

    fn try_from(program: &Program) -> Result<Self, Self::Error> {
        Self::from_program(program)
    }
}
