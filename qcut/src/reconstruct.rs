//! Turn a fragment graph back into a linear [`Program`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::visit::EdgeRef;
use thiserror::Error;
use tracing::trace;

use crate::graph::{CircuitGraph, Node};
use crate::ops::{OpType, Operation, Wire};
use crate::program::{Program, ReadOut};

/// The graph of a fragment has a cycle, so its operations cannot be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fragment has a cycle through {node}: {unordered} of {total} nodes could not be ordered")]
pub struct CyclicFragmentError {
    /// A node on or behind the cycle.
    pub node: Node,
    /// The number of nodes left unordered.
    pub unordered: usize,
    /// The number of nodes in the fragment.
    pub total: usize,
}

/// Order the nodes of `graph` topologically, taking the lowest handle among
/// the ready nodes at each step.
///
/// Every edge counts, so a cut whose two placeholders share the graph orders
/// the measure before the prepare.
pub fn ranked_topological_order(graph: &CircuitGraph) -> Result<Vec<Node>, CyclicFragmentError> {
    let petgraph = graph.as_petgraph();
    let mut in_degree: HashMap<Node, usize> = graph
        .nodes()
        .map(|n| (n, petgraph.edges_directed(n.into(), Direction::Incoming).count()))
        .collect();
    let mut ready: BinaryHeap<Reverse<Node>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| Reverse(*n))
        .collect();

    let mut order = Vec::with_capacity(graph.num_nodes());
    while let Some(Reverse(n)) = ready.pop() {
        order.push(n);
        for e in petgraph.edges_directed(n.into(), Direction::Outgoing) {
            let succ = Node::from(e.target());
            if let Some(d) = in_degree.get_mut(&succ) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(succ));
                }
            }
        }
    }

    let ordered: HashSet<Node> = order.iter().copied().collect();
    if let Some(node) = graph.nodes().find(|n| !ordered.contains(n)) {
        return Err(CyclicFragmentError {
            node,
            unordered: graph.num_nodes() - order.len(),
            total: graph.num_nodes(),
        });
    }
    Ok(order)
}

/// Linearise a fragment graph into a program.
///
/// Operations come in [`ranked_topological_order`]. Read-out factors are
/// collected back into read-outs; the program has exactly
/// [`CircuitGraph::num_read_outs`] read-outs, some possibly the identity.
///
/// Each chain of data edges along a wire runs on its own physical wire. The
/// first chain found on a wire keeps its label, later ones get fresh labels
/// above every label in the graph. Fresh wires start in `|0>`.
pub fn graph_to_program(graph: &CircuitGraph) -> Result<Program, CyclicFragmentError> {
    let order = ranked_topological_order(graph)?;

    let mut next_fresh = graph
        .nodes()
        .flat_map(|n| graph.op(n).wires.iter().map(|w| w.index() + 1))
        .max()
        .unwrap_or(0);
    let mut claimed: HashSet<Wire> = HashSet::new();
    let mut physical: HashMap<(Node, Wire), Wire> = HashMap::new();

    let mut operations = Vec::new();
    let mut read_outs = vec![ReadOut::identity(); graph.num_read_outs()];
    for n in order {
        let op = graph.op(n);
        let wires = op
            .wires
            .iter()
            .map(|&w| {
                let label = match graph.wire_predecessor(n, w) {
                    Some(pred) => physical[&(pred, w)],
                    None if claimed.insert(w) => w,
                    None => {
                        let fresh = Wire::new(next_fresh);
                        next_fresh += 1;
                        trace!(%n, from = %w, to = %fresh, "relabelled wire segment");
                        fresh
                    }
                };
                physical.insert((n, w), label);
                label
            })
            .collect::<Vec<_>>();

        match op.op {
            OpType::Observe { read_out, pauli } => {
                if let Some(r) = read_outs.get_mut(read_out) {
                    r.push_factor(wires[0], pauli);
                }
            }
            _ => operations.push(Operation {
                op: op.op.clone(),
                wires,
            }),
        }
    }

    Ok(Program::from_parts(operations, read_outs))
}
