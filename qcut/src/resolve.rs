//! Replace [`OpType::WireCut`] markers by measure/prepare placeholder pairs.

use thiserror::Error;
use tracing::debug;

use crate::graph::{CircuitGraph, Node};
use crate::ops::{CutId, OpType, Operation};

/// A cut placed in a [`CircuitGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlacedCut {
    /// Identifier shared by both placeholders.
    pub cut: CutId,
    /// The [`OpType::MeasureNode`] ending the upstream side.
    pub measure: Node,
    /// The [`OpType::PrepareNode`] starting the downstream side.
    pub prepare: Node,
}

/// Errors replacing a wire cut marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The node does not exist.
    #[error("{0} is not in the graph")]
    MissingNode(Node),
    /// The node is not a [`OpType::WireCut`].
    #[error("{node} is a {op}, not a wire cut")]
    NotAWireCut {
        /// The node.
        node: Node,
        /// Its operation.
        op: String,
    },
}

/// Remove a [`OpType::WireCut`] marker from the graph, splicing every wire it
/// occupied through a new measure/prepare pair.
///
/// For each wire, the marker's predecessor on that wire now feeds a
/// [`OpType::MeasureNode`], and a [`OpType::PrepareNode`] feeds the marker's
/// successors. The two placeholders are joined only by a
/// [`CircuitEdge::Cut`](crate::graph::CircuitEdge::Cut) edge. When the marker is
/// the first (resp. last) operation on a wire, the measure (resp. prepare)
/// placeholder is created without any data edge: an open boundary.
///
/// Returns the cuts placed, one per wire of the marker, in wire order.
pub fn replace_wire_cut_node(
    graph: &mut CircuitGraph,
    node: Node,
) -> Result<Vec<PlacedCut>, ResolveError> {
    let op = graph.get_op(node).ok_or(ResolveError::MissingNode(node))?;
    if !op.op.is_wire_cut() {
        return Err(ResolveError::NotAWireCut {
            node,
            op: op.op.to_string(),
        });
    }
    let splices = op
        .wires
        .iter()
        .map(|&w| {
            (
                w,
                graph.wire_predecessor(node, w),
                graph.wire_successors(node, w),
            )
        })
        .collect::<Vec<_>>();
    graph.remove_node(node);

    let placed = splices
        .into_iter()
        .map(|(w, pred, succs)| {
            let cut = graph.fresh_cut_id();
            let measure = graph.add_op(Operation::new(OpType::MeasureNode(cut), [w]));
            let prepare = graph.add_op(Operation::new(OpType::PrepareNode(cut), [w]));
            if let Some(pred) = pred {
                graph.connect(pred, measure, w);
            }
            for succ in succs {
                graph.connect(prepare, succ, w);
            }
            graph.connect_cut(measure, prepare, cut);
            PlacedCut {
                cut,
                measure,
                prepare,
            }
        })
        .collect();
    Ok(placed)
}

/// Replace every [`OpType::WireCut`] marker of the graph, in handle order.
pub fn replace_wire_cut_nodes(graph: &mut CircuitGraph) -> Result<Vec<PlacedCut>, ResolveError> {
    let mut placed = Vec::new();
    for marker in graph.wire_cuts() {
        placed.extend(replace_wire_cut_node(graph, marker)?);
    }
    debug!(cuts = placed.len(), "resolved wire cut markers");
    Ok(placed)
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::ops::{Gate, Pauli, Wire};
    use crate::program::{Program, ReadOut};

    fn count_kind(g: &CircuitGraph, f: impl Fn(&OpType) -> bool) -> usize {
        g.nodes().filter(|&n| f(&g.op(n).op)).count()
    }

    #[test]
    fn splice_single_wire() {
        let mut p = Program::new();
        p.add_gate(Gate::H, [0])
            .add_wire_cut([0])
            .add_gate(Gate::X, [0])
            .add_read_out(ReadOut::single(0, Pauli::Z));
        let mut g = CircuitGraph::from_program(&p).unwrap();
        let [h, marker, x, _] = g.nodes().collect::<Vec<_>>()[..] else {
            panic!()
        };

        let placed = replace_wire_cut_node(&mut g, marker).unwrap();
        assert_eq!(placed.len(), 1);
        let PlacedCut {
            cut,
            measure,
            prepare,
        } = placed[0];
        assert!(!g.contains_node(marker));
        assert_eq!(g.op(measure).op, OpType::MeasureNode(cut));
        assert_eq!(g.op(prepare).op, OpType::PrepareNode(cut));
        assert_eq!(g.wire_predecessor(measure, Wire::new(0)), Some(h));
        assert_eq!(g.wire_successors(prepare, Wire::new(0)), vec![x]);
        assert_eq!(g.cut_edges().collect::<Vec<_>>(), vec![(measure, prepare, cut)]);
        // The placeholders are not joined by data.
        assert!(g.wire_successors(measure, Wire::new(0)).is_empty());
        assert!(!g.has_wire_input(prepare, Wire::new(0)));
    }

    #[rstest]
    #[case::first(true)]
    #[case::last(false)]
    fn open_boundaries(#[case] at_start: bool) {
        let mut p = Program::new();
        if at_start {
            p.add_wire_cut([0]).add_gate(Gate::H, [0]);
        } else {
            p.add_gate(Gate::H, [0]).add_wire_cut([0]);
        }
        let mut g = CircuitGraph::from_program(&p).unwrap();
        let placed = replace_wire_cut_nodes(&mut g).unwrap();
        let [PlacedCut {
            measure, prepare, ..
        }] = placed[..]
        else {
            panic!()
        };
        if at_start {
            assert!(!g.has_wire_input(measure, Wire::new(0)));
            assert_eq!(g.wire_successors(prepare, Wire::new(0)).len(), 1);
        } else {
            assert!(g.has_wire_input(measure, Wire::new(0)));
            assert!(g.wire_successors(prepare, Wire::new(0)).is_empty());
        }
        assert_eq!(g.cut_edges().count(), 1);
    }

    #[test]
    fn multi_wire_marker() {
        let mut p = Program::new();
        p.add_gate(Gate::CX, [0, 1])
            .add_gate(Gate::H, [2])
            .add_wire_cut([0, 1, 2])
            .add_gate(Gate::CZ, [1, 2])
            .add_read_out(ReadOut::single(0, Pauli::X));
        let mut g = CircuitGraph::from_program(&p).unwrap();
        let before = g.num_nodes();

        let placed = replace_wire_cut_nodes(&mut g).unwrap();
        assert_eq!(placed.len(), 3);
        assert_eq!(g.num_nodes(), before - 1 + 2 * placed.len());
        assert_eq!(count_kind(&g, OpType::is_wire_cut), 0);
        assert_eq!(count_kind(&g, |op| matches!(op, OpType::MeasureNode(_))), 3);
        assert_eq!(count_kind(&g, |op| matches!(op, OpType::PrepareNode(_))), 3);
        // Cut identifiers are distinct.
        let ids = placed.iter().map(|c| c.cut).collect::<std::collections::BTreeSet<_>>();
        assert_eq!(ids.len(), 3);
        // The prepare node on wire 0 feeds the read-out factor.
        let prep0 = placed[0].prepare;
        let succ = g.wire_successors(prep0, Wire::new(0));
        assert_eq!(succ.len(), 1);
        assert!(g.op(succ[0]).op.is_observe());
    }

    #[test]
    fn not_a_marker() {
        let mut p = Program::new();
        p.add_gate(Gate::H, [0]);
        let mut g = CircuitGraph::from_program(&p).unwrap();
        let h = g.nodes().next().unwrap();
        assert_matches!(
            replace_wire_cut_node(&mut g, h),
            Err(ResolveError::NotAWireCut { .. })
        );
        g.remove_node(h);
        assert_matches!(
            replace_wire_cut_node(&mut g, h),
            Err(ResolveError::MissingNode(_))
        );
    }
}
