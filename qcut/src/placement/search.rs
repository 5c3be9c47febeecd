//! Reference cut search heuristics.

use std::collections::HashSet;

use itertools::Itertools;
use petgraph::stable_graph::EdgeIndex;
use tracing::trace;

use super::{CutBounds, CutMethod, CutProposal, PlacementError, fragment_stats_with};
use crate::graph::{CircuitGraph, Node, WireEdge};

/// Data edges a search may cut: those between two ordinary operations.
///
/// Edges touching placeholders or read-out factors are never worth cutting.
fn candidate_edges(graph: &CircuitGraph) -> Vec<(EdgeIndex, WireEdge)> {
    let plain = |n: Node| {
        let op = &graph.op(n).op;
        !(op.is_placeholder() || op.is_observe())
    };
    graph
        .indexed_wire_edges()
        .filter(|(_, e)| plain(e.source) && plain(e.target))
        .collect()
}

/// How far a candidate cut set is from satisfying the bounds. Ordered so
/// that smaller is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    excess: usize,
    largest: usize,
}

fn score(graph: &CircuitGraph, bounds: &CutBounds, cuts: &HashSet<EdgeIndex>) -> Score {
    let stats = fragment_stats_with(graph, cuts);
    Score {
        excess: bounds.excess(&stats),
        largest: stats.iter().map(|s| s.wires + s.gates).max().unwrap_or(0),
    }
}

fn infeasible(bounds: &CutBounds, reason: impl Into<String>) -> PlacementError {
    PlacementError::InfeasibleCut {
        bounds: *bounds,
        reason: reason.into(),
    }
}

/// Greedy cut search.
///
/// Repeatedly cuts the candidate edge leading to the smallest total bound
/// excess, preferring the cut that leaves the smallest largest fragment and
/// then the earliest edge. Once the bounds hold, cuts that turned out to be
/// unnecessary are dropped again, earliest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GreedyCuts {
    /// Maximum number of cuts to place. Defaults to the number of candidate
    /// edges.
    pub max_cuts: Option<usize>,
}

impl GreedyCuts {
    /// A greedy search placing at most `max_cuts` cuts.
    pub fn with_max_cuts(max_cuts: usize) -> Self {
        Self {
            max_cuts: Some(max_cuts),
        }
    }
}

impl CutMethod for GreedyCuts {
    fn find_cuts(
        &self,
        graph: &CircuitGraph,
        bounds: &CutBounds,
    ) -> Result<CutProposal, PlacementError> {
        let candidates = candidate_edges(graph);
        let budget = self.max_cuts.unwrap_or(candidates.len());
        let mut chosen: Vec<usize> = Vec::new();
        let mut cut_set = HashSet::new();
        let mut current = score(graph, bounds, &cut_set);
        let mut evaluations = 1usize;

        while current.excess > 0 {
            if chosen.len() >= budget {
                return Err(infeasible(
                    bounds,
                    format!("greedy search spent its budget of {budget} cut(s)"),
                ));
            }
            let mut best: Option<(usize, Score)> = None;
            for (i, (index, _)) in candidates.iter().enumerate() {
                if cut_set.contains(index) {
                    continue;
                }
                cut_set.insert(*index);
                let s = score(graph, bounds, &cut_set);
                cut_set.remove(index);
                evaluations += 1;
                if best.is_none_or(|(_, b)| s < b) {
                    best = Some((i, s));
                }
            }
            let Some((i, s)) = best else {
                return Err(infeasible(bounds, "every candidate edge is already cut"));
            };
            trace!(edge = %candidates[i].1, excess = s.excess, "greedy cut");
            chosen.push(i);
            cut_set.insert(candidates[i].0);
            current = s;
        }

        // Drop cuts that are not needed.
        let mut kept = Vec::with_capacity(chosen.len());
        for i in chosen {
            cut_set.remove(&candidates[i].0);
            evaluations += 1;
            if score(graph, bounds, &cut_set).excess > 0 {
                cut_set.insert(candidates[i].0);
                kept.push(i);
            }
        }
        kept.sort_unstable();

        let cuts = kept.iter().map(|&i| candidates[i].1).collect_vec();
        Ok(CutProposal::new(cuts)
            .with_diagnostic("evaluations", evaluations as f64)
            .with_diagnostic("candidates", candidates.len() as f64))
    }
}

/// Exhaustive cut search.
///
/// Enumerates cut sets by increasing size, each size in lexicographic
/// candidate-edge order, and returns the first one satisfying the bounds. The
/// result uses as few cuts as possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExhaustiveCuts {
    /// Largest cut set considered.
    pub max_cuts: usize,
    /// Maximum number of cut sets evaluated before giving up.
    pub max_evaluations: usize,
}

impl Default for ExhaustiveCuts {
    fn default() -> Self {
        Self {
            max_cuts: 4,
            max_evaluations: 100_000,
        }
    }
}

impl CutMethod for ExhaustiveCuts {
    fn find_cuts(
        &self,
        graph: &CircuitGraph,
        bounds: &CutBounds,
    ) -> Result<CutProposal, PlacementError> {
        let candidates = candidate_edges(graph);
        let mut evaluations = 0usize;
        for size in 0..=self.max_cuts.min(candidates.len()) {
            for subset in candidates.iter().combinations(size) {
                if evaluations == self.max_evaluations {
                    return Err(infeasible(
                        bounds,
                        format!(
                            "exhaustive search gave up after {} evaluations",
                            self.max_evaluations
                        ),
                    ));
                }
                evaluations += 1;
                let cut_set = subset.iter().map(|(index, _)| *index).collect();
                if score(graph, bounds, &cut_set).excess == 0 {
                    let cuts = subset.into_iter().map(|(_, edge)| *edge).collect_vec();
                    return Ok(CutProposal::new(cuts)
                        .with_diagnostic("evaluations", evaluations as f64)
                        .with_diagnostic("candidates", candidates.len() as f64));
                }
            }
        }
        Err(infeasible(
            bounds,
            format!("no set of at most {} cut(s) suffices", self.max_cuts),
        ))
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::ops::{Gate, Pauli, Wire};
    use crate::program::{Program, ReadOut};

    /// A chain of `n` single-wire gates on one wire.
    fn chain(n: usize) -> CircuitGraph {
        let mut p = Program::new();
        for _ in 0..n {
            p.add_gate(Gate::H, [0]);
        }
        p.add_read_out(ReadOut::single(0, Pauli::Z));
        CircuitGraph::from_program(&p).unwrap()
    }

    /// A single gate on three wires cannot fit in two-wire fragments.
    fn triangle() -> CircuitGraph {
        let mut p = Program::new();
        p.add_gate(Gate::CX, [0, 1])
            .add_gate(Gate::CX, [1, 2])
            .add_gate(Gate::CX, [2, 0])
            .add_read_out(ReadOut::new((0..3).map(|w| (Wire::new(w), Pauli::Z))));
        CircuitGraph::from_program(&p).unwrap()
    }

    #[rstest]
    #[case::greedy(Box::new(GreedyCuts::default()) as Box<dyn CutMethod>, 3)]
    #[case::exhaustive(Box::new(ExhaustiveCuts::default()) as Box<dyn CutMethod>, 2)]
    fn gate_bound_on_chain(#[case] method: Box<dyn CutMethod>, #[case] num_cuts: usize) {
        let g = chain(6);
        let bounds = CutBounds::unbounded().with_max_gates(2);
        let proposal = method.find_cuts(&g, &bounds).unwrap();
        // Greedy first splits the chain in half, then has to cut both halves.
        assert_eq!(proposal.cuts.len(), num_cuts);
        let mut cut_set = HashSet::new();
        for c in &proposal.cuts {
            cut_set.insert(g.find_wire_edge(*c).unwrap());
        }
        assert!(bounds.is_satisfied_by(&fragment_stats_with(&g, &cut_set)));
        assert!(proposal.diagnostics["evaluations"] >= 1.0);
    }

    #[test]
    fn nothing_to_do() {
        let g = chain(3);
        let p = GreedyCuts::default()
            .find_cuts(&g, &CutBounds::unbounded())
            .unwrap();
        assert!(p.cuts.is_empty());
        let p = ExhaustiveCuts::default()
            .find_cuts(&g, &CutBounds::unbounded().with_max_wires(1))
            .unwrap();
        assert!(p.cuts.is_empty());
    }

    #[test]
    fn greedy_balanced_split() {
        let g = chain(4);
        let p = GreedyCuts::default()
            .find_cuts(&g, &CutBounds::unbounded().with_max_gates(2))
            .unwrap();
        assert_eq!(p.cuts.len(), 1);
    }

    #[rstest]
    #[case::greedy(Box::new(GreedyCuts::default()) as Box<dyn CutMethod>)]
    #[case::exhaustive(Box::new(ExhaustiveCuts::default()) as Box<dyn CutMethod>)]
    #[case::tiny_budget(Box::new(ExhaustiveCuts { max_cuts: 10, max_evaluations: 3 }) as Box<dyn CutMethod>)]
    fn infeasible_bounds(#[case] method: Box<dyn CutMethod>) {
        let g = triangle();
        // Every fragment has at least the two wires of a CX; one wire per
        // fragment is impossible.
        let bounds = CutBounds::unbounded().with_max_wires(1);
        assert_matches!(
            method.find_cuts(&g, &bounds),
            Err(PlacementError::InfeasibleCut { .. })
        );
    }

    #[test]
    fn fragment_count_bound_is_respected() {
        let g = chain(6);
        let bounds = CutBounds::unbounded().with_max_gates(2).with_max_fragments(2);
        assert_matches!(
            ExhaustiveCuts::default().find_cuts(&g, &bounds),
            Err(PlacementError::InfeasibleCut { .. })
        );
    }

    proptest! {
        #[test]
        fn chain_cuts_are_minimal(n in 1usize..10, max_gates in 1usize..5) {
            let needed = n.div_ceil(max_gates) - 1;
            prop_assume!(needed <= ExhaustiveCuts::default().max_cuts);
            let g = chain(n);
            let bounds = CutBounds::unbounded().with_max_gates(max_gates);
            let exhaustive = ExhaustiveCuts::default().find_cuts(&g, &bounds).unwrap();
            prop_assert_eq!(exhaustive.cuts.len(), needed);

            let greedy = GreedyCuts::default().find_cuts(&g, &bounds).unwrap();
            prop_assert!(greedy.cuts.len() >= needed);
            let cut_set = greedy
                .cuts
                .iter()
                .map(|c| g.find_wire_edge(*c).unwrap())
                .collect::<HashSet<_>>();
            prop_assert!(bounds.is_satisfied_by(&fragment_stats_with(&g, &cut_set)));
        }
    }
}
