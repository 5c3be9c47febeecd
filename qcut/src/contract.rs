//! Recombination of fragment results into the result of the uncut circuit.
//!
//! The result of a fragment is a tensor with one axis of size
//! [`ALPHABET_SIZE`] per placeholder, holding one value per read-out for
//! every configuration. A cut is undone by summing over the Pauli basis:
//!
//! ```text
//! ρ = ½ Σ_P Tr(P ρ) P
//! ```
//!
//! The measure side of a cut already yields `Tr(P ρ)` for `P ∈ {I, X, Y, Z}`.
//! The prepare side yields results for the states `|0>, |1>, |+>, |+i>`, which
//! [`PAIRING`] combines into `½ P`. Contracting the two axes of every cut then
//! gives the uncut value exactly.

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::expand::{
    ALPHABET_SIZE, ConfigurationOverflow, Placeholder, PlaceholderKind, configuration_count,
};
use crate::fragment::{CommunicationEdge, CommunicationGraph};
use crate::ops::CutId;

/// Weight of each prepared state in `½ P`, indexed by measurement basis
/// (`I, X, Y, Z`) then prepared state (`|0>, |1>, |+>, |+i>`).
pub const PAIRING: [[f64; ALPHABET_SIZE]; ALPHABET_SIZE] = [
    [0.5, 0.5, 0.0, 0.0],
    [-0.5, -0.5, 1.0, 0.0],
    [-0.5, -0.5, 0.0, 1.0],
    [0.5, -0.5, 0.0, 0.0],
];

/// Errors contracting fragment results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ContractError {
    /// The number of results does not match the number of programs.
    #[error("expected {expected} results but got {actual}")]
    ShapeMismatch {
        /// Total number of configurations over all fragments.
        expected: usize,
        /// Results supplied.
        actual: usize,
    },
    /// A result does not have one value per read-out.
    #[error("result {index} has {actual} values, expected one per read-out ({expected})")]
    ShapeMismatchReadOuts {
        /// Position of the result.
        index: usize,
        /// The number of read-outs.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },
    /// The shapes do not describe the fragments of the communication graph.
    #[error("{shapes} fragment shapes for a communication graph of {fragments} fragments")]
    ShapeMismatchFragments {
        /// Fragment shapes known.
        shapes: usize,
        /// Fragments in the communication graph.
        fragments: usize,
    },
    /// A fragment shape is not the configuration count of its placeholders.
    #[error("fragment {fragment} has shape {shape} but {placeholders} placeholders")]
    ShapeMismatchPlaceholders {
        /// The fragment.
        fragment: usize,
        /// Its recorded shape.
        shape: usize,
        /// Its number of placeholders.
        placeholders: usize,
    },
    /// Too many cuts are open at once while contracting.
    #[error("{open} cuts are open at once, too many to contract")]
    TooManyOpenCuts {
        /// The number of open cuts.
        open: usize,
    },
    /// A cut of the communication graph does not match the placeholders of
    /// the fragments it joins.
    #[error("{cut} does not join a measure and a prepare placeholder of its fragments")]
    InconsistentCut {
        /// The cut.
        cut: CutId,
    },
}

/// The post-processing step of a cut circuit.
///
/// Captures what is needed to recombine fragment results once they are
/// available: the number of configurations of each fragment, the order of
/// the placeholders in each fragment, the number of read-outs and the
/// communication graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contraction {
    shapes: Vec<usize>,
    layouts: Vec<Vec<Placeholder>>,
    num_read_outs: usize,
    communication_graph: CommunicationGraph,
}

impl Contraction {
    /// Create the contraction of fragments with the given placeholder
    /// layouts.
    pub fn new(
        layouts: Vec<Vec<Placeholder>>,
        communication_graph: CommunicationGraph,
        num_read_outs: usize,
    ) -> Result<Self, ConfigurationOverflow> {
        let shapes = layouts
            .iter()
            .map(|l| configuration_count(l.len()))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            shapes,
            layouts,
            num_read_outs,
            communication_graph,
        })
    }

    /// The number of configurations of each fragment.
    pub fn shapes(&self) -> &[usize] {
        &self.shapes
    }

    /// The placeholders of each fragment, in configuration digit order.
    pub fn layouts(&self) -> &[Vec<Placeholder>] {
        &self.layouts
    }

    /// The number of values in each result.
    pub fn num_read_outs(&self) -> usize {
        self.num_read_outs
    }

    /// The communication graph of the fragments.
    pub fn communication_graph(&self) -> &CommunicationGraph {
        &self.communication_graph
    }

    /// The number of results [`Contraction::contract`] expects.
    pub fn num_results(&self) -> usize {
        self.shapes.iter().sum()
    }

    /// Recombine fragment results.
    ///
    /// `results` holds one entry per program, in the order the programs were
    /// emitted: all configurations of the first fragment, then the second,
    /// and so on. Each entry has one value per read-out. Returns one value
    /// per read-out of the uncut circuit.
    #[instrument(skip_all, fields(fragments = self.shapes.len()))]
    pub fn contract(&self, results: &[Vec<f64>]) -> Result<Vec<f64>, ContractError> {
        let axes = self.check(results)?;

        let mut offset = 0;
        let tensors = self
            .shapes
            .iter()
            .map(|&shape| {
                let t = &results[offset..offset + shape];
                offset += shape;
                t
            })
            .collect_vec();

        // A cut closes once both of its fragments are merged, with `next`
        // counted as merged.
        let edges = self.communication_graph.edges();
        let mut merged = vec![false; tensors.len()];
        let closed = |merged: &[bool], next: usize, e: usize| {
            let CommunicationEdge { source, target, .. } = edges[e];
            (merged[source] || source == next) && (merged[target] || target == next)
        };

        // Components are contracted separately and multiplied. Within one, the
        // next fragment is the one leaving the fewest cuts open.
        let components = self.components();
        let mut values = vec![1.0; self.num_read_outs];
        for component in &components {
            let mut partial = Partial::scalar(self.num_read_outs);
            let mut remaining = component.clone();
            loop {
                let Some(pos) = remaining.iter().position_min_by_key(|&&f| {
                    partial.open_after(&axes[f], |e| closed(&merged, f, e))
                }) else {
                    break;
                };
                let fragment = remaining.remove(pos);
                let tensor = pair_prepare_axes(tensors[fragment], &self.layouts[fragment]);
                partial = partial.merge(&tensor, &axes[fragment], edges.len(), |e| {
                    closed(&merged, fragment, e)
                })?;
                merged[fragment] = true;
            }
            for (v, p) in values.iter_mut().zip(partial.into_values()) {
                *v *= p;
            }
        }
        debug!(
            cuts = edges.len(),
            components = components.len(),
            "contracted fragment results"
        );
        Ok(values)
    }

    /// The fragments of each connected component of the communication graph,
    /// in increasing order of their lowest fragment.
    fn components(&self) -> Vec<Vec<usize>> {
        let comm = &self.communication_graph;
        let mut union = UnionFind::new(comm.num_fragments());
        for e in comm.edges() {
            union.union(e.source, e.target);
        }
        let mut components: IndexMap<usize, Vec<usize>> = IndexMap::new();
        for fragment in 0..comm.num_fragments() {
            components
                .entry(union.find(fragment))
                .or_default()
                .push(fragment);
        }
        components.into_values().collect()
    }

    /// Check `results` against the recorded shapes, and find the cut behind
    /// every placeholder axis.
    fn check(&self, results: &[Vec<f64>]) -> Result<Vec<Vec<usize>>, ContractError> {
        let comm = &self.communication_graph;
        if self.shapes.len() != comm.num_fragments() || self.layouts.len() != comm.num_fragments()
        {
            return Err(ContractError::ShapeMismatchFragments {
                shapes: self.shapes.len(),
                fragments: comm.num_fragments(),
            });
        }
        for (fragment, (&shape, layout)) in self.shapes.iter().zip(&self.layouts).enumerate() {
            if configuration_count(layout.len()) != Ok(shape) {
                return Err(ContractError::ShapeMismatchPlaceholders {
                    fragment,
                    shape,
                    placeholders: layout.len(),
                });
            }
        }
        if results.len() != self.num_results() {
            return Err(ContractError::ShapeMismatch {
                expected: self.num_results(),
                actual: results.len(),
            });
        }
        if let Some((index, r)) = results
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != self.num_read_outs)
        {
            return Err(ContractError::ShapeMismatchReadOuts {
                index,
                expected: self.num_read_outs,
                actual: r.len(),
            });
        }

        let edge_of: HashMap<CutId, usize> = comm
            .edges()
            .iter()
            .enumerate()
            .map(|(i, e)| (e.pair.cut, i))
            .collect();
        let mut seen = vec![(false, false); comm.num_edges()];
        let axes = self
            .layouts
            .iter()
            .enumerate()
            .map(|(fragment, layout)| {
                layout
                    .iter()
                    .map(|p| {
                        let inconsistent = ContractError::InconsistentCut { cut: p.cut };
                        let &e = edge_of.get(&p.cut).ok_or(inconsistent.clone())?;
                        let edge = &comm.edges()[e];
                        let side = match p.kind {
                            PlaceholderKind::Measure if edge.source == fragment => &mut seen[e].0,
                            PlaceholderKind::Prepare if edge.target == fragment => &mut seen[e].1,
                            _ => return Err(inconsistent),
                        };
                        if std::mem::replace(side, true) {
                            return Err(inconsistent);
                        }
                        Ok(e)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(e) = seen.iter().position(|&(m, p)| !(m && p)) {
            return Err(ContractError::InconsistentCut {
                cut: comm.edges()[e].pair.cut,
            });
        }
        Ok(axes)
    }
}

/// Replace the prepared-state index of every prepare axis by a Pauli index,
/// weighting the states with [`PAIRING`].
fn pair_prepare_axes(tensor: &[Vec<f64>], layout: &[Placeholder]) -> Vec<Vec<f64>> {
    let mut tensor = tensor.to_vec();
    for (axis, p) in layout.iter().enumerate() {
        if p.kind != PlaceholderKind::Prepare {
            continue;
        }
        let stride = ALPHABET_SIZE.pow((layout.len() - 1 - axis) as u32);
        let paired = (0..tensor.len())
            .map(|index| {
                let pauli = (index / stride) % ALPHABET_SIZE;
                let base = index - pauli * stride;
                let mut value = vec![0.0; tensor[index].len()];
                for (state, &w) in PAIRING[pauli].iter().enumerate() {
                    if w == 0.0 {
                        continue;
                    }
                    for (v, x) in value.iter_mut().zip(&tensor[base + state * stride]) {
                        *v += w * x;
                    }
                }
                value
            })
            .collect();
        tensor = paired;
    }
    tensor
}

/// The product of the fragments contracted so far, as a tensor over the cuts
/// still open.
struct Partial {
    /// Open cuts, most significant first.
    axes: Vec<usize>,
    /// One value per read-out for every assignment of the open cuts.
    values: Vec<Vec<f64>>,
}

impl Partial {
    fn scalar(num_read_outs: usize) -> Self {
        Self {
            axes: Vec::new(),
            values: vec![vec![1.0; num_read_outs]],
        }
    }

    /// The number of cuts left open by merging a tensor over `tensor_axes`.
    fn open_after(&self, tensor_axes: &[usize], closed: impl Fn(usize) -> bool) -> usize {
        self.axes
            .iter()
            .chain(tensor_axes)
            .unique()
            .filter(|&&e| !closed(e))
            .count()
    }

    /// Multiply in a fragment tensor whose axes are the cuts `tensor_axes`,
    /// summing over every cut for which `closed` holds.
    fn merge(
        self,
        tensor: &[Vec<f64>],
        tensor_axes: &[usize],
        num_cuts: usize,
        closed: impl Fn(usize) -> bool,
    ) -> Result<Self, ContractError> {
        let all = self.axes.iter().chain(tensor_axes).copied().unique().collect_vec();
        let open = all.iter().copied().filter(|&e| !closed(e)).collect_vec();
        let num_read_outs = self.values.first().map_or(0, Vec::len);
        let too_many = |_: ConfigurationOverflow| ContractError::TooManyOpenCuts {
            open: all.len(),
        };
        let assignments = configuration_count(all.len()).map_err(too_many)?;
        let open_assignments = configuration_count(open.len()).map_err(too_many)?;

        let mut values = vec![vec![0.0; num_read_outs]; open_assignments];
        let mut digit = vec![0; num_cuts];
        for assignment in 0..assignments {
            let mut rest = assignment;
            for &e in all.iter().rev() {
                digit[e] = rest % ALPHABET_SIZE;
                rest /= ALPHABET_SIZE;
            }
            let lhs = &self.values[flat_index(&self.axes, &digit)];
            let rhs = &tensor[flat_index(tensor_axes, &digit)];
            let out = &mut values[flat_index(&open, &digit)];
            for ((o, a), b) in out.iter_mut().zip(lhs).zip(rhs) {
                *o += a * b;
            }
        }
        Ok(Self { axes: open, values })
    }

    fn into_values(mut self) -> Vec<f64> {
        debug_assert!(self.axes.is_empty());
        self.values.swap_remove(0)
    }
}

/// Position in a tensor over `axes` of the entry picked by `digit`.
fn flat_index(axes: &[usize], digit: &[usize]) -> usize {
    axes.iter().fold(0, |acc, &e| acc * ALPHABET_SIZE + digit[e])
}
