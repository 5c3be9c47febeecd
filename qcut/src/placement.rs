//! Automatic placement of wire cuts.
//!
//! A [`CutMethod`] inspects a [`CircuitGraph`] and proposes a set of data
//! edges to cut so that every fragment respects some [`CutBounds`]. Methods are
//! looked up by name in a [`MethodRegistry`], or passed directly through a
//! [`MethodSpec::Custom`]. The proposal is applied with [`place_wire_cuts`],
//! which routes every cut through the usual marker resolution.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::stable_graph::EdgeIndex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::graph::{CircuitGraph, WireEdge};
use crate::ops::Operation;
use crate::resolve::{PlacedCut, ResolveError, replace_wire_cut_node};

mod search;
pub use search::{ExhaustiveCuts, GreedyCuts};

/// Limits every fragment of a cut circuit must respect. Unset limits are not
/// enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutBounds {
    /// Maximum number of wires in a fragment.
    pub max_wires: Option<usize>,
    /// Maximum number of gates in a fragment.
    pub max_gates: Option<usize>,
    /// Maximum number of fragments.
    pub max_fragments: Option<usize>,
}

impl CutBounds {
    /// Bounds that are always satisfied.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set the maximum number of wires per fragment.
    pub fn with_max_wires(mut self, max_wires: usize) -> Self {
        self.max_wires = Some(max_wires);
        self
    }

    /// Set the maximum number of gates per fragment.
    pub fn with_max_gates(mut self, max_gates: usize) -> Self {
        self.max_gates = Some(max_gates);
        self
    }

    /// Set the maximum number of fragments.
    pub fn with_max_fragments(mut self, max_fragments: usize) -> Self {
        self.max_fragments = Some(max_fragments);
        self
    }

    /// By how much a fragmentation exceeds the bounds, summed over fragments.
    /// Zero iff the bounds hold.
    pub fn excess(&self, fragments: &[FragmentStats]) -> usize {
        let over =
            |value: usize, limit: Option<usize>| limit.map_or(0, |l| value.saturating_sub(l));
        fragments
            .iter()
            .map(|f| over(f.wires, self.max_wires) + over(f.gates, self.max_gates))
            .sum::<usize>()
            + over(fragments.len(), self.max_fragments)
    }

    /// Whether a fragmentation satisfies the bounds.
    pub fn is_satisfied_by(&self, fragments: &[FragmentStats]) -> bool {
        self.excess(fragments) == 0
    }
}

impl fmt::Display for CutBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<usize>| v.map_or("-".to_string(), |v| v.to_string());
        write!(
            f,
            "max_wires={}, max_gates={}, max_fragments={}",
            show(self.max_wires),
            show(self.max_gates),
            show(self.max_fragments)
        )
    }
}

/// Size of one fragment, as seen by [`CutBounds`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentStats {
    /// Number of wire segments, i.e. the number of wires the fragment's
    /// program uses.
    pub wires: usize,
    /// Number of gates.
    pub gates: usize,
}

/// Sizes of the fragments the graph splits into along its existing cuts.
pub fn fragment_stats(graph: &CircuitGraph) -> Vec<FragmentStats> {
    fragment_stats_with(graph, &HashSet::new())
}

/// Sizes of the fragments the graph would split into if the data edges in
/// `extra_cuts` were cut as well.
///
/// A node starts a new wire segment on every wire it has no (uncut) data
/// input on; the segments of a fragment are exactly the wires its program
/// needs.
pub(crate) fn fragment_stats_with(
    graph: &CircuitGraph,
    extra_cuts: &HashSet<EdgeIndex>,
) -> Vec<FragmentStats> {
    use petgraph::visit::EdgeRef;

    graph
        .partition(|e| e.weight().is_cut() || extra_cuts.contains(&e.id()))
        .into_iter()
        .map(|nodes| {
            let mut stats = FragmentStats::default();
            for n in nodes {
                let op = graph.op(n);
                if op.op.is_gate() {
                    stats.gates += 1;
                }
                let fed = graph
                    .wire_inputs(n)
                    .filter(|(e, _)| !extra_cuts.contains(e))
                    .map(|(_, w)| w)
                    .collect::<HashSet<_>>();
                stats.wires += op.wires.iter().filter(|w| !fed.contains(w)).count();
            }
            stats
        })
        .collect()
}

/// The result of a [`CutMethod`] search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CutProposal {
    /// The data edges to cut.
    pub cuts: Vec<WireEdge>,
    /// Informational figures about the search, e.g. how many candidate cut
    /// sets were evaluated.
    pub diagnostics: BTreeMap<String, f64>,
}

impl CutProposal {
    /// A proposal without diagnostics.
    pub fn new(cuts: impl IntoIterator<Item = WireEdge>) -> Self {
        Self {
            cuts: cuts.into_iter().collect(),
            diagnostics: BTreeMap::new(),
        }
    }

    /// Attach a diagnostic figure.
    pub fn with_diagnostic(mut self, key: impl Into<String>, value: f64) -> Self {
        self.diagnostics.insert(key.into(), value);
        self
    }
}

/// A strategy for choosing where to cut.
pub trait CutMethod {
    /// Propose data edges to cut so that the resulting fragments satisfy
    /// `bounds`.
    ///
    /// Existing cuts in `graph` must be taken into account. Methods should
    /// return [`PlacementError::InfeasibleCut`] when their search fails.
    fn find_cuts(
        &self,
        graph: &CircuitGraph,
        bounds: &CutBounds,
    ) -> Result<CutProposal, PlacementError>;
}

impl<F> CutMethod for F
where
    F: Fn(&CircuitGraph, &CutBounds) -> Result<CutProposal, PlacementError>,
{
    fn find_cuts(
        &self,
        graph: &CircuitGraph,
        bounds: &CutBounds,
    ) -> Result<CutProposal, PlacementError> {
        self(graph, bounds)
    }
}

/// A shareable cut method.
pub type SharedCutMethod = Arc<dyn CutMethod + Send + Sync>;

/// Which [`CutMethod`] to use.
#[derive(Clone)]
pub enum MethodSpec {
    /// A method registered under this name.
    Named(SmolStr),
    /// A method supplied directly.
    Custom(SharedCutMethod),
}

impl MethodSpec {
    /// Refer to a registered method by name.
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self::Named(name.into())
    }

    /// Wrap a user supplied method.
    pub fn custom(method: impl CutMethod + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(method))
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for MethodSpec {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl Serialize for MethodSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Named(name) => name.serialize(serializer),
            Self::Custom(_) => Err(serde::ser::Error::custom(
                "a custom cut method cannot be serialised",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for MethodSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SmolStr::deserialize(deserializer).map(Self::Named)
    }
}

/// Named cut methods.
#[derive(Clone)]
pub struct MethodRegistry {
    methods: IndexMap<SmolStr, SharedCutMethod>,
}

impl MethodRegistry {
    /// A registry with no methods.
    pub fn empty() -> Self {
        Self {
            methods: IndexMap::new(),
        }
    }

    /// Register a method, returning the one previously registered under the
    /// same name.
    pub fn register(
        &mut self,
        name: impl Into<SmolStr>,
        method: impl CutMethod + Send + Sync + 'static,
    ) -> Option<SharedCutMethod> {
        self.methods.insert(name.into(), Arc::new(method))
    }

    /// Look up a method.
    pub fn get(&self, name: &str) -> Option<&SharedCutMethod> {
        self.methods.get(name)
    }

    /// The registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> + '_ {
        self.methods.keys()
    }

    /// Resolve a [`MethodSpec`] to a method.
    pub fn resolve(&self, spec: &MethodSpec) -> Result<SharedCutMethod, PlacementError> {
        match spec {
            MethodSpec::Custom(method) => Ok(method.clone()),
            MethodSpec::Named(name) => {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| PlacementError::UnknownMethod {
                        name: name.clone(),
                        available: self.names().cloned().collect(),
                    })
            }
        }
    }
}

impl Default for MethodRegistry {
    /// The built-in methods: `"greedy"` ([`GreedyCuts`]) and `"exhaustive"`
    /// ([`ExhaustiveCuts`]).
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register("greedy", GreedyCuts::default());
        reg.register("exhaustive", ExhaustiveCuts::default());
        reg
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}

/// Errors placing cuts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PlacementError {
    /// No cut placement satisfying the bounds was found.
    #[error("no cut placement satisfies the bounds ({bounds}): {reason}")]
    InfeasibleCut {
        /// The bounds that could not be met.
        bounds: CutBounds,
        /// Why the search gave up.
        reason: String,
    },
    /// The requested method is not registered.
    #[error("unknown cut method '{name}'; available methods: {}", .available.iter().join(", "))]
    UnknownMethod {
        /// The requested name.
        name: SmolStr,
        /// The names that are registered.
        available: Vec<SmolStr>,
    },
    /// A proposed cut does not correspond to a data edge of the graph.
    #[error("cannot cut {0}: no such data edge")]
    MissingEdge(WireEdge),
    /// The same data edge was proposed more than once.
    #[error("cannot cut {0} twice")]
    DuplicateCut(WireEdge),
    /// Resolving the inserted marker failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Cut the given data edges.
///
/// A [`OpType::WireCut`](crate::ops::OpType::WireCut) marker is spliced into each
/// edge and immediately replaced by a measure/prepare pair. All edges are
/// checked before the graph is modified.
pub fn place_wire_cuts(
    graph: &mut CircuitGraph,
    cuts: &[WireEdge],
) -> Result<Vec<PlacedCut>, PlacementError> {
    if let Some(missing) = cuts.iter().find(|e| graph.find_wire_edge(**e).is_none()) {
        return Err(PlacementError::MissingEdge(*missing));
    }
    if let Some(dup) = cuts.iter().duplicates().next() {
        return Err(PlacementError::DuplicateCut(*dup));
    }
    let mut placed = Vec::with_capacity(cuts.len());
    for &edge in cuts {
        let index = graph
            .find_wire_edge(edge)
            .ok_or(PlacementError::MissingEdge(edge))?;
        graph.remove_edge(index);
        let marker = graph.add_op(Operation::wire_cut([edge.wire]));
        graph.connect(edge.source, marker, edge.wire);
        graph.connect(marker, edge.target, edge.wire);
        placed.extend(replace_wire_cut_node(graph, marker)?);
    }
    Ok(placed)
}

/// The outcome of [`find_and_place_cuts`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementReport {
    /// The cuts placed.
    pub placed: Vec<PlacedCut>,
    /// Diagnostics reported by the method.
    pub diagnostics: BTreeMap<String, f64>,
}

/// Find cuts with the given method and place them in the graph.
///
/// The resulting fragmentation is checked against `bounds` before returning,
/// so a method proposing a violating cut set yields
/// [`PlacementError::InfeasibleCut`] rather than a silently oversized
/// fragment.
#[instrument(skip_all, fields(bounds = %bounds))]
pub fn find_and_place_cuts(
    graph: &mut CircuitGraph,
    method: &MethodSpec,
    bounds: &CutBounds,
    registry: &MethodRegistry,
) -> Result<PlacementReport, PlacementError> {
    let method = registry.resolve(method)?;
    let CutProposal { cuts, diagnostics } = method.find_cuts(graph, bounds)?;
    debug!(cuts = cuts.len(), ?diagnostics, "cut method proposed cuts");

    let placed = place_wire_cuts(graph, &cuts)?;
    let stats = fragment_stats(graph);
    if !bounds.is_satisfied_by(&stats) {
        return Err(PlacementError::InfeasibleCut {
            bounds: *bounds,
            reason: format!(
                "the proposed {} cut(s) leave fragments of sizes {:?}",
                cuts.len(),
                stats.iter().map(|s| (s.wires, s.gates)).collect_vec()
            ),
        });
    }
    Ok(PlacementReport {
        placed,
        diagnostics,
    })
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::ops::{Gate, Pauli, Wire};
    use crate::program::{Program, ReadOut};
    use crate::resolve::replace_wire_cut_nodes;

    /// A four-wire ladder of CX gates.
    ///
    /// ```text
    /// w0: H ─ CX ────────────
    /// w1: ─── CX ─ CX ───────
    /// w2: ──────── CX ─ CX ──
    /// w3: ───────────── CX ──
    /// ```
    #[fixture]
    fn ladder() -> CircuitGraph {
        let mut p = Program::new();
        p.add_gate(Gate::H, [0])
            .add_gate(Gate::CX, [0, 1])
            .add_gate(Gate::CX, [1, 2])
            .add_gate(Gate::CX, [2, 3])
            .add_read_out(ReadOut::new((0..4).map(|w| (Wire::new(w), Pauli::Z))));
        CircuitGraph::from_program(&p).unwrap()
    }

    #[rstest]
    fn stats_of_uncut(ladder: CircuitGraph) {
        assert_eq!(
            fragment_stats(&ladder),
            vec![FragmentStats { wires: 4, gates: 4 }]
        );
    }

    #[test]
    fn stats_count_prepared_wires() {
        let mut p = Program::new();
        p.add_gate(Gate::H, [0])
            .add_wire_cut([0])
            .add_gate(Gate::X, [0])
            .add_wire_cut([0])
            .add_gate(Gate::Y, [0]);
        let mut g = CircuitGraph::from_program(&p).unwrap();
        replace_wire_cut_nodes(&mut g).unwrap();
        // [H, M], [P, X, M], [P, Y]
        assert_eq!(
            fragment_stats(&g),
            vec![
                FragmentStats { wires: 1, gates: 1 },
                FragmentStats { wires: 1, gates: 1 },
                FragmentStats { wires: 1, gates: 1 },
            ]
        );
    }

    #[test]
    fn bounds_excess() {
        let frags = [
            FragmentStats { wires: 3, gates: 5 },
            FragmentStats { wires: 1, gates: 1 },
        ];
        let b = CutBounds::unbounded().with_max_wires(2).with_max_gates(4);
        assert_eq!(b.excess(&frags), 2);
        assert_eq!(b.with_max_fragments(1).excess(&frags), 3);
        assert!(CutBounds::unbounded().is_satisfied_by(&frags));
    }

    #[rstest]
    fn place_manual_cuts(mut ladder: CircuitGraph) {
        let edge = ladder
            .wire_edges()
            .find(|e| e.wire == Wire::new(2) && ladder.op(e.target).wires.len() == 2)
            .unwrap();
        let before = ladder.num_nodes();
        let placed = place_wire_cuts(&mut ladder, &[edge]).unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(ladder.num_nodes(), before + 2);
        assert_eq!(ladder.cut_edges().count(), 1);
        assert_eq!(ladder.wire_edges().filter(|e| *e == edge).count(), 0);
        assert_eq!(fragment_stats(&ladder).len(), 2);
    }

    #[rstest]
    fn place_missing_edge(mut ladder: CircuitGraph) {
        let mut edge = ladder.wire_edges().next().unwrap();
        edge.wire = Wire::new(7);
        assert_matches!(
            place_wire_cuts(&mut ladder, &[edge]),
            Err(PlacementError::MissingEdge(_))
        );
    }

    #[rstest]
    fn place_duplicate_edge(mut ladder: CircuitGraph) {
        let edge = ladder.wire_edges().next().unwrap();
        let before = ladder.num_nodes();
        assert_matches!(
            place_wire_cuts(&mut ladder, &[edge, edge]),
            Err(PlacementError::DuplicateCut(e)) => assert_eq!(e, edge)
        );
        assert_eq!(ladder.num_nodes(), before);
        assert_eq!(ladder.cut_edges().count(), 0);
    }

    #[rstest]
    fn unknown_method(mut ladder: CircuitGraph) {
        let err = find_and_place_cuts(
            &mut ladder,
            &MethodSpec::named("kahypar"),
            &CutBounds::default(),
            &MethodRegistry::default(),
        )
        .unwrap_err();
        assert_matches!(&err, PlacementError::UnknownMethod { name, .. } => {
            assert_eq!(name, "kahypar");
        });
        assert!(err.to_string().contains("greedy, exhaustive"));
    }

    #[rstest]
    fn custom_method_is_checked(mut ladder: CircuitGraph) {
        // Proposes nothing, regardless of the bounds.
        let lazy = MethodSpec::custom(|_: &CircuitGraph, _: &CutBounds| {
            Ok::<_, PlacementError>(CutProposal::default())
        });
        let bounds = CutBounds::unbounded().with_max_wires(2);
        assert_matches!(
            find_and_place_cuts(&mut ladder, &lazy, &bounds, &MethodRegistry::empty()),
            Err(PlacementError::InfeasibleCut { .. })
        );
    }

    #[rstest]
    #[case::greedy("greedy")]
    #[case::exhaustive("exhaustive")]
    fn registered_methods_meet_bounds(mut ladder: CircuitGraph, #[case] name: &str) {
        let bounds = CutBounds::unbounded().with_max_wires(2);
        let report = find_and_place_cuts(
            &mut ladder,
            &name.into(),
            &bounds,
            &MethodRegistry::default(),
        )
        .unwrap();
        assert!(!report.placed.is_empty());
        assert!(bounds.is_satisfied_by(&fragment_stats(&ladder)));
        assert_eq!(ladder.cut_edges().count(), report.placed.len());
    }

    #[test]
    fn method_spec_serde() {
        let spec: MethodSpec = serde_json::from_str("\"greedy\"").unwrap();
        assert_matches!(&spec, MethodSpec::Named(n) => assert_eq!(n, "greedy"));
        assert_eq!(serde_json::to_string(&spec).unwrap(), "\"greedy\"");
        let custom = MethodSpec::custom(|_: &CircuitGraph, _: &CutBounds| {
            Ok::<_, PlacementError>(CutProposal::default())
        });
        assert!(serde_json::to_string(&custom).is_err());
    }
}
