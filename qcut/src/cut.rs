//! The full cutting pipeline, from a program to fragment programs and the
//! contraction recombining their results.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::contract::{ContractError, Contraction};
use crate::expand::{ConfigurationOverflow, Configurations, placeholder_layout};
use crate::fragment::fragment_graph;
use crate::graph::{BuildError, CircuitGraph};
use crate::placement::{
    CutBounds, MethodRegistry, MethodSpec, PlacementError, find_and_place_cuts, fragment_stats,
};
use crate::program::Program;
use crate::reconstruct::{CyclicFragmentError, graph_to_program};
use crate::resolve::{ResolveError, replace_wire_cut_nodes};

/// Options for [`cut_circuit`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CutOptions {
    /// Method searching for cuts beyond the [`OpType::WireCut`] markers of
    /// the program. Without one only the markers are cut.
    ///
    /// [`OpType::WireCut`]: crate::ops::OpType::WireCut
    pub method: Option<MethodSpec>,
    /// Bounds every fragment must satisfy.
    pub bounds: CutBounds,
    /// Maximum total number of fragment programs.
    pub max_configurations: Option<usize>,
}

impl CutOptions {
    /// Search for cuts with `method`.
    pub fn with_method(mut self, method: impl Into<MethodSpec>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Require the fragments to satisfy `bounds`.
    pub fn with_bounds(mut self, bounds: CutBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Fail when more than `max` fragment programs would be generated.
    pub fn with_max_configurations(mut self, max: usize) -> Self {
        self.max_configurations = Some(max);
        self
    }
}

/// A cut circuit: the programs to execute, and how to recombine their
/// results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CutCircuit {
    /// Every configuration of every fragment, fragment by fragment.
    pub programs: Vec<Program>,
    /// Recombines the results of [`CutCircuit::programs`].
    pub contraction: Contraction,
}

impl CutCircuit {
    /// The number of fragments.
    pub fn num_fragments(&self) -> usize {
        self.contraction.shapes().len()
    }

    /// The programs of one fragment.
    pub fn fragment_programs(&self, fragment: usize) -> Option<&[Program]> {
        let shapes = self.contraction.shapes();
        let len = *shapes.get(fragment)?;
        let start = shapes[..fragment].iter().sum::<usize>();
        self.programs.get(start..start + len)
    }

    /// Recombine the results of [`CutCircuit::programs`], given in the same
    /// order.
    pub fn contract(&self, results: &[Vec<f64>]) -> Result<Vec<f64>, ContractError> {
        self.contraction.contract(results)
    }
}

/// Errors cutting a circuit.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CutCircuitError {
    /// The program is malformed.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// A wire cut marker could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Cut placement failed.
    #[error(transparent)]
    Placement(#[from] PlacementError),
    /// A fragment could not be linearised.
    #[error(transparent)]
    CyclicFragment(#[from] CyclicFragmentError),
    /// Too many fragment programs to count.
    #[error(transparent)]
    ConfigurationOverflow(#[from] ConfigurationOverflow),
    /// More fragment programs would be generated than allowed.
    #[error("cutting needs {required} fragment programs, more than the budget of {budget}")]
    ConfigurationBudgetExceeded {
        /// Programs the cut circuit would have.
        required: usize,
        /// The configured maximum.
        budget: usize,
    },
}

/// Cut a program into fragment programs, using the default
/// [`MethodRegistry`].
pub fn cut_circuit(program: &Program, options: &CutOptions) -> Result<CutCircuit, CutCircuitError> {
    cut_circuit_with_registry(program, options, &MethodRegistry::default())
}

/// Cut a program into fragment programs, resolving named methods in
/// `registry`.
///
/// The program's wire cut markers are cut first. If a method is given, it
/// then places further cuts to meet the bounds; otherwise the bounds are
/// only checked. The configuration budget is checked before any fragment
/// program is generated.
#[instrument(skip_all, fields(operations = program.operations().len()))]
pub fn cut_circuit_with_registry(
    program: &Program,
    options: &CutOptions,
    registry: &MethodRegistry,
) -> Result<CutCircuit, CutCircuitError> {
    let mut graph = CircuitGraph::from_program(program)?;
    let markers = replace_wire_cut_nodes(&mut graph)?;

    match &options.method {
        Some(method) => {
            let report = find_and_place_cuts(&mut graph, method, &options.bounds, registry)?;
            debug!(
                markers = markers.len(),
                placed = report.placed.len(),
                "placed cuts"
            );
        }
        None => {
            let stats = fragment_stats(&graph);
            if !options.bounds.is_satisfied_by(&stats) {
                return Err(PlacementError::InfeasibleCut {
                    bounds: options.bounds,
                    reason: format!(
                        "no cut method given and the {} marked cut(s) leave fragments of sizes {:?}",
                        markers.len(),
                        stats.iter().map(|s| (s.wires, s.gates)).collect_vec()
                    ),
                }
                .into());
            }
        }
    }

    let (fragments, communication_graph) = fragment_graph(&graph);
    let fragment_programs = fragments
        .iter()
        .map(|f| graph_to_program(f.graph()))
        .collect::<Result<Vec<_>, _>>()?;

    let layouts = fragment_programs.iter().map(placeholder_layout).collect_vec();
    let contraction = Contraction::new(layouts, communication_graph, graph.num_read_outs())?;
    let required = contraction
        .shapes()
        .iter()
        .try_fold(0usize, |acc, &s| acc.checked_add(s))
        .ok_or(ConfigurationOverflow {
            placeholders: contraction.layouts().iter().map(Vec::len).sum(),
        })?;
    debug!(
        fragments = fragment_programs.len(),
        shapes = ?contraction.shapes(),
        required,
        "counted configurations"
    );
    if let Some(budget) = options.max_configurations {
        if required > budget {
            return Err(CutCircuitError::ConfigurationBudgetExceeded { required, budget });
        }
    }

    let mut programs = Vec::new();
    for p in &fragment_programs {
        programs.extend(Configurations::new(p)?.iter());
    }
    Ok(CutCircuit {
        programs,
        contraction,
    })
}
