//! Wire cutting for quantum circuits.
//!
//! A circuit too wide or too deep for the available hardware is split into
//! smaller fragments by cutting some of its wires. Each cut wire is measured
//! at the end of the upstream fragment and re-prepared at the start of the
//! downstream one. Running every fragment in every combination of
//! measurement basis and prepared state, then contracting the results,
//! gives exactly the read-outs of the uncut circuit.
//!
//! The stages of the pipeline:
//!
//! 1. [`CircuitGraph::from_program`] turns a [`Program`] into a directed
//!    multigraph of operations.
//! 2. [`replace_wire_cut_nodes`] turns every [`OpType::WireCut`] marker into a
//!    [`OpType::MeasureNode`]/[`OpType::PrepareNode`] pair.
//! 3. [`find_and_place_cuts`] optionally adds cuts, chosen by a [`CutMethod`],
//!    until the fragments satisfy some [`CutBounds`].
//! 4. [`fragment_graph`] splits the graph into [`Fragment`]s and builds the
//!    [`CommunicationGraph`] between them.
//! 5. [`graph_to_program`] linearises each fragment.
//! 6. [`Configurations`] lists the concrete programs of a fragment, one per
//!    basis configuration of its placeholders.
//! 7. [`Contraction::contract`] recombines the results of those programs.
//!
//! [`cut_circuit`] runs the whole pipeline.
//!
//! # Example
//!
//! ```
//! use qcut::{CutOptions, Gate, Pauli, Program, ReadOut, cut_circuit};
//!
//! let mut program = Program::new();
//! program
//!     .add_gate(Gate::H, [0])
//!     .add_wire_cut([0])
//!     .add_gate(Gate::H, [0])
//!     .add_read_out(ReadOut::single(0, Pauli::Z));
//!
//! let cut = cut_circuit(&program, &CutOptions::default()).unwrap();
//! // Two fragments with one placeholder each, in four configurations.
//! assert_eq!(cut.num_fragments(), 2);
//! assert_eq!(cut.programs.len(), 8);
//! ```

pub mod contract;
pub mod cut;
pub mod expand;
pub mod fragment;
pub mod graph;
pub mod ops;
pub mod placement;
pub mod program;
pub mod reconstruct;
pub mod resolve;

pub use contract::{ContractError, Contraction, PAIRING};
pub use cut::{CutCircuit, CutCircuitError, CutOptions, cut_circuit, cut_circuit_with_registry};
pub use expand::{
    ALPHABET_SIZE, Configurations, MeasureBasis, PrepareBasis, expand_fragment_program,
};
pub use fragment::{CommunicationGraph, Fragment, fragment_graph};
pub use graph::{BuildError, CircuitEdge, CircuitGraph, Node, WireEdge};
pub use ops::{CutId, Gate, OpType, Operation, Pauli, Wire};
pub use placement::{
    CutBounds, CutMethod, CutProposal, MethodRegistry, MethodSpec, PlacementError,
    find_and_place_cuts, place_wire_cuts,
};
pub use program::{Program, ReadOut};
pub use reconstruct::{CyclicFragmentError, graph_to_program};
pub use resolve::{ResolveError, replace_wire_cut_node, replace_wire_cut_nodes};
