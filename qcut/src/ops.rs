//! The operations that can be placed on the wires of a circuit.
//!
//! Besides the ordinary [`Gate`]s, a circuit under cutting carries a few
//! special operations: the [`OpType::WireCut`] marker requesting a cut, the
//! [`OpType::MeasureNode`] / [`OpType::PrepareNode`] placeholder pair that
//! replaces it, and [`OpType::Observe`] read-out factors that only live inside
//! a [`CircuitGraph`](crate::CircuitGraph).

use std::fmt;

use derive_more::{Display, From};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::EnumIter;
use thiserror::Error;

/// A logical wire of a circuit.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[display("w{_0}")]
#[serde(transparent)]
pub struct Wire(u32);

impl Wire {
    /// Create a wire with the given label.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The label of the wire.
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Identifier shared by the [`OpType::MeasureNode`] and [`OpType::PrepareNode`]
/// placed at the same cut.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[display("cut{_0}")]
#[serde(transparent)]
pub struct CutId(u32);

impl CutId {
    /// Create a cut identifier.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw index of the identifier.
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Single-wire Pauli operators.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[allow(missing_docs)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

/// Concrete quantum gates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Gate {
    /// Identity.
    I,
    /// Hadamard.
    H,
    /// Pauli X.
    X,
    /// Pauli Y.
    Y,
    /// Pauli Z.
    Z,
    /// Phase gate, `diag(1, i)`.
    S,
    /// Adjoint of the phase gate.
    Sdg,
    /// `diag(1, e^{iπ/4})`.
    T,
    /// Rotation around the X axis.
    Rx(f64),
    /// Rotation around the Y axis.
    Ry(f64),
    /// Rotation around the Z axis.
    Rz(f64),
    /// Controlled X, control first.
    CX,
    /// Controlled Z.
    CZ,
    /// Exchange of two wires.
    Swap,
}

impl Gate {
    /// The number of wires the gate acts on.
    pub fn arity(&self) -> usize {
        match self {
            Gate::CX | Gate::CZ | Gate::Swap => 2,
            _ => 1,
        }
    }

    /// Whether the gate carries a continuous parameter.
    pub fn is_parametrised(&self) -> bool {
        matches!(self, Gate::Rx(_) | Gate::Ry(_) | Gate::Rz(_))
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Rx(theta) => write!(f, "Rx({theta})"),
            Gate::Ry(theta) => write!(f, "Ry({theta})"),
            Gate::Rz(theta) => write!(f, "Rz({theta})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// The kind of an [`Operation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum OpType {
    /// A unitary gate.
    Gate(Gate),
    /// Request to cut every wire the operation is placed on. Has no
    /// computational effect.
    WireCut,
    /// Upstream end of a cut: the wire is measured here.
    MeasureNode(CutId),
    /// Downstream end of a cut: the wire is re-prepared here.
    PrepareNode(CutId),
    /// One single-wire factor of a read-out. Only found in circuit graphs.
    Observe {
        /// Index of the read-out in the program.
        read_out: usize,
        /// The Pauli observed on the wire.
        pauli: Pauli,
    },
}

impl From<Gate> for OpType {
    fn from(gate: Gate) -> Self {
        OpType::Gate(gate)
    }
}

impl OpType {
    /// If the operation is a gate, return it.
    pub fn as_gate(&self) -> Option<&Gate> {
        match self {
            OpType::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// Returns `true` if the operation is a gate.
    pub fn is_gate(&self) -> bool {
        self.as_gate().is_some()
    }

    /// Returns `true` if the operation is a [`OpType::WireCut`] marker.
    pub fn is_wire_cut(&self) -> bool {
        matches!(self, OpType::WireCut)
    }

    /// Returns `true` for measure and prepare placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.cut_id().is_some()
    }

    /// Returns `true` for read-out factors.
    pub fn is_observe(&self) -> bool {
        matches!(self, OpType::Observe { .. })
    }

    /// The cut a placeholder belongs to.
    pub fn cut_id(&self) -> Option<CutId> {
        match self {
            OpType::MeasureNode(id) | OpType::PrepareNode(id) => Some(*id),
            _ => None,
        }
    }

    /// The number of wires the operation must act on, if fixed.
    pub fn arity(&self) -> Option<usize> {
        match self {
            OpType::Gate(g) => Some(g.arity()),
            OpType::WireCut => None,
            OpType::MeasureNode(_) | OpType::PrepareNode(_) | OpType::Observe { .. } => Some(1),
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Gate(g) => g.fmt(f),
            OpType::WireCut => f.write_str("WireCut"),
            OpType::MeasureNode(id) => write!(f, "MeasureNode({id})"),
            OpType::PrepareNode(id) => write!(f, "PrepareNode({id})"),
            OpType::Observe { read_out, pauli } => write!(f, "Observe[{read_out}]({pauli})"),
        }
    }
}

/// An operation placed on an ordered list of wires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// What the operation does.
    pub op: OpType,
    /// The wires it acts on, in order.
    pub wires: Vec<Wire>,
}

impl Operation {
    /// Create a new operation.
    pub fn new(op: impl Into<OpType>, wires: impl IntoIterator<Item = impl Into<Wire>>) -> Self {
        Self {
            op: op.into(),
            wires: wires.into_iter().map(Into::into).collect(),
        }
    }

    /// A [`OpType::WireCut`] marker on the given wires.
    pub fn wire_cut(wires: impl IntoIterator<Item = impl Into<Wire>>) -> Self {
        Self::new(OpType::WireCut, wires)
    }

    /// Check that the operation is well formed: it acts on at least one wire,
    /// no wire twice, and on exactly as many wires as its kind requires.
    pub fn validate(&self) -> Result<(), InvalidOperation> {
        if self.wires.is_empty() {
            return Err(InvalidOperation::NoWires);
        }
        if let Some(wire) = self.wires.iter().duplicates().next() {
            return Err(InvalidOperation::DuplicateWire(*wire));
        }
        match self.op.arity() {
            Some(expected) if expected != self.wires.len() => Err(InvalidOperation::WrongArity {
                expected,
                actual: self.wires.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.wires.iter().join(","))
    }
}

/// Reasons an [`Operation`] is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvalidOperation {
    /// The operation acts on no wires.
    #[error("operation acts on no wires")]
    NoWires,
    /// The same wire is listed twice.
    #[error("wire {0} is listed more than once")]
    DuplicateWire(Wire),
    /// The number of wires does not match the kind of operation.
    #[error("expected {expected} wires but got {actual}")]
    WrongArity {
        /// Wires required by the operation kind.
        expected: usize,
        /// Wires supplied.
        actual: usize,
    },
}
