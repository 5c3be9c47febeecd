//! Linear, executable form of a circuit.

use std::collections::BTreeSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::ops::{CutId, Gate, OpType, Operation, Pauli, Wire};

/// The expectation value of a product of single-wire Paulis.
///
/// The empty product is the identity, whose expectation value is always 1.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadOut {
    factors: Vec<(Wire, Pauli)>,
}

impl ReadOut {
    /// A read-out of the given product. Identity factors are dropped.
    pub fn new(factors: impl IntoIterator<Item = (Wire, Pauli)>) -> Self {
        Self {
            factors: factors
                .into_iter()
                .filter(|(_, p)| *p != Pauli::I)
                .collect(),
        }
    }

    /// The identity read-out.
    pub fn identity() -> Self {
        Self::default()
    }

    /// A read-out of a single Pauli on one wire.
    pub fn single(wire: impl Into<Wire>, pauli: Pauli) -> Self {
        Self::new([(wire.into(), pauli)])
    }

    /// The non-identity factors of the product.
    pub fn factors(&self) -> &[(Wire, Pauli)] {
        &self.factors
    }

    /// Multiply the read-out by `pauli` on a wire it does not act on yet.
    pub fn push_factor(&mut self, wire: Wire, pauli: Pauli) {
        debug_assert!(self.factors.iter().all(|(w, _)| *w != wire));
        if pauli != Pauli::I {
            self.factors.push((wire, pauli));
        }
    }

    /// Returns `true` if the read-out is the identity.
    pub fn is_identity(&self) -> bool {
        self.factors.is_empty()
    }
}

/// An ordered sequence of operations followed by a list of read-outs.
///
/// Executing a program yields one number per read-out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    operations: Vec<Operation>,
    #[serde(default)]
    read_outs: Vec<ReadOut>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a program from its parts.
    pub fn from_parts(
        operations: impl IntoIterator<Item = Operation>,
        read_outs: impl IntoIterator<Item = ReadOut>,
    ) -> Self {
        Self {
            operations: operations.into_iter().collect(),
            read_outs: read_outs.into_iter().collect(),
        }
    }

    /// Append an operation.
    pub fn push(&mut self, op: Operation) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Append a gate on the given wires.
    pub fn add_gate(
        &mut self,
        gate: Gate,
        wires: impl IntoIterator<Item = impl Into<Wire>>,
    ) -> &mut Self {
        self.push(Operation::new(gate, wires))
    }

    /// Append a [`OpType::WireCut`] marker on the given wires.
    pub fn add_wire_cut(&mut self, wires: impl IntoIterator<Item = impl Into<Wire>>) -> &mut Self {
        self.push(Operation::wire_cut(wires))
    }

    /// Append a read-out.
    pub fn add_read_out(&mut self, read_out: ReadOut) -> &mut Self {
        self.read_outs.push(read_out);
        self
    }

    /// The operations, in program order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The read-outs, in result order.
    pub fn read_outs(&self) -> &[ReadOut] {
        &self.read_outs
    }

    /// Mutable access to the read-outs.
    pub fn read_outs_mut(&mut self) -> &mut [ReadOut] {
        &mut self.read_outs
    }

    /// Every wire used by an operation or a read-out.
    pub fn wires(&self) -> BTreeSet<Wire> {
        self.operations
            .iter()
            .flat_map(|op| op.wires.iter().copied())
            .chain(
                self.read_outs
                    .iter()
                    .flat_map(|r| r.factors().iter().map(|(w, _)| *w)),
            )
            .collect()
    }

    /// The number of gates in the program.
    pub fn num_gates(&self) -> usize {
        self.operations.iter().filter(|op| op.op.is_gate()).count()
    }

    /// The measure and prepare placeholders, in program order, together
    /// with their position in [`Program::operations`].
    pub fn placeholders(&self) -> impl Iterator<Item = (usize, &Operation)> + '_ {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.op.is_placeholder())
    }

    /// The cuts this program takes part in, in placeholder order.
    pub fn cut_ids(&self) -> Vec<CutId> {
        self.placeholders()
            .filter_map(|(_, op)| op.op.cut_id())
            .collect()
    }

    /// Returns `true` if the program contains no [`OpType::WireCut`] marker.
    pub fn is_marker_free(&self) -> bool {
        !self.operations.iter().any(|op| op.op.is_wire_cut())
    }

    /// Remove every [`OpType::WireCut`] marker, giving the program that the
    /// cut version reconstructs.
    pub fn without_wire_cuts(&self) -> Self {
        Self {
            operations: self
                .operations
                .iter()
                .filter(|op| !matches!(op.op, OpType::WireCut))
                .cloned()
                .collect(),
            read_outs: self.read_outs.clone(),
        }
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for op in &self.operations {
            writeln!(f, "{op}")?;
        }
        for (i, r) in self.read_outs.iter().enumerate() {
            let obs = if r.is_identity() {
                "I".to_string()
            } else {
                r.factors()
                    .iter()
                    .map(|(w, p)| format!("{p}({w})"))
                    .join(" @ ")
            };
            writeln!(f, "expval[{i}] {obs}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_out_drops_identities() {
        let r = ReadOut::new([(Wire::new(0), Pauli::I), (Wire::new(1), Pauli::Z)]);
        assert_eq!(r.factors(), &[(Wire::new(1), Pauli::Z)]);
        assert!(ReadOut::single(3, Pauli::I).is_identity());
    }

    #[test]
    fn wires_and_markers() {
        let mut p = Program::new();
        p.add_gate(Gate::H, [0])
            .add_wire_cut([0])
            .add_gate(Gate::CX, [0, 2])
            .add_read_out(ReadOut::single(5, Pauli::X));
        assert_eq!(
            p.wires().into_iter().map(Wire::index).collect::<Vec<_>>(),
            vec![0, 2, 5]
        );
        assert!(!p.is_marker_free());
        let stripped = p.without_wire_cuts();
        assert!(stripped.is_marker_free());
        assert_eq!(stripped.operations().len(), 2);
        assert_eq!(stripped.num_gates(), 2);
    }

    #[test]
    fn serde_round_trip_shape() {
        let mut p = Program::new();
        p.add_gate(Gate::Rx(0.25), [1])
            .add_read_out(ReadOut::single(1, Pauli::Z));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "operations": [{"op": {"Gate": {"Rx": 0.25}}, "wires": [1]}],
                "read_outs": [[[1, "Z"]]],
            })
        );
        let back: Program = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
