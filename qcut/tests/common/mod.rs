//! Shared helpers for the integration tests: a dense state-vector simulator
//! and random program strategies.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use itertools::Itertools;
use num_complex::Complex64;
use proptest::prelude::*;
use proptest::sample::{select, subsequence};

use qcut::{CutCircuit, Gate, OpType, Operation, Pauli, Program, ReadOut, Wire};

pub const TOL: f64 = 1e-9;

type Matrix = [[Complex64; 2]; 2];

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn single_qubit_matrix(gate: Gate) -> Matrix {
    let zero = c(0.0, 0.0);
    let one = c(1.0, 0.0);
    let h = c(FRAC_1_SQRT_2, 0.0);
    match gate {
        Gate::I => [[one, zero], [zero, one]],
        Gate::H => [[h, h], [h, -h]],
        Gate::X => [[zero, one], [one, zero]],
        Gate::Y => [[zero, c(0.0, -1.0)], [c(0.0, 1.0), zero]],
        Gate::Z => [[one, zero], [zero, -one]],
        Gate::S => [[one, zero], [zero, c(0.0, 1.0)]],
        Gate::Sdg => [[one, zero], [zero, c(0.0, -1.0)]],
        Gate::T => [[one, zero], [zero, Complex64::from_polar(1.0, PI / 4.0)]],
        Gate::Rx(theta) => {
            let (s, co) = (theta / 2.0).sin_cos();
            [[c(co, 0.0), c(0.0, -s)], [c(0.0, -s), c(co, 0.0)]]
        }
        Gate::Ry(theta) => {
            let (s, co) = (theta / 2.0).sin_cos();
            [[c(co, 0.0), c(-s, 0.0)], [c(s, 0.0), c(co, 0.0)]]
        }
        Gate::Rz(theta) => [
            [Complex64::from_polar(1.0, -theta / 2.0), zero],
            [zero, Complex64::from_polar(1.0, theta / 2.0)],
        ],
        other => panic!("{other} is not a single-qubit gate"),
    }
}

/// A pure state over the wires of a program, every wire starting in `|0>`.
pub struct StateVector {
    qubit: BTreeMap<Wire, usize>,
    amplitudes: Vec<Complex64>,
}

impl StateVector {
    fn new(wires: impl IntoIterator<Item = Wire>) -> Self {
        let qubit: BTreeMap<Wire, usize> = wires
            .into_iter()
            .unique()
            .enumerate()
            .map(|(q, w)| (w, q))
            .collect();
        let mut amplitudes = vec![c(0.0, 0.0); 1 << qubit.len()];
        amplitudes[0] = c(1.0, 0.0);
        Self { qubit, amplitudes }
    }

    fn bit(&self, wire: Wire) -> usize {
        1 << self.qubit[&wire]
    }

    fn apply_single(&mut self, m: &Matrix, wire: Wire) {
        let b = self.bit(wire);
        for i in 0..self.amplitudes.len() {
            if i & b == 0 {
                let (a0, a1) = (self.amplitudes[i], self.amplitudes[i | b]);
                self.amplitudes[i] = m[0][0] * a0 + m[0][1] * a1;
                self.amplitudes[i | b] = m[1][0] * a0 + m[1][1] * a1;
            }
        }
    }

    fn apply(&mut self, op: &Operation) {
        match &op.op {
            OpType::WireCut => {}
            OpType::Gate(Gate::CX) => {
                let (ctrl, tgt) = (self.bit(op.wires[0]), self.bit(op.wires[1]));
                for i in 0..self.amplitudes.len() {
                    if i & ctrl != 0 && i & tgt == 0 {
                        self.amplitudes.swap(i, i | tgt);
                    }
                }
            }
            OpType::Gate(Gate::CZ) => {
                let (a, b) = (self.bit(op.wires[0]), self.bit(op.wires[1]));
                for (i, amp) in self.amplitudes.iter_mut().enumerate() {
                    if i & a != 0 && i & b != 0 {
                        *amp = -*amp;
                    }
                }
            }
            OpType::Gate(Gate::Swap) => {
                let (a, b) = (self.bit(op.wires[0]), self.bit(op.wires[1]));
                for i in 0..self.amplitudes.len() {
                    if i & a != 0 && i & b == 0 {
                        self.amplitudes.swap(i, i ^ a ^ b);
                    }
                }
            }
            OpType::Gate(g) => self.apply_single(&single_qubit_matrix(*g), op.wires[0]),
            other => panic!("cannot simulate {other}"),
        }
    }

    fn expectation(&self, read_out: &ReadOut) -> f64 {
        let mut image = Self {
            qubit: self.qubit.clone(),
            amplitudes: self.amplitudes.clone(),
        };
        for &(w, p) in read_out.factors() {
            let gate = match p {
                Pauli::I => Gate::I,
                Pauli::X => Gate::X,
                Pauli::Y => Gate::Y,
                Pauli::Z => Gate::Z,
            };
            image.apply_single(&single_qubit_matrix(gate), w);
        }
        self.amplitudes
            .iter()
            .zip(&image.amplitudes)
            .map(|(a, b)| a.conj() * b)
            .sum::<Complex64>()
            .re
    }
}

/// Execute a program, returning the expectation value of each read-out.
///
/// [`OpType::WireCut`] markers are ignored.
pub fn execute(program: &Program) -> Vec<f64> {
    let mut state = StateVector::new(program.wires());
    for op in program.operations() {
        state.apply(op);
    }
    program
        .read_outs()
        .iter()
        .map(|r| state.expectation(r))
        .collect()
}

/// Execute every fragment program and contract the results.
pub fn run_cut(cut: &CutCircuit) -> Vec<f64> {
    let results = cut.programs.iter().map(execute).collect_vec();
    cut.contract(&results).unwrap()
}

pub fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() < TOL,
            "read-out {i}: got {a}, expected {e} ({actual:?} vs {expected:?})"
        );
    }
}

pub fn any_gate() -> impl Strategy<Value = Gate> {
    prop_oneof![
        select(vec![
            Gate::H,
            Gate::X,
            Gate::Y,
            Gate::Z,
            Gate::S,
            Gate::Sdg,
            Gate::T,
            Gate::CX,
            Gate::CZ,
            Gate::Swap,
        ]),
        (-PI..PI).prop_map(Gate::Rx),
        (-PI..PI).prop_map(Gate::Ry),
        (-PI..PI).prop_map(Gate::Rz),
    ]
}

/// A gate on distinct wires among the first `num_wires`, or (one time in
/// `1 + gate_weight`) a wire cut marker on one or two of them.
pub fn any_operation(num_wires: u32, gate_weight: u32) -> impl Strategy<Value = Operation> {
    let wires = (0..num_wires).map(Wire::new).collect_vec();
    let marker_wires = wires.clone();
    let gate = any_gate().prop_flat_map(move |g| {
        subsequence(wires.clone(), g.arity())
            .prop_shuffle()
            .prop_map(move |ws| Operation::new(g, ws))
    });
    let marker = subsequence(marker_wires, 1..=2).prop_map(Operation::wire_cut);
    prop_oneof![
        gate_weight => gate,
        1 => marker,
    ]
}

pub fn any_read_out(num_wires: u32) -> impl Strategy<Value = ReadOut> {
    proptest::collection::vec(
        (0..num_wires, select(vec![Pauli::X, Pauli::Y, Pauli::Z])),
        0..=3,
    )
    .prop_map(|factors| {
        ReadOut::new(
            factors
                .into_iter()
                .unique_by(|(w, _)| *w)
                .map(|(w, p)| (Wire::new(w), p)),
        )
    })
}

/// A random program on `num_wires >= 2` wires, with markers.
pub fn any_program(num_wires: u32, max_ops: usize) -> impl Strategy<Value = Program> {
    (
        proptest::collection::vec(any_operation(num_wires, 4), 1..=max_ops),
        proptest::collection::vec(any_read_out(num_wires), 1..=3),
    )
        .prop_map(|(ops, read_outs)| Program::from_parts(ops, read_outs))
}
