//! Expansion of a fragment program into one concrete program per basis
//! configuration of its placeholders.
//!
//! Every placeholder takes one of [`ALPHABET_SIZE`] bases. A
//! [`OpType::MeasureNode`] in basis `P` becomes an identity on its wire and
//! multiplies every read-out by `P` on that wire. A [`OpType::PrepareNode`]
//! becomes the gates preparing its state from `|0>`.
//!
//! Configurations are numbered by a mixed-radix counter over the placeholders
//! in program order, the first placeholder being the most significant digit.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

use crate::ops::{CutId, Gate, OpType, Operation, Pauli};
use crate::program::Program;

/// The number of bases each placeholder can take.
pub const ALPHABET_SIZE: usize = 4;

/// Basis a [`OpType::MeasureNode`] measures in.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[allow(missing_docs)]
pub enum MeasureBasis {
    I,
    X,
    Y,
    Z,
}

impl MeasureBasis {
    /// The basis at position `index` of the alphabet.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    /// The Pauli observed.
    pub fn pauli(self) -> Pauli {
        match self {
            MeasureBasis::I => Pauli::I,
            MeasureBasis::X => Pauli::X,
            MeasureBasis::Y => Pauli::Y,
            MeasureBasis::Z => Pauli::Z,
        }
    }
}

/// State a [`OpType::PrepareNode`] prepares.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize, Deserialize,
)]
pub enum PrepareBasis {
    /// `|0>`
    #[display("|0>")]
    Zero,
    /// `|1>`
    #[display("|1>")]
    One,
    /// `|+>`
    #[display("|+>")]
    Plus,
    /// `|+i>`
    #[display("|+i>")]
    PlusI,
}

impl PrepareBasis {
    /// The basis at position `index` of the alphabet.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    /// Gates taking `|0>` to the state, in application order.
    pub fn gates(self) -> &'static [Gate] {
        match self {
            PrepareBasis::Zero => &[Gate::I],
            PrepareBasis::One => &[Gate::X],
            PrepareBasis::Plus => &[Gate::H],
            PrepareBasis::PlusI => &[Gate::H, Gate::S],
        }
    }
}

/// Which side of a cut a placeholder is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum PlaceholderKind {
    /// A [`OpType::MeasureNode`].
    Measure,
    /// A [`OpType::PrepareNode`].
    Prepare,
}

/// A placeholder of a fragment program, in the order its configuration digit
/// appears.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    /// The cut.
    pub cut: CutId,
    /// The side of the cut.
    pub kind: PlaceholderKind,
}

/// The placeholders of a program, in program order.
pub fn placeholder_layout(program: &Program) -> Vec<Placeholder> {
    program
        .placeholders()
        .filter_map(|(_, op)| match op.op {
            OpType::MeasureNode(cut) => Some(Placeholder {
                cut,
                kind: PlaceholderKind::Measure,
            }),
            OpType::PrepareNode(cut) => Some(Placeholder {
                cut,
                kind: PlaceholderKind::Prepare,
            }),
            _ => None,
        })
        .collect()
}

/// Too many placeholders to number every configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{placeholders} placeholders have more configurations than can be counted")]
pub struct ConfigurationOverflow {
    /// The number of placeholders.
    pub placeholders: usize,
}

/// The number of configurations of `placeholders` placeholders.
pub fn configuration_count(placeholders: usize) -> Result<usize, ConfigurationOverflow> {
    u32::try_from(placeholders)
        .ok()
        .and_then(|p| ALPHABET_SIZE.checked_pow(p))
        .ok_or(ConfigurationOverflow { placeholders })
}

/// The configurations of a fragment program.
///
/// A lazy view: programs are only built when asked for, and [`Configurations::iter`]
/// can be called any number of times, always giving the same sequence.
#[derive(Clone, Debug)]
pub struct Configurations<'p> {
    program: &'p Program,
    /// Positions of the placeholders in the program.
    positions: Vec<usize>,
    len: usize,
}

impl<'p> Configurations<'p> {
    /// The configurations of `program`.
    pub fn new(program: &'p Program) -> Result<Self, ConfigurationOverflow> {
        let positions = program.placeholders().map(|(i, _)| i).collect::<Vec<_>>();
        let len = configuration_count(positions.len())?;
        Ok(Self {
            program,
            positions,
            len,
        })
    }

    /// The number of configurations.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no configurations. Never the case, as a
    /// program without placeholders has one configuration; provided alongside
    /// [`Configurations::len`] to satisfy clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of placeholders.
    pub fn num_placeholders(&self) -> usize {
        self.positions.len()
    }

    /// The alphabet index of each placeholder in configuration `index`.
    pub fn digits(&self, index: usize) -> Option<Vec<usize>> {
        if index >= self.len {
            return None;
        }
        let mut digits = vec![0; self.positions.len()];
        let mut rest = index;
        for d in digits.iter_mut().rev() {
            *d = rest % ALPHABET_SIZE;
            rest /= ALPHABET_SIZE;
        }
        Some(digits)
    }

    /// The program for configuration `index`.
    pub fn get(&self, index: usize) -> Option<Program> {
        let digits = self.digits(index)?;
        let mut placeholder = self.positions.iter().copied().zip(digits).peekable();
        let mut operations = Vec::with_capacity(self.program.operations().len());
        let mut observed = Vec::new();

        for (i, op) in self.program.operations().iter().enumerate() {
            let digit = match placeholder.peek() {
                Some(&(pos, digit)) if pos == i => {
                    placeholder.next();
                    digit
                }
                _ => {
                    operations.push(op.clone());
                    continue;
                }
            };
            match op.op {
                OpType::MeasureNode(_) => {
                    let basis = MeasureBasis::from_index(digit)?;
                    operations.push(Operation::new(Gate::I, op.wires.iter().copied()));
                    observed.extend(op.wires.iter().map(|&w| (w, basis.pauli())));
                }
                OpType::PrepareNode(_) => {
                    let basis = PrepareBasis::from_index(digit)?;
                    operations.extend(
                        basis
                            .gates()
                            .iter()
                            .map(|&g| Operation::new(g, op.wires.iter().copied())),
                    );
                }
                _ => operations.push(op.clone()),
            }
        }

        let mut program = Program::from_parts(operations, self.program.read_outs().to_vec());
        for read_out in program.read_outs_mut() {
            for &(w, p) in &observed {
                read_out.push_factor(w, p);
            }
        }
        Some(program)
    }

    /// Iterate over the programs of every configuration, in order.
    pub fn iter(&self) -> ConfigurationIter<'_, 'p> {
        ConfigurationIter {
            configurations: self,
            next: 0,
        }
    }
}

impl<'a, 'p> IntoIterator for &'a Configurations<'p> {
    type Item = Program;
    type IntoIter = ConfigurationIter<'a, 'p>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the programs of [`Configurations`].
#[derive(Clone, Debug)]
pub struct ConfigurationIter<'a, 'p> {
    configurations: &'a Configurations<'p>,
    next: usize,
}

impl Iterator for ConfigurationIter<'_, '_> {
    type Item = Program;

    fn next(&mut self) -> Option<Program> {
        let program = self.configurations.get(self.next)?;
        self.next += 1;
        Some(program)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.configurations.len.saturating_sub(self.next);
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for ConfigurationIter<'_, '_> {}

/// Expand a fragment program into the programs of all its configurations.
pub fn expand_fragment_program(program: &Program) -> Result<Vec<Program>, ConfigurationOverflow> {
    Ok(Configurations::new(program)?.iter().collect())
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use rstest::rstest;

    use super::*;
    use crate::ops::Wire;
    use crate::program::ReadOut;

    fn placeholder_program(measures: usize, prepares: usize) -> Program {
        let mut p = Program::new();
        let mut w = 0u32;
        for c in 0..measures {
            p.add_gate(Gate::H, [w])
                .push(Operation::new(OpType::MeasureNode(CutId::new(c as u32)), [w]));
            w += 1;
        }
        for c in measures..measures + prepares {
            p.push(Operation::new(OpType::PrepareNode(CutId::new(c as u32)), [w]))
                .add_gate(Gate::H, [w]);
            w += 1;
        }
        p.add_read_out(ReadOut::identity())
            .add_read_out(ReadOut::single(w, Pauli::Z));
        p
    }

    #[rstest]
    #[case(0, 0, 1)]
    #[case(1, 0, 4)]
    #[case(0, 2, 16)]
    #[case(2, 1, 64)]
    fn configuration_counts(#[case] m: usize, #[case] p: usize, #[case] expected: usize) {
        let prog = placeholder_program(m, p);
        let configs = Configurations::new(&prog).unwrap();
        assert_eq!(configs.len(), expected);
        assert_eq!(configs.iter().len(), expected);
        assert!(!configs.is_empty());
        assert_eq!(placeholder_layout(&prog).len(), m + p);
        for program in configs.iter() {
            assert!(program.placeholders().next().is_none());
            assert_eq!(program.read_outs().len(), 2);
        }
    }

    #[test]
    fn restartable_and_ordered() {
        let prog = placeholder_program(1, 1);
        let configs = Configurations::new(&prog).unwrap();
        let first = configs.iter().collect_vec();
        let second = configs.iter().collect_vec();
        assert_eq!(first, second);
        assert_eq!(first, expand_fragment_program(&prog).unwrap());

        // Mixed radix, first placeholder most significant.
        assert_eq!(configs.digits(0), Some(vec![0, 0]));
        assert_eq!(configs.digits(1), Some(vec![0, 1]));
        assert_eq!(configs.digits(4), Some(vec![1, 0]));
        assert_eq!(configs.digits(15), Some(vec![3, 3]));
        assert_eq!(configs.digits(16), None);
        assert_eq!(configs.get(16), None);
    }

    #[test]
    fn resolved_operations() {
        let prog = placeholder_program(1, 1);
        let configs = Configurations::new(&prog).unwrap();
        // Measure in Y, prepare |+i>.
        let p = configs.get(2 * 4 + 3).unwrap();
        let shown = p.operations().iter().map(|op| op.to_string()).collect_vec();
        assert_eq!(shown, vec!["H w0", "I w0", "H w1", "S w1", "H w1"]);
        assert_eq!(
            p.read_outs(),
            &[
                ReadOut::single(0, Pauli::Y),
                ReadOut::new([(Wire::new(2), Pauli::Z), (Wire::new(0), Pauli::Y)]),
            ]
        );

        // Measuring the identity adds no factor.
        let p = configs.get(0).unwrap();
        assert_eq!(p.read_outs()[0], ReadOut::identity());
        assert_eq!(p.operations()[2].to_string(), "I w1");
    }

    #[test]
    fn alphabet() {
        assert_eq!(MeasureBasis::iter().count(), ALPHABET_SIZE);
        assert_eq!(PrepareBasis::iter().count(), ALPHABET_SIZE);
        assert_eq!(PrepareBasis::from_index(3), Some(PrepareBasis::PlusI));
        assert_eq!(MeasureBasis::from_index(4), None);
        assert_eq!(PrepareBasis::Plus.to_string(), "|+>");
        assert_eq!(configuration_count(3), Ok(64));
        assert_eq!(
            configuration_count(40),
            Err(ConfigurationOverflow { placeholders: 40 })
        );
    }
}
