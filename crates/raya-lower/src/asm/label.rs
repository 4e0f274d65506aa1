//! Labels: merge points with typed parameters
//!
//! A `Label` is a block that other blocks jump to while passing values.
//! Binding the label makes it current and yields one value per parameter:
//! the passed value itself when there is a single incoming edge, a phi
//! otherwise. A loop label is bound after its single forward edge; its
//! parameters become loop phis that the back edge closes.
//!
//! Every label must be bound exactly once, even when nothing jumps to it;
//! `bind_label` then returns `None`. A reachable loop label must be closed by
//! exactly one back edge. Misuse is a compiler bug and panics: a parameter
//! count or representation mismatch, a jump to an already bound merge label,
//! a second back edge, dropping an unbound label, or dropping an open loop.

use super::Assembler;
use crate::ir::instr::{Op, OpIndex};
use crate::ir::types::{BranchHint, Rep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    Merge,
    Loop,
}

/// Merge point with one value per parameter on every incoming edge
#[derive(Debug)]
pub struct Label {
    block: crate::ir::BlockIndex,
    reps: Vec<Rep>,
    kind: LabelKind,
    bound: bool,
    /// Values passed on each forward edge, in predecessor order
    recorded: Vec<Vec<OpIndex>>,
    /// Loop phis waiting for the back edge
    pending_phis: Vec<OpIndex>,
    /// Bound in reachable code
    entered: bool,
    back_edge_taken: bool,
}

impl Label {
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Number of forward edges recorded so far
    pub fn edge_count(&self) -> usize {
        self.recorded.len()
    }
}

impl Drop for Label {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        if !self.bound {
            panic!("label {} has {} incoming edges but was never bound", self.block, self.recorded.len());
        }
        if self.kind == LabelKind::Loop && self.entered && !self.back_edge_taken {
            panic!("loop label {} was bound but never closed by a back edge", self.block);
        }
    }
}

impl Assembler {
    pub fn new_label(&mut self, reps: &[Rep]) -> Label {
        let block = self.new_block();
        Label {
            block,
            reps: reps.to_vec(),
            kind: LabelKind::Merge,
            bound: false,
            recorded: Vec::new(),
            pending_phis: Vec::new(),
            entered: false,
            back_edge_taken: false,
        }
    }

    pub fn new_loop_label(&mut self, reps: &[Rep]) -> Label {
        let block = self.new_loop_header();
        Label {
            block,
            reps: reps.to_vec(),
            kind: LabelKind::Loop,
            bound: false,
            recorded: Vec::new(),
            pending_phis: Vec::new(),
            entered: false,
            back_edge_taken: false,
        }
    }

    fn check_label_values(&self, label: &Label, values: &[OpIndex]) {
        assert_eq!(
            values.len(),
            label.reps.len(),
            "label {} takes {} values, got {}",
            label.block,
            label.reps.len(),
            values.len()
        );
        for (i, (&value, &rep)) in values.iter().zip(&label.reps).enumerate() {
            let found = self.rep_of(value);
            assert_eq!(
                found, rep,
                "label {} parameter {} is {}, got {} ({})",
                label.block, i, rep, found, value
            );
        }
    }

    /// Jump to `label` passing `values`. Jumping to a bound loop label is its
    /// back edge.
    pub fn goto_label(&mut self, label: &mut Label, values: &[OpIndex]) {
        if !self.is_reachable() {
            return;
        }
        self.check_label_values(label, values);

        if label.bound {
            assert!(
                label.kind == LabelKind::Loop,
                "jump to label {} after it was bound",
                label.block
            );
            assert!(!label.back_edge_taken, "second back edge to loop {}", label.block);
            label.back_edge_taken = true;
            for (i, &pending) in label.pending_phis.iter().enumerate() {
                let first = match self.graph().op(pending) {
                    Op::PendingLoopPhi { first, .. } => *first,
                    other => panic!("{} is not a pending loop phi: {}", pending, other),
                };
                *self.graph_mut().op_mut(pending) = Op::Phi {
                    inputs: vec![first, values[i]],
                    rep: label.reps[i],
                };
            }
            self.goto(label.block);
            return;
        }

        label.recorded.push(values.to_vec());
        self.goto(label.block);
    }

    /// Jump to `label` when `condition` is non-zero, otherwise fall through
    pub fn goto_if(&mut self, condition: OpIndex, label: &mut Label, values: &[OpIndex], hint: BranchHint) {
        let taken = self.new_block();
        let fallthrough = self.new_block();
        self.branch(condition, taken, fallthrough, hint);
        if self.bind(taken) {
            self.goto_label(label, values);
        }
        self.bind(fallthrough);
    }

    /// Jump to `label` when `condition` is zero, otherwise fall through
    pub fn goto_if_not(&mut self, condition: OpIndex, label: &mut Label, values: &[OpIndex], hint: BranchHint) {
        let taken = self.new_block();
        let fallthrough = self.new_block();
        self.branch(condition, fallthrough, taken, hint.invert());
        if self.bind(taken) {
            self.goto_label(label, values);
        }
        self.bind(fallthrough);
    }

    /// Bind `label` and return its parameter values, or `None` when nothing
    /// jumps to it
    pub fn bind_label(&mut self, label: &mut Label) -> Option<Vec<OpIndex>> {
        assert!(!label.bound, "label {} bound twice", label.block);
        label.bound = true;

        if !self.bind(label.block) {
            return None;
        }
        label.entered = true;

        match label.kind {
            LabelKind::Merge => {
                if label.recorded.len() == 1 {
                    return Some(label.recorded[0].clone());
                }
                let reps = label.reps.clone();
                let values = reps
                    .iter()
                    .enumerate()
                    .map(|(i, &rep)| {
                        let inputs = label.recorded.iter().map(|edge| edge[i]).collect();
                        self.phi(inputs, rep)
                    })
                    .collect();
                Some(values)
            }
            LabelKind::Loop => {
                assert_eq!(
                    label.recorded.len(),
                    1,
                    "loop {} must have exactly one forward edge",
                    label.block
                );
                let first = label.recorded[0].clone();
                let reps = label.reps.clone();
                label.pending_phis = first
                    .iter()
                    .zip(reps)
                    .map(|(&first, rep)| self.emit(Op::PendingLoopPhi { first, rep }))
                    .collect();
                Some(label.pending_phis.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::verify;

    fn asm() -> Assembler {
        Assembler::new("label", LoweringConfig::default())
    }

    #[test]
    fn test_single_edge_passes_value_through() {
        let mut a = asm();
        let c = a.word32_constant(7);
        let mut done = a.new_label(&[Rep::Word32]);
        a.goto_label(&mut done, &[c]);
        let values = a.bind_label(&mut done).unwrap();
        assert_eq!(values, vec![c]);
        a.ret(values);
        assert_eq!(verify(&a.finish()), Ok(()));
    }

    #[test]
    fn test_two_edges_make_a_phi() {
        let mut a = asm();
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        let one = a.word32_constant(1);
        let two = a.word32_constant(2);
        let mut done = a.new_label(&[Rep::Word32]);
        a.goto_if(p, &mut done, &[one], BranchHint::None);
        a.goto_label(&mut done, &[two]);
        let values = a.bind_label(&mut done).unwrap();
        assert!(matches!(a.graph().op(values[0]), Op::Phi { inputs, .. } if inputs == &vec![one, two]));
        a.ret(values);
        assert_eq!(verify(&a.finish()), Ok(()));
    }

    #[test]
    fn test_unreached_label_binds_to_none() {
        let mut a = asm();
        let mut never = a.new_label(&[]);
        a.unreachable();
        assert_eq!(a.bind_label(&mut never), None);
        assert!(!a.is_reachable());
    }

    #[test]
    fn test_loop_label_closes_phis() {
        let mut a = asm();
        let zero = a.word32_constant(0);
        let mut header = a.new_loop_label(&[Rep::Word32]);
        a.goto_label(&mut header, &[zero]);
        let i = a.bind_label(&mut header).unwrap()[0];
        let ten = a.word32_constant(10);
        let more = a.int32_less_than(i, ten);
        let mut exit = a.new_label(&[]);
        a.goto_if_not(more, &mut exit, &[], BranchHint::None);
        let one = a.word32_constant(1);
        let next = a.word32_add(i, one);
        a.goto_label(&mut header, &[next]);
        a.bind_label(&mut exit);
        a.ret(vec![i]);

        assert!(matches!(a.graph().op(i), Op::Phi { inputs, .. } if inputs == &vec![zero, next]));
        assert_eq!(verify(&a.finish()), Ok(()));
    }

    #[test]
    #[should_panic(expected = "takes 1 values, got 2")]
    fn test_parameter_count_mismatch_panics() {
        let mut a = asm();
        let c = a.word32_constant(0);
        let mut done = a.new_label(&[Rep::Word32]);
        a.goto_label(&mut done, &[c, c]);
    }

    #[test]
    #[should_panic(expected = "parameter 0 is f64, got w32")]
    fn test_parameter_rep_mismatch_panics() {
        let mut a = asm();
        let c = a.word32_constant(0);
        let mut done = a.new_label(&[Rep::Float64]);
        a.goto_label(&mut done, &[c]);
    }

    #[test]
    #[should_panic(expected = "after it was bound")]
    fn test_jump_to_bound_label_panics() {
        let mut a = asm();
        let mut done = a.new_label(&[]);
        a.goto_label(&mut done, &[]);
        a.bind_label(&mut done);
        a.goto_label(&mut done, &[]);
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn test_unbound_label_with_edges_panics() {
        let mut a = asm();
        let mut done = a.new_label(&[]);
        a.goto_label(&mut done, &[]);
    }

    #[test]
    #[should_panic(expected = "0 incoming edges but was never bound")]
    fn test_unused_label_must_still_be_bound() {
        let mut a = asm();
        let _done = a.new_label(&[Rep::Word32]);
    }

    #[test]
    #[should_panic(expected = "never closed by a back edge")]
    fn test_loop_without_parameters_must_be_closed() {
        let mut a = asm();
        let mut header = a.new_loop_label(&[]);
        a.goto_label(&mut header, &[]);
        a.bind_label(&mut header);
        a.ret(vec![]);
        drop(header);
    }

    #[test]
    fn test_unreachable_loop_needs_no_back_edge() {
        let mut a = asm();
        let mut header = a.new_loop_label(&[Rep::Word32]);
        a.unreachable();
        assert_eq!(a.bind_label(&mut header), None);
    }

    #[test]
    #[should_panic(expected = "second back edge")]
    fn test_second_back_edge_panics() {
        let mut a = asm();
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        let mut header = a.new_loop_label(&[]);
        a.goto_label(&mut header, &[]);
        a.bind_label(&mut header);
        a.goto_if(p, &mut header, &[], BranchHint::None);
        a.goto_label(&mut header, &[]);
    }
}
