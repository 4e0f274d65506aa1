//! Reducer stack
//!
//! Each reducer either lowers an operation completely or forwards it to the
//! next reducer. An operation every reducer forwards is emitted unchanged.
//!
//! Operations a reducer emits while lowering go straight into the output
//! graph. They are not offered to the reducers after it, so a stage placed
//! behind `machine-lowering` only sees the operations that stage forwards.

use tracing::trace;

use crate::asm::Assembler;
use crate::ir::{Op, OpIndex};

use super::machine::MachineLoweringReducer;

/// Outcome of offering an operation to a reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// The operation was replaced; this is the value standing in for it
    Done(OpIndex),
    /// Not handled here; offer it to the next reducer
    Forward,
}

/// A lowering stage over single operations
///
/// Whatever `reduce` emits through `asm` is final: later reducers in the
/// stack never see it.
pub trait Reducer: Send + Sync {
    /// Name of this reducer (for diagnostics)
    fn name(&self) -> &str;
    /// Lower `op` (its operands already refer to the output graph) or forward it
    fn reduce(&mut self, op: &Op, asm: &mut Assembler) -> Reduction;
}

/// Ordered chain of reducers
pub struct ReducerStack {
    reducers: Vec<Box<dyn Reducer>>,
}

impl ReducerStack {
    /// Create a stack with the default lowering reducers
    pub fn new() -> Self {
        ReducerStack {
            reducers: vec![Box::new(MachineLoweringReducer::new())],
        }
    }

    /// Create an empty stack (every operation is copied unchanged)
    pub fn empty() -> Self {
        ReducerStack { reducers: vec![] }
    }

    /// Add a reducer after the existing ones
    pub fn add_reducer(&mut self, reducer: Box<dyn Reducer>) {
        self.reducers.push(reducer);
    }

    pub fn names(&self) -> Vec<&str> {
        self.reducers.iter().map(|r| r.name()).collect()
    }

    /// Offer `op` to each reducer in order; emit it unchanged if none
    /// handles it. The first `Done` ends the walk.
    pub fn reduce(&mut self, op: &Op, asm: &mut Assembler) -> OpIndex {
        for reducer in &mut self.reducers {
            if let Reduction::Done(result) = reducer.reduce(op, asm) {
                return result;
            }
            trace!(reducer = reducer.name(), op = op.mnemonic(), "forwarded");
        }
        asm.emit(op.clone())
    }
}

impl Default for ReducerStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::types::Rep;
    use crate::ir::Constant;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Records every operation that reaches it
    struct Recorder {
        seen: Arc<AtomicUsize>,
    }

    impl Reducer for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn reduce(&mut self, _op: &Op, _asm: &mut Assembler) -> Reduction {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Reduction::Forward
        }
    }

    /// Replaces every word32 constant with zero
    struct ZeroConstants;

    impl Reducer for ZeroConstants {
        fn name(&self) -> &str {
            "zero-constants"
        }

        fn reduce(&mut self, op: &Op, asm: &mut Assembler) -> Reduction {
            match op {
                Op::Constant(Constant::Word32(_)) => Reduction::Done(asm.word32_constant(0)),
                _ => Reduction::Forward,
            }
        }
    }

    #[test]
    fn test_empty_stack_copies() {
        let mut stack = ReducerStack::empty();
        let mut a = Assembler::new("copy", LoweringConfig::default());
        let op = Op::Parameter { index: 0, rep: Rep::Word64 };
        let out = stack.reduce(&op, &mut a);
        assert_eq!(a.graph().op(out), &op);
    }

    #[test]
    fn test_forwarded_ops_reach_later_reducers() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut stack = ReducerStack::empty();
        stack.add_reducer(Box::new(ZeroConstants));
        stack.add_reducer(Box::new(Recorder { seen: seen.clone() }));
        assert_eq!(stack.names(), vec!["zero-constants", "recorder"]);

        let mut a = Assembler::new("chain", LoweringConfig::default());
        let c = stack.reduce(&Op::Constant(Constant::Word32(5)), &mut a);
        assert_eq!(a.graph().op(c), &Op::Constant(Constant::Word32(0)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        stack.reduce(&Op::Parameter { index: 0, rep: Rep::Tagged }, &mut a);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lowered_ops_skip_later_reducers() {
        use crate::ir::instr::FeedbackSource;
        use crate::ir::value_ops::{ChangeOrDeoptKind, MinusZeroMode};

        let seen = Arc::new(AtomicUsize::new(0));
        let mut stack = ReducerStack::new();
        stack.add_reducer(Box::new(Recorder { seen: seen.clone() }));

        let mut a = Assembler::new("order", LoweringConfig::default());
        let input = a.emit(Op::Parameter { index: 0, rep: Rep::Word64 });
        let frame_state = a.emit(Op::FrameState { id: 0 });
        let before = a.graph().op_count();
        stack.reduce(
            &Op::ChangeOrDeopt {
                input,
                frame_state,
                kind: ChangeOrDeoptKind::Int64ToInt32,
                minus_zero: MinusZeroMode::DontCheckForMinusZero,
                feedback: FeedbackSource::none(),
            },
            &mut a,
        );
        assert!(a.graph().op_count() > before);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
