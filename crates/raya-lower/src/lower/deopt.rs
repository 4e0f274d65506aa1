//! Deoptimization guards
//!
//! A guard is a conditional exit to the slow tier carrying a reason code,
//! a feedback token, and the frame state to resume from. The fast path
//! continues in the same block with no extra work.

use crate::asm::Assembler;
use crate::ir::instr::{DeoptimizeParameters, DeoptimizeReason, FeedbackSource, Op};
use crate::ir::OpIndex;

impl Assembler {
    /// Leave compiled code when `condition` is non-zero
    pub fn deoptimize_if(
        &mut self,
        condition: OpIndex,
        frame_state: OpIndex,
        reason: DeoptimizeReason,
        feedback: FeedbackSource,
    ) {
        self.emit_guard(condition, false, frame_state, reason, feedback);
    }

    /// Leave compiled code when `condition` is zero
    pub fn deoptimize_if_not(
        &mut self,
        condition: OpIndex,
        frame_state: OpIndex,
        reason: DeoptimizeReason,
        feedback: FeedbackSource,
    ) {
        self.emit_guard(condition, true, frame_state, reason, feedback);
    }

    fn emit_guard(
        &mut self,
        condition: OpIndex,
        negated: bool,
        frame_state: OpIndex,
        reason: DeoptimizeReason,
        feedback: FeedbackSource,
    ) {
        assert!(
            matches!(self.graph().op(frame_state), Op::FrameState { .. }),
            "guard on {} needs a frame state, got {}",
            condition,
            self.graph().op(frame_state)
        );
        self.emit(Op::DeoptimizeIf {
            condition,
            negated,
            frame_state,
            parameters: DeoptimizeParameters { reason, feedback },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::types::Rep;

    #[test]
    fn test_guard_keeps_block_open() {
        let mut a = Assembler::new("guard", LoweringConfig::default());
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        let fs = a.emit(Op::FrameState { id: 3 });
        a.deoptimize_if_not(p, fs, DeoptimizeReason::NotASmi, FeedbackSource(Some(9)));
        assert!(a.is_reachable());
        assert_eq!(
            a.graph().op(crate::ir::OpIndex(2)),
            &Op::DeoptimizeIf {
                condition: p,
                negated: true,
                frame_state: fs,
                parameters: DeoptimizeParameters {
                    reason: DeoptimizeReason::NotASmi,
                    feedback: FeedbackSource(Some(9)),
                },
            }
        );
    }

    #[test]
    #[should_panic(expected = "needs a frame state")]
    fn test_guard_without_frame_state_panics() {
        let mut a = Assembler::new("guard", LoweringConfig::default());
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        a.deoptimize_if(p, p, DeoptimizeReason::MinusZero, FeedbackSource::none());
    }
}
