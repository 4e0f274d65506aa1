//! Deoptimizing narrowing conversions

use crate::asm::Assembler;
use crate::ir::instr::{DeoptimizeReason, FeedbackSource};
use crate::ir::types::BranchHint;
use crate::ir::value_ops::{ChangeOrDeoptKind, MinusZeroMode};
use crate::ir::OpIndex;

pub(super) fn lower_change_or_deopt(
    asm: &mut Assembler,
    input: OpIndex,
    frame_state: OpIndex,
    kind: ChangeOrDeoptKind,
    minus_zero: MinusZeroMode,
    feedback: FeedbackSource,
) -> OpIndex {
    match kind {
        ChangeOrDeoptKind::Uint32ToInt32 => {
            let zero = asm.int32_constant(0);
            let negative = asm.int32_less_than(input, zero);
            asm.deoptimize_if(negative, frame_state, DeoptimizeReason::LostPrecision, feedback);
            input
        }
        ChangeOrDeoptKind::Int64ToInt32 => {
            let narrow = asm.truncate_word64_to_word32(input);
            let widened = asm.change_int32_to_int64(narrow);
            let same = asm.word64_equal(widened, input);
            asm.deoptimize_if_not(same, frame_state, DeoptimizeReason::LostPrecision, feedback);
            narrow
        }
        ChangeOrDeoptKind::Uint64ToInt32 => {
            let max = asm.word64_constant(i32::MAX as u64);
            let fits = asm.uint64_less_than_or_equal(input, max);
            asm.deoptimize_if_not(fits, frame_state, DeoptimizeReason::LostPrecision, feedback);
            asm.truncate_word64_to_word32(input)
        }
        ChangeOrDeoptKind::Uint64ToInt64 => {
            let max = asm.word64_constant(i64::MAX as u64);
            let fits = asm.uint64_less_than_or_equal(input, max);
            asm.deoptimize_if_not(fits, frame_state, DeoptimizeReason::LostPrecision, feedback);
            input
        }
        ChangeOrDeoptKind::Float64ToInt32 => {
            float64_to_int32_or_deopt(asm, input, frame_state, minus_zero, feedback)
        }
        ChangeOrDeoptKind::Float64ToInt64 => {
            float64_to_int64_or_deopt(asm, input, frame_state, minus_zero, feedback)
        }
    }
}

/// Truncate `value` to i32, deoptimizing on NaN, fractions, out-of-range
/// values, and (when asked) -0.0
pub(super) fn float64_to_int32_or_deopt(
    asm: &mut Assembler,
    value: OpIndex,
    frame_state: OpIndex,
    minus_zero: MinusZeroMode,
    feedback: FeedbackSource,
) -> OpIndex {
    let narrow = asm.truncate_float64_to_int32_overflow_undefined(value);
    let back = asm.change_int32_to_float64(narrow);
    let exact = asm.float64_equal(back, value);
    asm.deoptimize_if_not(exact, frame_state, DeoptimizeReason::LostPrecisionOrNaN, feedback);

    if minus_zero == MinusZeroMode::CheckForMinusZero {
        let is_zero = asm.word32_equal_constant(narrow, 0);
        asm.if_(is_zero, BranchHint::False);
        {
            let negative = sign_bit_set(asm, value);
            asm.deoptimize_if(negative, frame_state, DeoptimizeReason::MinusZero, feedback);
        }
        asm.end_if();
    }
    narrow
}

/// Truncate `value` to i64, deoptimizing like [`float64_to_int32_or_deopt`]
pub(super) fn float64_to_int64_or_deopt(
    asm: &mut Assembler,
    value: OpIndex,
    frame_state: OpIndex,
    minus_zero: MinusZeroMode,
    feedback: FeedbackSource,
) -> OpIndex {
    let narrow = asm.truncate_float64_to_int64_overflow_undefined(value);
    let back = asm.change_int64_to_float64(narrow);
    let exact = asm.float64_equal(back, value);
    asm.deoptimize_if_not(exact, frame_state, DeoptimizeReason::LostPrecisionOrNaN, feedback);

    if minus_zero == MinusZeroMode::CheckForMinusZero {
        let zero = asm.word64_constant(0);
        let is_zero = asm.word64_equal(narrow, zero);
        asm.if_(is_zero, BranchHint::False);
        {
            let negative = sign_bit_set(asm, value);
            asm.deoptimize_if(negative, frame_state, DeoptimizeReason::MinusZero, feedback);
        }
        asm.end_if();
    }
    narrow
}

/// 1 when the IEEE-754 sign bit of `value` is set (tells -0.0 from 0.0)
pub(super) fn sign_bit_set(asm: &mut Assembler, value: OpIndex) -> OpIndex {
    let high = asm.float64_extract_high_word32(value);
    let zero = asm.int32_constant(0);
    asm.int32_less_than(high, zero)
}
