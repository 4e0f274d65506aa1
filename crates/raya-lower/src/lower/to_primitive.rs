//! Unboxing tagged objects into raw machine values
//!
//! The non-deopting form trusts the shape an earlier pass proved. The
//! deopting form checks the shape and leaves compiled code when it does not
//! hold, so the fast path never reads a field of an object of the wrong
//! shape.

use super::bind_value;
use super::change::{float64_to_int32_or_deopt, float64_to_int64_or_deopt};
use crate::asm::Assembler;
use crate::ir::instr::{DeoptimizeReason, ExternalRef, FeedbackSource};
use crate::ir::types::{BranchHint, Rep};
use crate::ir::value_ops::{
    DeoptObjectKind, DeoptPrimitiveKind, MinusZeroMode, ToPrimitiveAssumptions, ToPrimitiveKind,
};
use crate::ir::OpIndex;
use crate::layout::{instance_type, FieldAccess, RootIndex, MAX_SAFE_INTEGER};

// ============================================================================
// Non-deopting
// ============================================================================

pub(super) fn lower_convert_object_to_primitive(
    asm: &mut Assembler,
    object: OpIndex,
    kind: ToPrimitiveKind,
    assumptions: ToPrimitiveAssumptions,
) -> OpIndex {
    match (kind, assumptions) {
        (ToPrimitiveKind::Bit, ToPrimitiveAssumptions::Object) => {
            let true_value = asm.heap_constant(RootIndex::TrueValue);
            asm.tagged_equal(object, true_value)
        }
        (ToPrimitiveKind::Int32 | ToPrimitiveKind::Uint32, ToPrimitiveAssumptions::Smi) => {
            asm.smi_untag(object)
        }
        (ToPrimitiveKind::Int64, ToPrimitiveAssumptions::Smi) => {
            let untagged = asm.smi_untag(object);
            asm.change_int32_to_int64(untagged)
        }
        (_, ToPrimitiveAssumptions::NumberOrOddball) if kind != ToPrimitiveKind::Bit => {
            let mut done = asm.new_label(&[kind.output_rep()]);
            let is_smi = asm.is_smi(object);
            asm.if_(is_smi, BranchHint::True);
            {
                let mut untagged = asm.smi_untag(object);
                if kind == ToPrimitiveKind::Int64 {
                    untagged = asm.change_int32_to_int64(untagged);
                }
                asm.goto_label(&mut done, &[untagged]);
            }
            asm.else_();
            {
                // Oddballs keep their numeric value at the heap number offset.
                let value = asm.load_field(object, FieldAccess::heap_number_value());
                let truncated = match kind {
                    ToPrimitiveKind::Int32 => asm.truncate_float64_to_int32_overflow_undefined(value),
                    ToPrimitiveKind::Int64 => asm.truncate_float64_to_int64_overflow_undefined(value),
                    _ => asm.truncate_float64_to_uint32_overflow_undefined(value),
                };
                asm.goto_label(&mut done, &[truncated]);
            }
            asm.end_if();
            bind_value(asm, &mut done)
        }
        _ => panic!("no conversion to {} assuming {}", kind, assumptions),
    }
}

// ============================================================================
// Deopting
// ============================================================================

pub(super) fn lower_convert_object_to_primitive_or_deopt(
    asm: &mut Assembler,
    object: OpIndex,
    frame_state: OpIndex,
    from: DeoptObjectKind,
    to: DeoptPrimitiveKind,
    minus_zero: MinusZeroMode,
    feedback: FeedbackSource,
) -> OpIndex {
    match (to, from) {
        (DeoptPrimitiveKind::ArrayIndex, DeoptObjectKind::NumberOrString) => {
            array_index(asm, object, frame_state, feedback)
        }
        (DeoptPrimitiveKind::ArrayIndex, _) | (_, DeoptObjectKind::NumberOrString) => {
            panic!("no deopting conversion from {} to {}", from, to)
        }
        (_, DeoptObjectKind::Smi) => {
            let is_smi = asm.is_smi(object);
            asm.deoptimize_if_not(is_smi, frame_state, DeoptimizeReason::NotASmi, feedback);
            let untagged = asm.smi_untag(object);
            match to {
                DeoptPrimitiveKind::Int32 => untagged,
                DeoptPrimitiveKind::Int64 => asm.change_int32_to_int64(untagged),
                _ => asm.change_int32_to_float64(untagged),
            }
        }
        _ => {
            let mut done = asm.new_label(&[to.output_rep()]);
            let is_smi = asm.is_smi(object);
            asm.if_(is_smi, BranchHint::True);
            {
                let untagged = asm.smi_untag(object);
                let value = match to {
                    DeoptPrimitiveKind::Int32 => untagged,
                    DeoptPrimitiveKind::Int64 => asm.change_int32_to_int64(untagged),
                    _ => asm.change_int32_to_float64(untagged),
                };
                asm.goto_label(&mut done, &[value]);
            }
            asm.else_();
            {
                let number = heap_object_to_float64_or_deopt(asm, object, from, frame_state, feedback);
                let value = match to {
                    DeoptPrimitiveKind::Int32 => {
                        float64_to_int32_or_deopt(asm, number, frame_state, minus_zero, feedback)
                    }
                    DeoptPrimitiveKind::Int64 => {
                        float64_to_int64_or_deopt(asm, number, frame_state, minus_zero, feedback)
                    }
                    _ => number,
                };
                asm.goto_label(&mut done, &[value]);
            }
            asm.end_if();
            bind_value(asm, &mut done)
        }
    }
}

/// Numeric value of a heap object that must be a heap number (or, when
/// `from` allows it, a boolean or any oddball)
fn heap_object_to_float64_or_deopt(
    asm: &mut Assembler,
    object: OpIndex,
    from: DeoptObjectKind,
    frame_state: OpIndex,
    feedback: FeedbackSource,
) -> OpIndex {
    let map = asm.load_map(object);
    let heap_number_map = asm.heap_constant(RootIndex::HeapNumberMap);
    let is_number = asm.tagged_equal(map, heap_number_map);

    match from {
        DeoptObjectKind::Number => {
            asm.deoptimize_if_not(is_number, frame_state, DeoptimizeReason::NotAHeapNumber, feedback);
        }
        DeoptObjectKind::NumberOrBoolean => {
            asm.if_not(is_number, BranchHint::False);
            {
                let boolean_map = asm.heap_constant(RootIndex::BooleanMap);
                let is_boolean = asm.tagged_equal(map, boolean_map);
                asm.deoptimize_if_not(
                    is_boolean,
                    frame_state,
                    DeoptimizeReason::NotANumberOrBoolean,
                    feedback,
                );
            }
            asm.end_if();
        }
        DeoptObjectKind::NumberOrOddball => {
            asm.if_not(is_number, BranchHint::False);
            {
                let ty = asm.load_instance_type(map);
                let is_oddball = asm.word32_equal_constant(ty, instance_type::ODDBALL_TYPE);
                asm.deoptimize_if_not(
                    is_oddball,
                    frame_state,
                    DeoptimizeReason::NotANumberOrOddball,
                    feedback,
                );
            }
            asm.end_if();
        }
        DeoptObjectKind::Smi | DeoptObjectKind::NumberOrString => {
            panic!("{} has no heap number representation", from)
        }
    }
    asm.load_field(object, FieldAccess::heap_number_value())
}

/// Pointer-sized array index of a Smi, an integral heap number within the
/// safe integer range, or a string spelling an index
fn array_index(
    asm: &mut Assembler,
    object: OpIndex,
    frame_state: OpIndex,
    feedback: FeedbackSource,
) -> OpIndex {
    let mut done = asm.new_label(&[Rep::WORD_PTR]);

    let is_smi = asm.is_smi(object);
    asm.if_(is_smi, BranchHint::True);
    {
        let untagged = asm.smi_untag(object);
        let index = asm.change_int32_to_intptr(untagged);
        asm.goto_label(&mut done, &[index]);
    }
    asm.else_();
    {
        let map = asm.load_map(object);
        let heap_number_map = asm.heap_constant(RootIndex::HeapNumberMap);
        let is_number = asm.tagged_equal(map, heap_number_map);
        asm.if_(is_number, BranchHint::None);
        {
            let value = asm.load_field(object, FieldAccess::heap_number_value());
            let index = asm.truncate_float64_to_int64_overflow_undefined(value);
            let back = asm.change_int64_to_float64(index);
            let exact = asm.float64_equal(back, value);
            asm.deoptimize_if_not(exact, frame_state, DeoptimizeReason::LostPrecisionOrNaN, feedback);

            let max = asm.int64_constant(MAX_SAFE_INTEGER);
            let below_max = asm.int64_less_than(index, max);
            asm.deoptimize_if_not(below_max, frame_state, DeoptimizeReason::NotAnArrayIndex, feedback);
            let min = asm.int64_constant(-MAX_SAFE_INTEGER);
            let above_min = asm.int64_less_than(min, index);
            asm.deoptimize_if_not(above_min, frame_state, DeoptimizeReason::NotAnArrayIndex, feedback);

            asm.goto_label(&mut done, &[index]);
        }
        asm.else_();
        {
            let ty = asm.load_instance_type(map);
            let first_nonstring = asm.word32_constant(instance_type::FIRST_NONSTRING_TYPE);
            let is_string = asm.uint32_less_than(ty, first_nonstring);
            asm.deoptimize_if_not(is_string, frame_state, DeoptimizeReason::NotAString, feedback);

            let parsed = asm.call(ExternalRef::StringToArrayIndex, vec![object]);
            let index = asm.change_int32_to_intptr(parsed);
            let not_found = asm.int64_constant(-1);
            let failed = asm.word64_equal(index, not_found);
            asm.deoptimize_if(failed, frame_state, DeoptimizeReason::NotAnArrayIndex, feedback);

            asm.goto_label(&mut done, &[index]);
        }
        asm.end_if();
    }
    asm.end_if();
    bind_value(asm, &mut done)
}
