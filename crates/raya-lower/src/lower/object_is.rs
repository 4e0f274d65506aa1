//! Runtime type predicates
//!
//! Every predicate produces a word32 boolean accumulated over early exits
//! into a single `done` label.

use super::bind_value;
use crate::asm::{Assembler, Label};
use crate::ir::types::{BranchHint, Rep};
use crate::ir::value_ops::{ObjectIsAssumptions, ObjectIsKind};
use crate::ir::OpIndex;
use crate::layout::{bigint, instance_type, map_bits, FieldAccess, RootIndex};

pub(super) fn lower_object_is(
    asm: &mut Assembler,
    input: OpIndex,
    kind: ObjectIsKind,
    assumptions: ObjectIsAssumptions,
) -> OpIndex {
    match kind {
        ObjectIsKind::Smi => {
            if !assumptions.needs_heap_object_check() {
                return asm.word32_constant(0);
            }
            asm.is_smi(input)
        }
        ObjectIsKind::BigInt | ObjectIsKind::BigInt64 => big_int(asm, input, kind, assumptions),
        ObjectIsKind::Callable
        | ObjectIsKind::Constructor
        | ObjectIsKind::DetectableCallable
        | ObjectIsKind::NonCallable
        | ObjectIsKind::Receiver
        | ObjectIsKind::Undetectable => map_bit_field(asm, input, kind, assumptions),
        ObjectIsKind::Number => {
            let mut done = asm.new_label(&[Rep::Word32]);
            if assumptions.needs_heap_object_check() {
                let is_smi = asm.is_smi(input);
                let one = asm.word32_constant(1);
                asm.goto_if(is_smi, &mut done, &[one], BranchHint::None);
            }
            let map = asm.load_map(input);
            let heap_number_map = asm.heap_constant(RootIndex::HeapNumberMap);
            let is_number = asm.tagged_equal(map, heap_number_map);
            asm.goto_label(&mut done, &[is_number]);
            bind_value(asm, &mut done)
        }
        ObjectIsKind::Symbol | ObjectIsKind::String | ObjectIsKind::ArrayBufferView => {
            let mut done = asm.new_label(&[Rep::Word32]);
            goto_if_smi(asm, input, assumptions, &mut done, 0);

            let map = asm.load_map(input);
            let ty = asm.load_instance_type(map);
            let check = match kind {
                ObjectIsKind::Symbol => asm.word32_equal_constant(ty, instance_type::SYMBOL_TYPE),
                ObjectIsKind::String => {
                    let first_nonstring = asm.word32_constant(instance_type::FIRST_NONSTRING_TYPE);
                    asm.uint32_less_than(ty, first_nonstring)
                }
                _ => {
                    // One unsigned comparison covers the contiguous range.
                    let first = asm.word32_constant(instance_type::FIRST_JS_ARRAY_BUFFER_VIEW_TYPE);
                    let offset = asm.word32_sub(ty, first);
                    let span = asm.word32_constant(
                        instance_type::LAST_JS_ARRAY_BUFFER_VIEW_TYPE
                            - instance_type::FIRST_JS_ARRAY_BUFFER_VIEW_TYPE
                            + 1,
                    );
                    asm.uint32_less_than(offset, span)
                }
            };
            asm.goto_label(&mut done, &[check]);
            bind_value(asm, &mut done)
        }
    }
}

fn goto_if_smi(
    asm: &mut Assembler,
    input: OpIndex,
    assumptions: ObjectIsAssumptions,
    done: &mut Label,
    result: u32,
) {
    if assumptions.needs_heap_object_check() {
        let is_smi = asm.is_smi(input);
        let value = asm.word32_constant(result);
        asm.goto_if(is_smi, done, &[value], BranchHint::None);
    }
}

fn big_int(
    asm: &mut Assembler,
    input: OpIndex,
    kind: ObjectIsKind,
    assumptions: ObjectIsAssumptions,
) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Word32]);

    if assumptions != ObjectIsAssumptions::BigInt {
        goto_if_smi(asm, input, assumptions, &mut done, 0);
        let map = asm.load_map(input);
        let bigint_map = asm.heap_constant(RootIndex::BigIntMap);
        let is_bigint = asm.tagged_equal(map, bigint_map);
        let zero = asm.word32_constant(0);
        asm.goto_if_not(is_bigint, &mut done, &[zero], BranchHint::None);
    }

    if kind == ObjectIsKind::BigInt {
        let one = asm.word32_constant(1);
        asm.goto_label(&mut done, &[one]);
        return bind_value(asm, &mut done);
    }

    // Canonical zero fits.
    let bitfield = asm.load_field(input, FieldAccess::bigint_bitfield());
    let is_zero = asm.word32_equal_constant(bitfield, 0);
    let one = asm.word32_constant(1);
    asm.goto_if(is_zero, &mut done, &[one], BranchHint::None);

    // Exactly one digit.
    let length_mask = asm.word32_constant(bigint::LENGTH_MASK);
    let length = asm.word32_bitwise_and(bitfield, length_mask);
    let single_digit = asm.word32_equal_constant(length, 1 << bigint::LENGTH_SHIFT);
    let zero = asm.word32_constant(0);
    asm.goto_if_not(single_digit, &mut done, &[zero], BranchHint::None);

    // A magnitude up to i64::MAX fits with either sign.
    let digit = asm.load_field(input, FieldAccess::bigint_least_significant_digit());
    let i64_max = asm.word64_constant(i64::MAX as u64);
    let small_magnitude = asm.uint64_less_than_or_equal(digit, i64_max);
    asm.goto_if(small_magnitude, &mut done, &[one], BranchHint::None);

    // Otherwise only -2^63 fits.
    let sign_mask = asm.word32_constant(bigint::SIGN_MASK);
    let sign = asm.word32_bitwise_and(bitfield, sign_mask);
    let negative = asm.word32_equal_constant(sign, bigint::SIGN_MASK);
    asm.goto_if_not(negative, &mut done, &[zero], BranchHint::None);

    let i64_min = asm.word64_constant(i64::MIN as u64);
    let is_min = asm.word64_equal(digit, i64_min);
    asm.goto_label(&mut done, &[is_min]);
    bind_value(asm, &mut done)
}

fn map_bit_field(
    asm: &mut Assembler,
    input: OpIndex,
    kind: ObjectIsKind,
    assumptions: ObjectIsAssumptions,
) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Word32]);
    goto_if_smi(asm, input, assumptions, &mut done, 0);

    let map = asm.load_map(input);
    let bit_field = asm.load_field(map, FieldAccess::map_bit_field());

    let bits_equal = |asm: &mut Assembler, mask: u32, expected: u32| {
        let mask = asm.word32_constant(mask);
        let masked = asm.word32_bitwise_and(bit_field, mask);
        asm.word32_equal_constant(masked, expected)
    };

    let check = match kind {
        ObjectIsKind::Callable => bits_equal(asm, map_bits::IS_CALLABLE, map_bits::IS_CALLABLE),
        ObjectIsKind::Constructor => {
            bits_equal(asm, map_bits::IS_CONSTRUCTOR, map_bits::IS_CONSTRUCTOR)
        }
        ObjectIsKind::DetectableCallable => bits_equal(
            asm,
            map_bits::IS_CALLABLE | map_bits::IS_UNDETECTABLE,
            map_bits::IS_CALLABLE,
        ),
        ObjectIsKind::Undetectable => {
            bits_equal(asm, map_bits::IS_UNDETECTABLE, map_bits::IS_UNDETECTABLE)
        }
        ObjectIsKind::NonCallable | ObjectIsKind::Receiver => {
            if kind == ObjectIsKind::NonCallable {
                // Not callable, then continue with the receiver check.
                let not_callable = bits_equal(asm, map_bits::IS_CALLABLE, 0);
                let zero = asm.word32_constant(0);
                asm.goto_if_not(not_callable, &mut done, &[zero], BranchHint::None);
            }
            // Receivers are the last instance types.
            let ty = asm.load_instance_type(map);
            let first_receiver = asm.word32_constant(instance_type::FIRST_JS_RECEIVER_TYPE);
            asm.uint32_less_than_or_equal(first_receiver, ty)
        }
        _ => unreachable!("{} is not a map bit predicate", kind),
    };
    asm.goto_label(&mut done, &[check]);
    bind_value(asm, &mut done)
}
