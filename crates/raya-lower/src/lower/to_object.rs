//! Boxing raw machine values into tagged objects

use super::bind_value;
use super::change::sign_bit_set;
use crate::asm::Assembler;
use crate::ir::types::{BranchHint, Rep};
use crate::ir::value_ops::{ConvertToObjectKind, InputInterpretation, MinusZeroMode};
use crate::ir::OpIndex;
use crate::layout::{
    bigint, string, ElementAccess, RootIndex, LEAD_SURROGATE_OFFSET, MAX_UTF16_CODE_UNIT,
    SURROGATE_PAYLOAD_MASK, TRAIL_SURROGATE_BASE,
};

pub(super) fn lower_convert_to_object(
    asm: &mut Assembler,
    input: OpIndex,
    kind: ConvertToObjectKind,
    input_rep: Rep,
    interpretation: InputInterpretation,
    minus_zero: MinusZeroMode,
) -> OpIndex {
    debug_assert_eq!(asm.rep_of(input), input_rep, "convert_to_object input");
    match kind {
        ConvertToObjectKind::BigInt => big_int(asm, input, interpretation),
        ConvertToObjectKind::Number => match input_rep {
            Rep::Word32 => word32_to_number(asm, input, interpretation),
            Rep::Word64 => word64_to_number(asm, input, interpretation),
            Rep::Float64 => convert_float64_to_number(asm, input, minus_zero),
            other => panic!("cannot convert {} to a number", other),
        },
        ConvertToObjectKind::HeapNumber => asm.allocate_heap_number(input),
        ConvertToObjectKind::Smi => match input_rep {
            Rep::Word32 => asm.smi_tag(input),
            Rep::Word64 => asm.smi_tag_word64(input),
            other => panic!("cannot tag {} as a Smi", other),
        },
        ConvertToObjectKind::Boolean => {
            let mut done = asm.new_label(&[Rep::Tagged]);
            let true_value = asm.heap_constant(RootIndex::TrueValue);
            asm.goto_if(input, &mut done, &[true_value], BranchHint::None);
            let false_value = asm.heap_constant(RootIndex::FalseValue);
            asm.goto_label(&mut done, &[false_value]);
            bind_value(asm, &mut done)
        }
        ConvertToObjectKind::String => string_from_code(asm, input, interpretation),
    }
}

/// Tag `value` as a Smi when it is integral, in range and (if asked) not
/// -0.0; box it in a heap number otherwise
pub(super) fn convert_float64_to_number(
    asm: &mut Assembler,
    value: OpIndex,
    minus_zero: MinusZeroMode,
) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Tagged]);
    let mut outside_smi = asm.new_label(&[]);

    let narrow = asm.truncate_float64_to_int32_overflow_undefined(value);
    let back = asm.change_int32_to_float64(narrow);
    let exact = asm.float64_equal(back, value);
    asm.goto_if_not(exact, &mut outside_smi, &[], BranchHint::False);

    if minus_zero == MinusZeroMode::CheckForMinusZero {
        let is_zero = asm.word32_equal_constant(narrow, 0);
        asm.if_(is_zero, BranchHint::False);
        {
            let negative = sign_bit_set(asm, value);
            asm.goto_if(negative, &mut outside_smi, &[], BranchHint::False);
        }
        asm.end_if();
    }

    let tagged = asm.smi_tag_or_overflow(narrow, &mut outside_smi);
    asm.goto_label(&mut done, &[tagged]);

    if asm.bind_label(&mut outside_smi).is_some() {
        let boxed = asm.allocate_heap_number(value);
        asm.goto_label(&mut done, &[boxed]);
    }
    bind_value(asm, &mut done)
}

/// Box a 64-bit integer as a big-int with at most one digit
fn big_int(asm: &mut Assembler, input: OpIndex, interpretation: InputInterpretation) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Tagged]);

    let zero = asm.word64_constant(0);
    let is_zero = asm.word64_equal(input, zero);
    asm.if_(is_zero, BranchHint::False);
    {
        let canonical_zero = asm.allocate_big_int(None);
        asm.goto_label(&mut done, &[canonical_zero]);
    }
    asm.end_if();

    let one_digit = asm.word32_constant(bigint::encode_bitfield(1, false));
    let (bitfield, digit) = match interpretation {
        InputInterpretation::Signed => {
            // The sign bit lands in bit 0 of the bitfield.
            let sixty_three = asm.word64_constant(63);
            let sign_word = asm.word64_shift_right_logical(input, sixty_three);
            let sign = asm.truncate_word64_to_word32(sign_word);
            let bitfield = asm.word32_bitwise_or(one_digit, sign);

            // Branchless |input|: all-ones mask for negatives, zero otherwise.
            let mask = asm.word64_shift_right_arithmetic(input, sixty_three);
            let flipped = asm.word64_bitwise_xor(input, mask);
            let magnitude = asm.word64_sub(flipped, mask);
            (bitfield, magnitude)
        }
        InputInterpretation::Unsigned => (one_digit, input),
        other => panic!("big-int from {} input", other),
    };
    let result = asm.allocate_big_int(Some((bitfield, digit)));
    asm.goto_label(&mut done, &[result]);
    bind_value(asm, &mut done)
}

fn word32_to_number(asm: &mut Assembler, input: OpIndex, interpretation: InputInterpretation) -> OpIndex {
    match interpretation {
        InputInterpretation::Signed => {
            if !asm.config().smi_is_31_bit() {
                return asm.smi_tag(input);
            }
            let mut done = asm.new_label(&[Rep::Tagged]);
            let mut overflow = asm.new_label(&[]);
            let tagged = asm.smi_tag_or_overflow(input, &mut overflow);
            asm.goto_label(&mut done, &[tagged]);
            if asm.bind_label(&mut overflow).is_some() {
                let value = asm.change_int32_to_float64(input);
                let boxed = asm.allocate_heap_number(value);
                asm.goto_label(&mut done, &[boxed]);
            }
            bind_value(asm, &mut done)
        }
        InputInterpretation::Unsigned => {
            let mut done = asm.new_label(&[Rep::Tagged]);
            let max = asm.config().smi_max();
            let smi_max = asm.word32_constant(max as u32);
            let fits = asm.uint32_less_than_or_equal(input, smi_max);
            asm.if_(fits, BranchHint::True);
            {
                let tagged = asm.smi_tag(input);
                asm.goto_label(&mut done, &[tagged]);
            }
            asm.else_();
            {
                let value = asm.change_uint32_to_float64(input);
                let boxed = asm.allocate_heap_number(value);
                asm.goto_label(&mut done, &[boxed]);
            }
            asm.end_if();
            bind_value(asm, &mut done)
        }
        other => panic!("number from {} word32", other),
    }
}

fn word64_to_number(asm: &mut Assembler, input: OpIndex, interpretation: InputInterpretation) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Tagged]);
    let mut outside_smi = asm.new_label(&[]);

    let to_float: fn(&mut Assembler, OpIndex) -> OpIndex = match interpretation {
        InputInterpretation::Signed => {
            let narrow = asm.truncate_word64_to_word32(input);
            let widened = asm.change_int32_to_int64(narrow);
            let fits_int32 = asm.word64_equal(widened, input);
            asm.goto_if_not(fits_int32, &mut outside_smi, &[], BranchHint::False);
            let tagged = asm.smi_tag_or_overflow(narrow, &mut outside_smi);
            asm.goto_label(&mut done, &[tagged]);
            Assembler::change_int64_to_float64
        }
        InputInterpretation::Unsigned => {
            let max = asm.config().smi_max();
            let smi_max = asm.word64_constant(max as u64);
            let fits = asm.uint64_less_than_or_equal(input, smi_max);
            asm.goto_if_not(fits, &mut outside_smi, &[], BranchHint::False);
            let tagged = asm.smi_tag_word64(input);
            asm.goto_label(&mut done, &[tagged]);
            Assembler::change_uint64_to_float64
        }
        other => panic!("number from {} word64", other),
    };

    if asm.bind_label(&mut outside_smi).is_some() {
        let value = to_float(asm, input);
        let boxed = asm.allocate_heap_number(value);
        asm.goto_label(&mut done, &[boxed]);
    }
    bind_value(asm, &mut done)
}

/// One-character string from a UTF-16 code unit or a code point (two units
/// for code points above the basic plane)
fn string_from_code(asm: &mut Assembler, input: OpIndex, interpretation: InputInterpretation) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Tagged]);

    let code = match interpretation {
        InputInterpretation::CharCode => {
            let mask = asm.word32_constant(MAX_UTF16_CODE_UNIT);
            asm.word32_bitwise_and(input, mask)
        }
        InputInterpretation::CodePoint => {
            let mut single_code = asm.new_label(&[Rep::Word32]);
            let max_unit = asm.word32_constant(MAX_UTF16_CODE_UNIT);
            let single = asm.uint32_less_than_or_equal(input, max_unit);
            asm.goto_if(single, &mut single_code, &[input], BranchHint::True);

            let ten = asm.word32_constant(10);
            let high = asm.word32_shift_right_logical(input, ten);
            let lead_offset = asm.word32_constant(LEAD_SURROGATE_OFFSET);
            let lead = asm.word32_add(high, lead_offset);
            let payload_mask = asm.word32_constant(SURROGATE_PAYLOAD_MASK);
            let low = asm.word32_bitwise_and(input, payload_mask);
            let trail_base = asm.word32_constant(TRAIL_SURROGATE_BASE);
            let trail = asm.word32_add(low, trail_base);

            // The lead unit comes first in memory.
            let sixteen = asm.word32_constant(16);
            let units = if asm.config().is_little_endian() {
                let upper = asm.word32_shift_left(trail, sixteen);
                asm.word32_bitwise_or(upper, lead)
            } else {
                let upper = asm.word32_shift_left(lead, sixteen);
                asm.word32_bitwise_or(upper, trail)
            };
            let pair = asm.allocate_two_byte_string(2, units);
            asm.goto_label(&mut done, &[pair]);

            bind_value(asm, &mut single_code)
        }
        other => panic!("string from {} input", other),
    };

    let max_one_byte = asm.word32_constant(string::MAX_ONE_BYTE_CHAR_CODE);
    let one_byte = asm.uint32_less_than_or_equal(code, max_one_byte);
    asm.if_(one_byte, BranchHint::True);
    {
        let table = asm.heap_constant(RootIndex::SingleCharacterStringTable);
        let index = asm.change_uint32_to_uint64(code);
        let cached = asm.load_element(table, ElementAccess::fixed_array_element(), index);
        asm.goto_label(&mut done, &[cached]);
    }
    asm.else_();
    {
        let fresh = asm.allocate_two_byte_string(1, code);
        asm.goto_label(&mut done, &[fresh]);
    }
    asm.end_if();
    bind_value(asm, &mut done)
}
