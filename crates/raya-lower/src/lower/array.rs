//! String concatenation nodes and array backing stores

use super::bind_value;
use super::to_object::convert_float64_to_number;
use crate::asm::Assembler;
use crate::ir::types::{AllocationType, BranchHint, Rep};
use crate::ir::value_ops::{MinMaxKind, MinusZeroMode, NewArrayKind};
use crate::ir::OpIndex;
use crate::layout::{instance_type, ElementAccess, FieldAccess, RootIndex};

/// Cons string over `first` and `second`. The node is one-byte only when
/// both halves are.
pub(super) fn lower_new_cons_string(
    asm: &mut Assembler,
    length: OpIndex,
    first: OpIndex,
    second: OpIndex,
) -> OpIndex {
    let first_map = asm.load_map(first);
    let first_type = asm.load_instance_type(first_map);
    let second_map = asm.load_map(second);
    let second_type = asm.load_instance_type(second_map);

    let both = asm.word32_bitwise_and(first_type, second_type);
    let encoding_mask = asm.word32_constant(instance_type::STRING_ENCODING_MASK);
    let encoding = asm.word32_bitwise_and(both, encoding_mask);
    let two_byte = asm.word32_equal_constant(encoding, instance_type::TWO_BYTE_STRING_TAG);

    let mut map_label = asm.new_label(&[Rep::Tagged]);
    let two_byte_map = asm.heap_constant(RootIndex::ConsStringMap);
    asm.goto_if(two_byte, &mut map_label, &[two_byte_map], BranchHint::None);
    let one_byte_map = asm.heap_constant(RootIndex::ConsOneByteStringMap);
    asm.goto_label(&mut map_label, &[one_byte_map]);
    let map = bind_value(asm, &mut map_label);

    asm.allocate_cons_string(map, length, first, second)
}

/// Fixed array of `length` holes; zero length yields the shared empty array
pub(super) fn lower_new_array(
    asm: &mut Assembler,
    length: OpIndex,
    kind: NewArrayKind,
    allocation: AllocationType,
) -> OpIndex {
    let mut done = asm.new_label(&[Rep::Tagged]);

    let zero = asm.intptr_constant(0);
    let is_empty = asm.word64_equal(length, zero);
    let empty = asm.heap_constant(RootIndex::EmptyFixedArray);
    asm.goto_if(is_empty, &mut done, &[empty], BranchHint::False);

    let array = asm.allocate_fixed_array_header(kind, length, allocation);
    let (hole, access) = match kind {
        NewArrayKind::Double => {
            // The hole oddball carries the hole NaN as its numeric value.
            let the_hole = asm.heap_constant(RootIndex::TheHoleValue);
            let hole = asm.load_field(the_hole, FieldAccess::heap_number_value());
            (hole, ElementAccess::fixed_double_array_element())
        }
        NewArrayKind::Object => {
            let hole = asm.heap_constant(RootIndex::TheHoleValue);
            (hole, ElementAccess::fixed_array_element().without_barrier())
        }
    };

    let mut fill = asm.new_loop_label(&[Rep::WORD_PTR]);
    asm.goto_label(&mut fill, &[zero]);
    let index = match asm.bind_label(&mut fill) {
        Some(values) => values[0],
        None => panic!("fill loop of a non-empty array is unreachable"),
    };
    {
        let in_bounds = asm.uint64_less_than(index, length);
        asm.goto_if_not(in_bounds, &mut done, &[array], BranchHint::False);
        asm.store_element(array, access, index, hole);
        let one = asm.intptr_constant(1);
        let next = asm.word64_add(index, one);
        asm.goto_label(&mut fill, &[next]);
    }

    bind_value(asm, &mut done)
}

/// Minimum or maximum over the elements of a packed double array, as a
/// Number
pub(super) fn lower_double_array_min_max(asm: &mut Assembler, array: OpIndex, kind: MinMaxKind) -> OpIndex {
    let tagged_length = asm.load_field(array, FieldAccess::js_array_length());
    let untagged_length = asm.smi_untag(tagged_length);
    let length = asm.change_int32_to_intptr(untagged_length);
    let elements = asm.load_field(array, FieldAccess::js_object_elements());

    let initial = match kind {
        MinMaxKind::Min => asm.float64_constant(f64::INFINITY),
        MinMaxKind::Max => asm.float64_constant(f64::NEG_INFINITY),
    };
    let zero = asm.intptr_constant(0);

    let mut done = asm.new_label(&[Rep::Float64]);
    let mut scan = asm.new_loop_label(&[Rep::WORD_PTR, Rep::Float64]);
    asm.goto_label(&mut scan, &[zero, initial]);
    let (index, accumulator) = match asm.bind_label(&mut scan).as_deref() {
        Some(&[index, accumulator]) => (index, accumulator),
        _ => panic!("min/max scan loop is unreachable"),
    };
    {
        let in_bounds = asm.uint64_less_than(index, length);
        asm.goto_if_not(in_bounds, &mut done, &[accumulator], BranchHint::False);
        let element = asm.load_element(elements, ElementAccess::fixed_double_array_element(), index);
        let folded = match kind {
            MinMaxKind::Min => asm.float64_min(accumulator, element),
            MinMaxKind::Max => asm.float64_max(accumulator, element),
        };
        let one = asm.intptr_constant(1);
        let next = asm.word64_add(index, one);
        asm.goto_label(&mut scan, &[next, folded]);
    }

    let result = bind_value(asm, &mut done);
    convert_float64_to_number(asm, result, MinusZeroMode::CheckForMinusZero)
}
