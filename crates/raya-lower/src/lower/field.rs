//! Property load by encoded field index
//!
//! The field index word packs three facts:
//!
//! ```text
//! bit 0      1 = the slot holds a boxed double
//! bits 1..   slot number; negative slots live in the out-of-object
//!            property array, -1 being its first element
//! ```
//!
//! For tagged fields the index is used as is, scaled by half a slot, so the
//! flag bit costs no extra shift.

use super::bind_value;
use crate::asm::Assembler;
use crate::ir::types::{BranchHint, MemoryRep, Rep};
use crate::ir::OpIndex;
use crate::layout::{fixed_array, js_object, FieldAccess, RootIndex, TAGGED_SIZE, TAGGED_SIZE_LOG2};

pub(super) fn lower_load_field_by_index(asm: &mut Assembler, object: OpIndex, field_index: OpIndex) -> OpIndex {
    let index = asm.change_int32_to_intptr(field_index);
    let mut done = asm.new_label(&[Rep::Tagged]);
    let mut double_field = asm.new_label(&[]);

    let one = asm.intptr_constant(1);
    let flag = asm.word64_bitwise_and(index, one);
    let is_double = asm.word64_equal(flag, one);
    asm.goto_if(is_double, &mut double_field, &[], BranchHint::False);

    let field = load_slot(asm, object, index, TAGGED_SIZE_LOG2 - 1);
    asm.goto_label(&mut done, &[field]);

    if asm.bind_label(&mut double_field).is_some() {
        let slot = asm.word64_shift_right_arithmetic(index, one);
        let field = load_slot(asm, object, slot, TAGGED_SIZE_LOG2);

        // Unboxed-double slots may still hold a Smi or a non-number.
        let is_smi = asm.is_smi(field);
        asm.goto_if(is_smi, &mut done, &[field], BranchHint::False);
        let map = asm.load_map(field);
        let heap_number_map = asm.heap_constant(RootIndex::HeapNumberMap);
        let is_number = asm.tagged_equal(map, heap_number_map);
        asm.goto_if_not(is_number, &mut done, &[field], BranchHint::False);

        // Always a fresh box: the stored one is mutated in place.
        let value = asm.load_field(field, FieldAccess::heap_number_value());
        let boxed = asm.allocate_heap_number(value);
        asm.goto_label(&mut done, &[boxed]);
    }
    bind_value(asm, &mut done)
}

/// Load the tagged slot `slot << scale_log2` bytes into the object (slot
/// >= 0) or into its property array (slot < 0)
fn load_slot(asm: &mut Assembler, object: OpIndex, slot: OpIndex, scale_log2: u8) -> OpIndex {
    let mut loaded = asm.new_label(&[Rep::Tagged]);
    let zero = asm.intptr_constant(0);
    let out_of_object = asm.int64_less_than(slot, zero);
    asm.if_(out_of_object, BranchHint::None);
    {
        let properties = asm.load_field(object, FieldAccess::js_object_properties());
        let negated = asm.word64_sub(zero, slot);
        // Slot -1 is element 0.
        let field = asm.load(
            properties,
            Some(negated),
            fixed_array::HEADER_SIZE - TAGGED_SIZE,
            scale_log2,
            MemoryRep::AnyTagged,
        );
        asm.goto_label(&mut loaded, &[field]);
    }
    asm.else_();
    {
        let field = asm.load(object, Some(slot), js_object::HEADER_SIZE, scale_log2, MemoryRep::AnyTagged);
        asm.goto_label(&mut loaded, &[field]);
    }
    asm.end_if();
    bind_value(asm, &mut loaded)
}
