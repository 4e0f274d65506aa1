//! Allocation sequencer
//!
//! Every fresh object is built the same way: compute its exact size, request
//! raw storage with a generation hint, then initialize it with the map
//! first, length and hash metadata next, and payload last. Nothing reads the
//! object before its map is stored. Stores into the fresh object need no
//! write barrier.

use crate::asm::Assembler;
use crate::ir::types::{AllocationType, MemoryRep, WriteBarrier};
use crate::ir::value_ops::NewArrayKind;
use crate::ir::OpIndex;
use crate::layout::{bigint, fixed_array, heap_number, string, FieldAccess, RootIndex};
use crate::layout::{OBJECT_ALIGNMENT, TAGGED_SIZE_LOG2, DOUBLE_SIZE_LOG2};

impl Assembler {
    /// Raw storage for an object of a statically known size
    pub fn allocate_fixed_size(&mut self, size: i32, allocation: AllocationType) -> OpIndex {
        let size = self.intptr_constant(size as i64);
        self.allocate(size, allocation)
    }

    fn store_map(&mut self, object: OpIndex, map: RootIndex) {
        let map = self.heap_constant(map);
        self.init_field(object, FieldAccess::map(), map);
    }

    /// Box `value` in a fresh heap number
    pub fn allocate_heap_number(&mut self, value: OpIndex) -> OpIndex {
        let allocation = self.config().allocation;
        let result = self.allocate_fixed_size(heap_number::SIZE, allocation);
        self.store_map(result, RootIndex::HeapNumberMap);
        self.init_field(result, FieldAccess::heap_number_value(), value);
        result
    }

    /// Allocate a big-int with at most one digit. `None` builds the
    /// canonical zero: digit count 0 and no digit words.
    pub fn allocate_big_int(&mut self, digit: Option<(OpIndex, OpIndex)>) -> OpIndex {
        let digits = if digit.is_some() { 1 } else { 0 };
        let allocation = self.config().allocation;
        let result = self.allocate_fixed_size(bigint::size_for(digits), allocation);
        self.store_map(result, RootIndex::BigIntMap);

        let bitfield = match digit {
            Some((bitfield, _)) => bitfield,
            None => self.word32_constant(bigint::encode_bitfield(0, false)),
        };
        self.init_field(result, FieldAccess::bigint_bitfield(), bitfield);

        if bigint::HAS_OPTIONAL_PADDING {
            let zero = self.word32_constant(0);
            self.init_field(result, FieldAccess::bigint_optional_padding(), zero);
        }
        if let Some((_, digit)) = digit {
            self.init_field(result, FieldAccess::bigint_least_significant_digit(), digit);
        }
        result
    }

    /// Allocate a sequential two-byte string of `length` code units whose
    /// payload is the single `payload` word (u16 for one unit, u32 for two)
    pub fn allocate_two_byte_string(&mut self, length: u32, payload: OpIndex) -> OpIndex {
        let payload_rep = match length {
            1 => MemoryRep::Uint16,
            2 => MemoryRep::Uint32,
            _ => panic!("two-byte string of length {} needs a payload loop", length),
        };
        let size = string::seq_two_byte_size_for(length as i32);
        let allocation = self.config().allocation;
        let result = self.allocate_fixed_size(size, allocation);
        self.store_map(result, RootIndex::StringMap);
        let hash = self.word32_constant(string::EMPTY_HASH_FIELD);
        self.init_field(result, FieldAccess::name_raw_hash_field(), hash);
        let length = self.word32_constant(length);
        self.init_field(result, FieldAccess::string_length(), length);

        // The last word is partly padding; clear it before the payload
        // lands on top of it.
        let zero = self.word64_constant(0);
        self.store(
            result,
            None,
            zero,
            size - OBJECT_ALIGNMENT,
            0,
            MemoryRep::Uint64,
            WriteBarrier::None,
        );
        self.store(
            result,
            None,
            payload,
            string::SEQ_HEADER_SIZE,
            0,
            payload_rep,
            WriteBarrier::None,
        );
        result
    }

    /// Allocate a cons string node over `first` and `second`
    pub fn allocate_cons_string(
        &mut self,
        map: OpIndex,
        length: OpIndex,
        first: OpIndex,
        second: OpIndex,
    ) -> OpIndex {
        let allocation = self.config().allocation;
        let result = self.allocate_fixed_size(string::CONS_SIZE, allocation);
        self.init_field(result, FieldAccess::map(), map);
        let hash = self.word32_constant(string::EMPTY_HASH_FIELD);
        self.init_field(result, FieldAccess::name_raw_hash_field(), hash);
        self.init_field(result, FieldAccess::string_length(), length);
        self.init_field(result, FieldAccess::cons_string_first(), first);
        self.init_field(result, FieldAccess::cons_string_second(), second);
        result
    }

    /// Allocate a fixed (double) array of `length` elements and store its
    /// header. The elements are left uninitialized.
    pub fn allocate_fixed_array_header(
        &mut self,
        kind: NewArrayKind,
        length: OpIndex,
        allocation: AllocationType,
    ) -> OpIndex {
        let (size_log2, map) = match kind {
            NewArrayKind::Double => (DOUBLE_SIZE_LOG2, RootIndex::FixedDoubleArrayMap),
            NewArrayKind::Object => (TAGGED_SIZE_LOG2, RootIndex::FixedArrayMap),
        };
        let shift = self.word64_constant(size_log2 as u64);
        let body = self.word64_shift_left(length, shift);
        let header = self.intptr_constant(fixed_array::HEADER_SIZE as i64);
        let size = self.word64_add(body, header);

        let array = self.allocate(size, allocation);
        self.store_map(array, map);
        let tagged_length = self.smi_tag_word64(length);
        self.init_field(array, FieldAccess::fixed_array_length(), tagged_length);
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::instr::Op;
    use crate::ir::types::Rep;

    fn stores(a: &Assembler) -> Vec<(i32, MemoryRep)> {
        a.graph()
            .ops()
            .filter_map(|(_, op)| match op {
                Op::Store { offset, rep, .. } => Some((*offset, *rep)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_heap_number_stores_map_first() {
        let mut a = Assembler::new("box", LoweringConfig::default());
        let v = a.emit(Op::Parameter { index: 0, rep: Rep::Float64 });
        a.allocate_heap_number(v);
        assert_eq!(stores(&a), vec![(0, MemoryRep::TaggedPointer), (8, MemoryRep::Float64)]);
    }

    #[test]
    fn test_canonical_zero_big_int_has_no_digit() {
        let mut a = Assembler::new("zero", LoweringConfig::default());
        a.allocate_big_int(None);
        let sizes: Vec<_> = a
            .graph()
            .ops()
            .filter_map(|(_, op)| match op {
                Op::Constant(crate::ir::Constant::Word64(v)) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![bigint::size_for(0) as u64]);
        assert_eq!(
            stores(&a),
            vec![(0, MemoryRep::TaggedPointer), (8, MemoryRep::Uint32), (12, MemoryRep::Uint32)]
        );
    }

    #[test]
    fn test_two_byte_string_write_order() {
        let mut a = Assembler::new("str", LoweringConfig::default());
        let code = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        a.allocate_two_byte_string(1, code);
        assert_eq!(
            stores(&a),
            vec![
                (0, MemoryRep::TaggedPointer),
                (8, MemoryRep::Uint32),
                (12, MemoryRep::Uint32),
                (16, MemoryRep::Uint64),
                (16, MemoryRep::Uint16),
            ]
        );
    }
}
