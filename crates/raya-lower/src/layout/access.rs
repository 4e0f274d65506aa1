//! Field and element access descriptors
//!
//! Each descriptor names a slot of a heap shape: its offset, its memory
//! representation, and the write barrier a store to it needs.

use super::{bigint, fixed_array, heap_number, js_array, js_object, map, string, MAP_OFFSET};
use super::{DOUBLE_SIZE_LOG2, TAGGED_SIZE_LOG2};
use crate::ir::types::{MemoryRep, WriteBarrier};

/// A fixed-offset field of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAccess {
    pub offset: i32,
    pub rep: MemoryRep,
    pub write_barrier: WriteBarrier,
}

impl FieldAccess {
    const fn new(offset: i32, rep: MemoryRep, write_barrier: WriteBarrier) -> Self {
        FieldAccess { offset, rep, write_barrier }
    }

    pub const fn map() -> Self {
        Self::new(MAP_OFFSET, MemoryRep::TaggedPointer, WriteBarrier::Map)
    }

    pub const fn map_instance_type() -> Self {
        Self::new(map::INSTANCE_TYPE_OFFSET, MemoryRep::Uint16, WriteBarrier::None)
    }

    pub const fn map_bit_field() -> Self {
        Self::new(map::BIT_FIELD_OFFSET, MemoryRep::Uint8, WriteBarrier::None)
    }

    /// The f64 payload of a heap number (and the numeric value of an oddball)
    pub const fn heap_number_value() -> Self {
        Self::new(heap_number::VALUE_OFFSET, MemoryRep::Float64, WriteBarrier::None)
    }

    pub const fn bigint_bitfield() -> Self {
        Self::new(bigint::BITFIELD_OFFSET, MemoryRep::Uint32, WriteBarrier::None)
    }

    pub const fn bigint_optional_padding() -> Self {
        Self::new(bigint::OPTIONAL_PADDING_OFFSET, MemoryRep::Uint32, WriteBarrier::None)
    }

    pub const fn bigint_least_significant_digit() -> Self {
        Self::new(bigint::DIGITS_OFFSET, MemoryRep::Uint64, WriteBarrier::None)
    }

    pub const fn name_raw_hash_field() -> Self {
        Self::new(string::RAW_HASH_FIELD_OFFSET, MemoryRep::Uint32, WriteBarrier::None)
    }

    pub const fn string_length() -> Self {
        Self::new(string::LENGTH_OFFSET, MemoryRep::Uint32, WriteBarrier::None)
    }

    pub const fn cons_string_first() -> Self {
        Self::new(string::CONS_FIRST_OFFSET, MemoryRep::TaggedPointer, WriteBarrier::Full)
    }

    pub const fn cons_string_second() -> Self {
        Self::new(string::CONS_SECOND_OFFSET, MemoryRep::TaggedPointer, WriteBarrier::Full)
    }

    pub const fn fixed_array_length() -> Self {
        Self::new(fixed_array::LENGTH_OFFSET, MemoryRep::TaggedSigned, WriteBarrier::None)
    }

    pub const fn js_object_properties() -> Self {
        Self::new(
            js_object::PROPERTIES_OR_HASH_OFFSET,
            MemoryRep::TaggedPointer,
            WriteBarrier::Full,
        )
    }

    pub const fn js_object_elements() -> Self {
        Self::new(js_object::ELEMENTS_OFFSET, MemoryRep::TaggedPointer, WriteBarrier::Full)
    }

    pub const fn js_array_length() -> Self {
        Self::new(js_array::LENGTH_OFFSET, MemoryRep::TaggedSigned, WriteBarrier::None)
    }
}

/// An indexed element of a variable-length heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementAccess {
    pub header_size: i32,
    pub rep: MemoryRep,
    pub element_size_log2: u8,
    pub write_barrier: WriteBarrier,
}

impl ElementAccess {
    pub const fn fixed_array_element() -> Self {
        ElementAccess {
            header_size: fixed_array::HEADER_SIZE,
            rep: MemoryRep::AnyTagged,
            element_size_log2: TAGGED_SIZE_LOG2,
            write_barrier: WriteBarrier::Full,
        }
    }

    pub const fn fixed_double_array_element() -> Self {
        ElementAccess {
            header_size: fixed_array::HEADER_SIZE,
            rep: MemoryRep::Float64,
            element_size_log2: DOUBLE_SIZE_LOG2,
            write_barrier: WriteBarrier::None,
        }
    }

    /// Same element with the write barrier elided (stores into fresh objects)
    pub const fn without_barrier(self) -> Self {
        ElementAccess { write_barrier: WriteBarrier::None, ..self }
    }
}
