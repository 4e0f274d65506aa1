//! Object model layout
//!
//! Bit-exact description of the managed heap as seen by compiled code:
//! tagging scheme, per-shape field offsets, instance types, and map bits.
//! The layout targets 64-bit words with 8-byte tagged slots.
//!
//! ```text
//! tagged word
//! ┌───────────────────────────────────────────────┬───┐
//! │ payload                                       │ t │  t = 0: small integer (Smi)
//! └───────────────────────────────────────────────┴───┘  t = 1: heap pointer (address | 1)
//! ```

pub mod access;
pub mod roots;

pub use access::{ElementAccess, FieldAccess};
pub use roots::RootIndex;

// ============================================================================
// Tagging
// ============================================================================

/// Mask selecting the tag bit of a tagged word
pub const SMI_TAG_MASK: u32 = 0x1;
/// Tag value of a small integer
pub const SMI_TAG: u32 = 0x0;
/// Tag value of a heap object pointer
pub const HEAP_OBJECT_TAG: u64 = 0x1;

/// Size of one tagged slot in bytes
pub const TAGGED_SIZE: i32 = 8;
/// log2 of `TAGGED_SIZE`
pub const TAGGED_SIZE_LOG2: u8 = 3;
/// log2 of the size of an f64 element
pub const DOUBLE_SIZE_LOG2: u8 = 3;
/// Heap objects are aligned to this many bytes
pub const OBJECT_ALIGNMENT: i32 = 8;

/// Largest integer that can be represented exactly by an f64 (2^53 - 1)
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Round a byte size up to the object alignment
pub const fn object_size_align(size: i32) -> i32 {
    (size + OBJECT_ALIGNMENT - 1) & !(OBJECT_ALIGNMENT - 1)
}

// ============================================================================
// Instance types
// ============================================================================

/// Instance type constants stored in every map
pub mod instance_type {
    /// Strings occupy all types below this value
    pub const FIRST_NONSTRING_TYPE: u32 = 0x80;

    /// Bit distinguishing one-byte from two-byte string encodings
    pub const STRING_ENCODING_MASK: u32 = 0x08;
    /// Encoding tag of one-byte strings
    pub const ONE_BYTE_STRING_TAG: u32 = 0x08;
    /// Encoding tag of two-byte strings
    pub const TWO_BYTE_STRING_TAG: u32 = 0x00;
    /// Bits selecting the string representation
    pub const STRING_REPRESENTATION_MASK: u32 = 0x07;
    pub const SEQ_STRING_TAG: u32 = 0x00;
    pub const CONS_STRING_TAG: u32 = 0x01;

    pub const SEQ_TWO_BYTE_STRING_TYPE: u32 = SEQ_STRING_TAG | TWO_BYTE_STRING_TAG;
    pub const CONS_STRING_TYPE: u32 = CONS_STRING_TAG | TWO_BYTE_STRING_TAG;
    pub const SEQ_ONE_BYTE_STRING_TYPE: u32 = SEQ_STRING_TAG | ONE_BYTE_STRING_TAG;
    pub const CONS_ONE_BYTE_STRING_TYPE: u32 = CONS_STRING_TAG | ONE_BYTE_STRING_TAG;

    pub const SYMBOL_TYPE: u32 = 0x80;
    pub const HEAP_NUMBER_TYPE: u32 = 0x81;
    pub const BIGINT_TYPE: u32 = 0x82;
    pub const ODDBALL_TYPE: u32 = 0x83;
    pub const MAP_TYPE: u32 = 0x84;
    pub const FIXED_ARRAY_TYPE: u32 = 0x85;
    pub const FIXED_DOUBLE_ARRAY_TYPE: u32 = 0x86;

    // Receivers come last so that a single unsigned comparison against
    // FIRST_JS_RECEIVER_TYPE classifies them.
    pub const FIRST_JS_RECEIVER_TYPE: u32 = 0x100;
    pub const JS_OBJECT_TYPE: u32 = 0x100;
    pub const JS_ARRAY_TYPE: u32 = 0x101;
    pub const JS_TYPED_ARRAY_TYPE: u32 = 0x102;
    pub const JS_DATA_VIEW_TYPE: u32 = 0x103;
    pub const JS_FUNCTION_TYPE: u32 = 0x104;
    pub const LAST_JS_RECEIVER_TYPE: u32 = JS_FUNCTION_TYPE;
    pub const LAST_TYPE: u32 = LAST_JS_RECEIVER_TYPE;

    pub const FIRST_JS_ARRAY_BUFFER_VIEW_TYPE: u32 = JS_TYPED_ARRAY_TYPE;
    pub const LAST_JS_ARRAY_BUFFER_VIEW_TYPE: u32 = JS_DATA_VIEW_TYPE;
}

/// Behavior bits stored in a map's bit field
pub mod map_bits {
    pub const IS_CALLABLE: u32 = 1 << 1;
    pub const IS_UNDETECTABLE: u32 = 1 << 4;
    pub const IS_CONSTRUCTOR: u32 = 1 << 6;
}

// ============================================================================
// Field offsets (relative to the untagged object start)
// ============================================================================

/// Every heap object starts with its map
pub const MAP_OFFSET: i32 = 0;

pub mod map {
    pub const INSTANCE_TYPE_OFFSET: i32 = 8;
    pub const BIT_FIELD_OFFSET: i32 = 10;
    pub const SIZE: i32 = 16;
}

pub mod heap_number {
    pub const VALUE_OFFSET: i32 = 8;
    pub const SIZE: i32 = 16;
}

pub mod bigint {
    pub const BITFIELD_OFFSET: i32 = 8;
    pub const OPTIONAL_PADDING_OFFSET: i32 = 12;
    pub const DIGITS_OFFSET: i32 = 16;
    /// The padding word after the bitfield exists on this layout
    pub const HAS_OPTIONAL_PADDING: bool = true;

    pub const SIGN_SHIFT: u32 = 0;
    pub const SIGN_MASK: u32 = 1 << SIGN_SHIFT;
    pub const LENGTH_SHIFT: u32 = 1;
    pub const LENGTH_MASK: u32 = 0x3FFF_FFFF << LENGTH_SHIFT;

    /// Encode a bitfield from a digit count and a sign
    pub const fn encode_bitfield(length: u32, negative: bool) -> u32 {
        (length << LENGTH_SHIFT) | ((negative as u32) << SIGN_SHIFT)
    }

    /// Object size of a big-int with `digits` 64-bit digits
    pub const fn size_for(digits: i32) -> i32 {
        DIGITS_OFFSET + digits * 8
    }
}

pub mod string {
    pub const RAW_HASH_FIELD_OFFSET: i32 = 8;
    pub const LENGTH_OFFSET: i32 = 12;
    pub const SEQ_HEADER_SIZE: i32 = 16;
    /// Raw hash value of a string whose hash has not been computed yet
    pub const EMPTY_HASH_FIELD: u32 = 0x3;
    /// Largest code unit representable in a one-byte string
    pub const MAX_ONE_BYTE_CHAR_CODE: u32 = 0xFF;

    pub const CONS_FIRST_OFFSET: i32 = 16;
    pub const CONS_SECOND_OFFSET: i32 = 24;
    pub const CONS_SIZE: i32 = 32;

    pub const fn seq_one_byte_size_for(length: i32) -> i32 {
        super::object_size_align(SEQ_HEADER_SIZE + length)
    }

    pub const fn seq_two_byte_size_for(length: i32) -> i32 {
        super::object_size_align(SEQ_HEADER_SIZE + length * 2)
    }
}

pub mod fixed_array {
    pub const LENGTH_OFFSET: i32 = 8;
    pub const HEADER_SIZE: i32 = 16;
}

pub mod js_object {
    pub const PROPERTIES_OR_HASH_OFFSET: i32 = 8;
    pub const ELEMENTS_OFFSET: i32 = 16;
    pub const HEADER_SIZE: i32 = 24;
}

pub mod js_array {
    pub const LENGTH_OFFSET: i32 = 24;
    pub const SIZE: i32 = 32;
}

/// Bit pattern of the hole stored in double arrays
pub const HOLE_NAN_BITS: u64 = 0xFFF7_FFFF_FFF7_FFFF;

// ============================================================================
// UTF-16
// ============================================================================

/// Largest code point that fits in a single UTF-16 code unit
pub const MAX_UTF16_CODE_UNIT: u32 = 0xFFFF;
/// Added to `code_point >> 10` to produce the lead surrogate
pub const LEAD_SURROGATE_OFFSET: u32 = 0xD800 - (0x10000 >> 10);
pub const TRAIL_SURROGATE_BASE: u32 = 0xDC00;
pub const SURROGATE_PAYLOAD_MASK: u32 = 0x3FF;
