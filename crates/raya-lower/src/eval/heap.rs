//! Simulated managed heap
//!
//! A bump-allocated byte arena laid out exactly as compiled code expects:
//! tagged pointers are `address | 1`, every object starts with its map, and
//! multi-byte fields use the configured byte order. Fresh allocations are
//! filled with a poison byte so reads of uninitialized fields stand out.
//!
//! The canonical roots (maps, oddballs, the empty fixed array and the
//! single-character string table) are created up front.

use crate::config::{LoweringConfig, SmiWidth};
use crate::ir::AllocationType;
use crate::layout::{
    bigint, fixed_array, heap_number, instance_type, js_array, js_object, map, map_bits, string,
    RootIndex, HEAP_OBJECT_TAG, HOLE_NAN_BITS, MAP_OFFSET, OBJECT_ALIGNMENT, SMI_TAG,
    SMI_TAG_MASK, TAGGED_SIZE,
};

use super::EvalError;

/// Address of the first heap byte
pub const HEAP_BASE: u64 = 0x10_0000;
/// Fill byte of freshly allocated storage
pub const POISON_BYTE: u8 = 0xCD;
/// Largest arena the simulator will grow to
pub const MAX_HEAP_SIZE: usize = 64 << 20;

/// One allocation made by compiled code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Tagged pointer to the object
    pub object: u64,
    pub size: u64,
    pub allocation: AllocationType,
}

pub struct SimHeap {
    memory: Vec<u8>,
    little_endian: bool,
    smi_width: SmiWidth,
    roots: [u64; RootIndex::ALL.len()],
    allocations: Vec<AllocationRecord>,
}

macro_rules! accessors {
    ($($read:ident, $write:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $read(&self, address: u64) -> Result<$ty, EvalError> {
                let bytes = self.bytes(address, std::mem::size_of::<$ty>())?;
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                Ok(if self.little_endian { <$ty>::from_le_bytes(raw) } else { <$ty>::from_be_bytes(raw) })
            }

            pub fn $write(&mut self, address: u64, value: $ty) -> Result<(), EvalError> {
                let raw = if self.little_endian { value.to_le_bytes() } else { value.to_be_bytes() };
                self.bytes_mut(address, raw.len())?.copy_from_slice(&raw);
                Ok(())
            }
        )*
    };
}

impl SimHeap {
    /// Create a heap holding the canonical roots
    pub fn new(config: &LoweringConfig) -> Result<Self, EvalError> {
        let mut heap = SimHeap {
            memory: Vec::new(),
            little_endian: config.is_little_endian(),
            smi_width: config.smi_width,
            roots: [0; RootIndex::ALL.len()],
            allocations: Vec::new(),
        };
        heap.create_roots()?;
        // Root setup is not part of any run.
        heap.allocations.clear();
        Ok(heap)
    }

    // ===== Raw memory =====

    fn bytes(&self, address: u64, len: usize) -> Result<&[u8], EvalError> {
        let start = self.offset_of(address, len)?;
        Ok(&self.memory[start..start + len])
    }

    fn bytes_mut(&mut self, address: u64, len: usize) -> Result<&mut [u8], EvalError> {
        let start = self.offset_of(address, len)?;
        Ok(&mut self.memory[start..start + len])
    }

    fn offset_of(&self, address: u64, len: usize) -> Result<usize, EvalError> {
        let out_of_bounds = EvalError::OutOfBounds { address, size: len };
        let Some(offset) = address.checked_sub(HEAP_BASE) else {
            return Err(out_of_bounds);
        };
        let offset = usize::try_from(offset).map_err(|_| out_of_bounds.clone())?;
        match offset.checked_add(len) {
            Some(end) if end <= self.memory.len() => Ok(offset),
            _ => Err(out_of_bounds),
        }
    }

    accessors! {
        read_u8, write_u8 => u8,
        read_u16, write_u16 => u16,
        read_u32, write_u32 => u32,
        read_u64, write_u64 => u64,
    }

    pub fn read_f64(&self, address: u64) -> Result<f64, EvalError> {
        Ok(f64::from_bits(self.read_u64(address)?))
    }

    pub fn write_f64(&mut self, address: u64, value: f64) -> Result<(), EvalError> {
        self.write_u64(address, value.to_bits())
    }

    /// Bytes in use
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Reserve `size` bytes of poisoned storage; returns a tagged pointer
    pub fn allocate(&mut self, size: u64, allocation: AllocationType) -> Result<u64, EvalError> {
        let aligned = (size + OBJECT_ALIGNMENT as u64 - 1) & !(OBJECT_ALIGNMENT as u64 - 1);
        let start = self.memory.len();
        let new_len = usize::try_from(aligned)
            .ok()
            .and_then(|aligned| start.checked_add(aligned))
            .filter(|&len| len <= MAX_HEAP_SIZE)
            .ok_or(EvalError::OutOfMemory { requested: size })?;
        self.memory.resize(new_len, POISON_BYTE);

        let object = (HEAP_BASE + start as u64) | HEAP_OBJECT_TAG;
        self.allocations.push(AllocationRecord { object, size, allocation });
        Ok(object)
    }

    /// Allocations made since the heap was created (roots excluded)
    pub fn allocations(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    // ===== Tagged fields =====

    fn untag(object: u64) -> Result<u64, EvalError> {
        if object & HEAP_OBJECT_TAG == 0 {
            return Err(EvalError::NotAHeapObject(object));
        }
        Ok(object - HEAP_OBJECT_TAG)
    }

    fn field_address(object: u64, offset: i32) -> Result<u64, EvalError> {
        Ok(Self::untag(object)?.wrapping_add(offset as i64 as u64))
    }

    pub fn read_tagged_field(&self, object: u64, offset: i32) -> Result<u64, EvalError> {
        self.read_u64(Self::field_address(object, offset)?)
    }

    pub fn write_tagged_field(&mut self, object: u64, offset: i32, value: u64) -> Result<(), EvalError> {
        self.write_u64(Self::field_address(object, offset)?, value)
    }

    pub fn read_u32_field(&self, object: u64, offset: i32) -> Result<u32, EvalError> {
        self.read_u32(Self::field_address(object, offset)?)
    }

    fn write_u32_field(&mut self, object: u64, offset: i32, value: u32) -> Result<(), EvalError> {
        self.write_u32(Self::field_address(object, offset)?, value)
    }

    pub fn read_f64_field(&self, object: u64, offset: i32) -> Result<f64, EvalError> {
        self.read_f64(Self::field_address(object, offset)?)
    }

    fn write_f64_field(&mut self, object: u64, offset: i32, value: f64) -> Result<(), EvalError> {
        self.write_f64(Self::field_address(object, offset)?, value)
    }

    // ===== Smis =====

    /// Tagged word of a small integer
    pub fn smi(&self, value: i32) -> u64 {
        ((value as i64) << self.smi_width.shift()) as u64
    }

    pub fn is_smi(word: u64) -> bool {
        (word as u32) & SMI_TAG_MASK == SMI_TAG
    }

    /// Payload of a Smi word
    pub fn smi_value(&self, word: u64) -> Option<i32> {
        if !Self::is_smi(word) {
            return None;
        }
        Some(match self.smi_width {
            SmiWidth::Bits31 => (word as u32 as i32) >> 1,
            SmiWidth::Bits32 => ((word as i64) >> 32) as i32,
        })
    }

    // ===== Roots =====

    pub fn root(&self, root: RootIndex) -> u64 {
        self.roots[root.index()]
    }

    pub fn is_root(&self, word: u64, root: RootIndex) -> bool {
        self.root(root) == word
    }

    fn create_roots(&mut self) -> Result<(), EvalError> {
        use instance_type::*;

        let maps: [(RootIndex, u32, u32); 18] = [
            (RootIndex::MetaMap, MAP_TYPE, 0),
            (RootIndex::HeapNumberMap, HEAP_NUMBER_TYPE, 0),
            (RootIndex::BigIntMap, BIGINT_TYPE, 0),
            (RootIndex::StringMap, SEQ_TWO_BYTE_STRING_TYPE, 0),
            (RootIndex::OneByteStringMap, SEQ_ONE_BYTE_STRING_TYPE, 0),
            (RootIndex::ConsStringMap, CONS_STRING_TYPE, 0),
            (RootIndex::ConsOneByteStringMap, CONS_ONE_BYTE_STRING_TYPE, 0),
            (RootIndex::SymbolMap, SYMBOL_TYPE, 0),
            (RootIndex::BooleanMap, ODDBALL_TYPE, 0),
            (RootIndex::OddballMap, ODDBALL_TYPE, 0),
            (RootIndex::FixedArrayMap, FIXED_ARRAY_TYPE, 0),
            (RootIndex::FixedDoubleArrayMap, FIXED_DOUBLE_ARRAY_TYPE, 0),
            (RootIndex::JsObjectMap, JS_OBJECT_TYPE, 0),
            (RootIndex::JsArrayMap, JS_ARRAY_TYPE, 0),
            (RootIndex::JsTypedArrayMap, JS_TYPED_ARRAY_TYPE, 0),
            (RootIndex::JsDataViewMap, JS_DATA_VIEW_TYPE, 0),
            (
                RootIndex::JsFunctionMap,
                JS_FUNCTION_TYPE,
                map_bits::IS_CALLABLE | map_bits::IS_CONSTRUCTOR,
            ),
            (
                RootIndex::UndetectableMap,
                JS_OBJECT_TYPE,
                map_bits::IS_CALLABLE | map_bits::IS_UNDETECTABLE,
            ),
        ];

        for (root, _, _) in maps {
            self.roots[root.index()] = self.allocate(map::SIZE as u64, AllocationType::Old)?;
        }
        let meta_map = self.root(RootIndex::MetaMap);
        for (root, ty, bits) in maps {
            let object = self.root(root);
            self.write_tagged_field(object, MAP_OFFSET, meta_map)?;
            let type_address = Self::field_address(object, map::INSTANCE_TYPE_OFFSET)?;
            self.write_u16(type_address, ty as u16)?;
            let bits_address = Self::field_address(object, map::BIT_FIELD_OFFSET)?;
            self.write_u8(bits_address, bits as u8)?;
        }

        let oddballs = [
            (RootIndex::TrueValue, RootIndex::BooleanMap, 1.0),
            (RootIndex::FalseValue, RootIndex::BooleanMap, 0.0),
            (RootIndex::TheHoleValue, RootIndex::OddballMap, f64::from_bits(HOLE_NAN_BITS)),
            (RootIndex::UndefinedValue, RootIndex::OddballMap, f64::NAN),
            (RootIndex::NullValue, RootIndex::OddballMap, 0.0),
        ];
        for (root, map_root, value) in oddballs {
            let object = self.allocate(heap_number::SIZE as u64, AllocationType::Old)?;
            self.write_tagged_field(object, MAP_OFFSET, self.root(map_root))?;
            self.write_f64_field(object, heap_number::VALUE_OFFSET, value)?;
            self.roots[root.index()] = object;
        }

        self.roots[RootIndex::EmptyFixedArray.index()] = self.new_fixed_array(&[])?;

        let mut table = Vec::with_capacity(256);
        for code in 0..=string::MAX_ONE_BYTE_CHAR_CODE {
            table.push(self.new_one_byte_string(&[code as u8])?);
        }
        self.roots[RootIndex::SingleCharacterStringTable.index()] = self.new_fixed_array(&table)?;
        Ok(())
    }

    // ===== Builders =====

    fn new_object(&mut self, map_root: RootIndex, size: i32) -> Result<u64, EvalError> {
        let object = self.allocate(size as u64, AllocationType::Young)?;
        self.write_tagged_field(object, MAP_OFFSET, self.root(map_root))?;
        Ok(object)
    }

    pub fn new_heap_number(&mut self, value: f64) -> Result<u64, EvalError> {
        let object = self.new_object(RootIndex::HeapNumberMap, heap_number::SIZE)?;
        self.write_f64_field(object, heap_number::VALUE_OFFSET, value)?;
        Ok(object)
    }

    /// Big-int with the given magnitude digits (least significant first)
    pub fn new_big_int(&mut self, negative: bool, digits: &[u64]) -> Result<u64, EvalError> {
        let object = self.new_object(RootIndex::BigIntMap, bigint::size_for(digits.len() as i32))?;
        let bitfield = bigint::encode_bitfield(digits.len() as u32, negative);
        self.write_u32_field(object, bigint::BITFIELD_OFFSET, bitfield)?;
        self.write_u32_field(object, bigint::OPTIONAL_PADDING_OFFSET, 0)?;
        for (i, &digit) in digits.iter().enumerate() {
            self.write_tagged_field(object, bigint::DIGITS_OFFSET + 8 * i as i32, digit)?;
        }
        Ok(object)
    }

    pub fn new_one_byte_string(&mut self, bytes: &[u8]) -> Result<u64, EvalError> {
        let length = bytes.len() as i32;
        let object = self.new_object(RootIndex::OneByteStringMap, string::seq_one_byte_size_for(length))?;
        self.write_u32_field(object, string::RAW_HASH_FIELD_OFFSET, string::EMPTY_HASH_FIELD)?;
        self.write_u32_field(object, string::LENGTH_OFFSET, length as u32)?;
        let payload = Self::field_address(object, string::SEQ_HEADER_SIZE)?;
        for (i, &byte) in bytes.iter().enumerate() {
            self.write_u8(payload + i as u64, byte)?;
        }
        Ok(object)
    }

    pub fn new_two_byte_string(&mut self, units: &[u16]) -> Result<u64, EvalError> {
        let length = units.len() as i32;
        let object = self.new_object(RootIndex::StringMap, string::seq_two_byte_size_for(length))?;
        self.write_u32_field(object, string::RAW_HASH_FIELD_OFFSET, string::EMPTY_HASH_FIELD)?;
        self.write_u32_field(object, string::LENGTH_OFFSET, length as u32)?;
        let payload = Self::field_address(object, string::SEQ_HEADER_SIZE)?;
        for (i, &unit) in units.iter().enumerate() {
            self.write_u16(payload + 2 * i as u64, unit)?;
        }
        Ok(object)
    }

    /// Sequential string holding `text`, one-byte when every unit fits
    pub fn new_string(&mut self, text: &str) -> Result<u64, EvalError> {
        let units: Vec<u16> = text.encode_utf16().collect();
        if units.iter().all(|&u| u as u32 <= string::MAX_ONE_BYTE_CHAR_CODE) {
            let bytes: Vec<u8> = units.iter().map(|&u| u as u8).collect();
            self.new_one_byte_string(&bytes)
        } else {
            self.new_two_byte_string(&units)
        }
    }

    pub fn new_symbol(&mut self) -> Result<u64, EvalError> {
        let object = self.new_object(RootIndex::SymbolMap, 16)?;
        self.write_u32_field(object, string::RAW_HASH_FIELD_OFFSET, string::EMPTY_HASH_FIELD)?;
        Ok(object)
    }

    pub fn new_fixed_array(&mut self, elements: &[u64]) -> Result<u64, EvalError> {
        let size = fixed_array::HEADER_SIZE + TAGGED_SIZE * elements.len() as i32;
        let object = self.new_object(RootIndex::FixedArrayMap, size)?;
        self.write_tagged_field(object, fixed_array::LENGTH_OFFSET, self.smi(elements.len() as i32))?;
        for (i, &element) in elements.iter().enumerate() {
            self.write_tagged_field(object, fixed_array::HEADER_SIZE + TAGGED_SIZE * i as i32, element)?;
        }
        Ok(object)
    }

    pub fn new_fixed_double_array(&mut self, elements: &[f64]) -> Result<u64, EvalError> {
        let size = fixed_array::HEADER_SIZE + 8 * elements.len() as i32;
        let object = self.new_object(RootIndex::FixedDoubleArrayMap, size)?;
        self.write_tagged_field(object, fixed_array::LENGTH_OFFSET, self.smi(elements.len() as i32))?;
        for (i, &element) in elements.iter().enumerate() {
            self.write_f64_field(object, fixed_array::HEADER_SIZE + 8 * i as i32, element)?;
        }
        Ok(object)
    }

    /// Receiver of shape `map_root` with in-object fields and an
    /// out-of-object property array
    pub fn new_js_object(
        &mut self,
        map_root: RootIndex,
        in_object: &[u64],
        properties: &[u64],
    ) -> Result<u64, EvalError> {
        let size = js_object::HEADER_SIZE + TAGGED_SIZE * in_object.len() as i32;
        let object = self.new_object(map_root, size)?;
        let properties = if properties.is_empty() {
            self.root(RootIndex::EmptyFixedArray)
        } else {
            self.new_fixed_array(properties)?
        };
        self.write_tagged_field(object, js_object::PROPERTIES_OR_HASH_OFFSET, properties)?;
        let elements = self.root(RootIndex::EmptyFixedArray);
        self.write_tagged_field(object, js_object::ELEMENTS_OFFSET, elements)?;
        for (i, &field) in in_object.iter().enumerate() {
            self.write_tagged_field(object, js_object::HEADER_SIZE + TAGGED_SIZE * i as i32, field)?;
        }
        Ok(object)
    }

    /// JS array with packed double elements
    pub fn new_double_js_array(&mut self, elements: &[f64]) -> Result<u64, EvalError> {
        let backing = self.new_fixed_double_array(elements)?;
        let object = self.new_object(RootIndex::JsArrayMap, js_array::SIZE)?;
        let empty = self.root(RootIndex::EmptyFixedArray);
        self.write_tagged_field(object, js_object::PROPERTIES_OR_HASH_OFFSET, empty)?;
        self.write_tagged_field(object, js_object::ELEMENTS_OFFSET, backing)?;
        self.write_tagged_field(object, js_array::LENGTH_OFFSET, self.smi(elements.len() as i32))?;
        Ok(object)
    }

    // ===== Readers =====

    pub fn map_of(&self, object: u64) -> Result<u64, EvalError> {
        self.read_tagged_field(object, MAP_OFFSET)
    }

    pub fn instance_type(&self, object: u64) -> Result<u32, EvalError> {
        let map = self.map_of(object)?;
        let address = Self::field_address(map, map::INSTANCE_TYPE_OFFSET)?;
        Ok(self.read_u16(address)? as u32)
    }

    /// Numeric value of a Smi or heap number
    pub fn number_value(&self, word: u64) -> Result<Option<f64>, EvalError> {
        if let Some(value) = self.smi_value(word) {
            return Ok(Some(value as f64));
        }
        if self.map_of(word)? != self.root(RootIndex::HeapNumberMap) {
            return Ok(None);
        }
        Ok(Some(self.read_f64_field(word, heap_number::VALUE_OFFSET)?))
    }

    /// Value of a big-int with at most two digits
    pub fn big_int_value(&self, object: u64) -> Result<Option<i128>, EvalError> {
        if Self::is_smi(object) || self.map_of(object)? != self.root(RootIndex::BigIntMap) {
            return Ok(None);
        }
        let bitfield = self.read_u32_field(object, bigint::BITFIELD_OFFSET)?;
        let length = (bitfield & bigint::LENGTH_MASK) >> bigint::LENGTH_SHIFT;
        if length > 2 {
            return Ok(None);
        }
        let mut magnitude: i128 = 0;
        for i in (0..length as i32).rev() {
            let digit = self.read_tagged_field(object, bigint::DIGITS_OFFSET + 8 * i)?;
            magnitude = (magnitude << 64) | digit as i128;
        }
        let negative = bitfield & bigint::SIGN_MASK != 0;
        Ok(Some(if negative { -magnitude } else { magnitude }))
    }

    /// UTF-16 units of a sequential or cons string
    pub fn string_units(&self, object: u64) -> Result<Option<Vec<u16>>, EvalError> {
        use instance_type::*;

        if Self::is_smi(object) {
            return Ok(None);
        }
        let ty = self.instance_type(object)?;
        if ty >= FIRST_NONSTRING_TYPE {
            return Ok(None);
        }
        if ty & STRING_REPRESENTATION_MASK == CONS_STRING_TAG {
            let first = self.read_tagged_field(object, string::CONS_FIRST_OFFSET)?;
            let second = self.read_tagged_field(object, string::CONS_SECOND_OFFSET)?;
            let (Some(mut units), Some(rest)) = (self.string_units(first)?, self.string_units(second)?) else {
                return Ok(None);
            };
            units.extend(rest);
            return Ok(Some(units));
        }

        let length = self.read_u32_field(object, string::LENGTH_OFFSET)? as u64;
        let payload = Self::field_address(object, string::SEQ_HEADER_SIZE)?;
        let mut units = Vec::with_capacity(length as usize);
        for i in 0..length {
            let unit = if ty & STRING_ENCODING_MASK == ONE_BYTE_STRING_TAG {
                self.read_u8(payload + i)? as u16
            } else {
                self.read_u16(payload + 2 * i)?
            };
            units.push(unit);
        }
        Ok(Some(units))
    }

    pub fn string_value(&self, object: u64) -> Result<Option<String>, EvalError> {
        Ok(self.string_units(object)?.map(|units| String::from_utf16_lossy(&units)))
    }

    /// Elements of a fixed array
    pub fn fixed_array_elements(&self, object: u64) -> Result<Vec<u64>, EvalError> {
        let length = self.fixed_array_length(object)?;
        (0..length)
            .map(|i| self.read_tagged_field(object, fixed_array::HEADER_SIZE + TAGGED_SIZE * i))
            .collect()
    }

    /// Raw bits of the elements of a fixed double array
    pub fn fixed_double_array_bits(&self, object: u64) -> Result<Vec<u64>, EvalError> {
        let length = self.fixed_array_length(object)?;
        (0..length)
            .map(|i| self.read_tagged_field(object, fixed_array::HEADER_SIZE + 8 * i))
            .collect()
    }

    fn fixed_array_length(&self, object: u64) -> Result<i32, EvalError> {
        let word = self.read_tagged_field(object, fixed_array::LENGTH_OFFSET)?;
        self.smi_value(word).ok_or(EvalError::NotASmi(word))
    }

    /// The array index `object` spells: canonical decimal digits of a value
    /// up to `i32::MAX`, or -1
    pub fn string_to_array_index(&self, object: u64) -> Result<i32, EvalError> {
        let Some(text) = self.string_value(object)? else {
            return Ok(-1);
        };
        let canonical = !text.is_empty()
            && text.bytes().all(|b| b.is_ascii_digit())
            && (text == "0" || !text.starts_with('0'));
        if !canonical {
            return Ok(-1);
        }
        Ok(text.parse::<i32>().unwrap_or(-1))
    }
}
