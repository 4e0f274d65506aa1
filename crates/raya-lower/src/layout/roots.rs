//! Canonical heap constants
//!
//! Maps and singleton values that lowering refers to by identity. They are
//! resolved when code is lowered and never allocated by compiled code.

use std::fmt;

/// Index into the canonical root table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RootIndex {
    // ===== Maps =====
    MetaMap,
    HeapNumberMap,
    BigIntMap,
    /// Sequential two-byte string
    StringMap,
    OneByteStringMap,
    ConsStringMap,
    ConsOneByteStringMap,
    SymbolMap,
    BooleanMap,
    OddballMap,
    FixedArrayMap,
    FixedDoubleArrayMap,
    JsObjectMap,
    /// JS array with packed double elements
    JsArrayMap,
    JsTypedArrayMap,
    JsDataViewMap,
    JsFunctionMap,
    /// Callable object that reports itself as undefined (`document.all`)
    UndetectableMap,

    // ===== Singletons =====
    TrueValue,
    FalseValue,
    TheHoleValue,
    UndefinedValue,
    NullValue,
    EmptyFixedArray,
    /// Fixed array of the 256 one-byte single-character strings
    SingleCharacterStringTable,
}

impl RootIndex {
    /// Every root, in table order
    pub const ALL: [RootIndex; 25] = [
        RootIndex::MetaMap,
        RootIndex::HeapNumberMap,
        RootIndex::BigIntMap,
        RootIndex::StringMap,
        RootIndex::OneByteStringMap,
        RootIndex::ConsStringMap,
        RootIndex::ConsOneByteStringMap,
        RootIndex::SymbolMap,
        RootIndex::BooleanMap,
        RootIndex::OddballMap,
        RootIndex::FixedArrayMap,
        RootIndex::FixedDoubleArrayMap,
        RootIndex::JsObjectMap,
        RootIndex::JsArrayMap,
        RootIndex::JsTypedArrayMap,
        RootIndex::JsDataViewMap,
        RootIndex::JsFunctionMap,
        RootIndex::UndetectableMap,
        RootIndex::TrueValue,
        RootIndex::FalseValue,
        RootIndex::TheHoleValue,
        RootIndex::UndefinedValue,
        RootIndex::NullValue,
        RootIndex::EmptyFixedArray,
        RootIndex::SingleCharacterStringTable,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_map(self) -> bool {
        self < RootIndex::TrueValue
    }

    pub fn name(self) -> &'static str {
        match self {
            RootIndex::MetaMap => "meta_map",
            RootIndex::HeapNumberMap => "heap_number_map",
            RootIndex::BigIntMap => "bigint_map",
            RootIndex::StringMap => "string_map",
            RootIndex::OneByteStringMap => "one_byte_string_map",
            RootIndex::ConsStringMap => "cons_string_map",
            RootIndex::ConsOneByteStringMap => "cons_one_byte_string_map",
            RootIndex::SymbolMap => "symbol_map",
            RootIndex::BooleanMap => "boolean_map",
            RootIndex::OddballMap => "oddball_map",
            RootIndex::FixedArrayMap => "fixed_array_map",
            RootIndex::FixedDoubleArrayMap => "fixed_double_array_map",
            RootIndex::JsObjectMap => "js_object_map",
            RootIndex::JsArrayMap => "js_array_map",
            RootIndex::JsTypedArrayMap => "js_typed_array_map",
            RootIndex::JsDataViewMap => "js_data_view_map",
            RootIndex::JsFunctionMap => "js_function_map",
            RootIndex::UndetectableMap => "undetectable_map",
            RootIndex::TrueValue => "true_value",
            RootIndex::FalseValue => "false_value",
            RootIndex::TheHoleValue => "the_hole_value",
            RootIndex::UndefinedValue => "undefined_value",
            RootIndex::NullValue => "null_value",
            RootIndex::EmptyFixedArray => "empty_fixed_array",
            RootIndex::SingleCharacterStringTable => "single_character_string_table",
        }
    }
}

impl fmt::Display for RootIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_discriminants() {
        for (i, root) in RootIndex::ALL.iter().enumerate() {
            assert_eq!(root.index(), i);
        }
    }

    #[test]
    fn test_maps_precede_singletons() {
        assert!(RootIndex::UndetectableMap.is_map());
        assert!(!RootIndex::TrueValue.is_map());
        assert!(!RootIndex::SingleCharacterStringTable.is_map());
    }
}
