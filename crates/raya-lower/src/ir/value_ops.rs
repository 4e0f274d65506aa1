//! Parameters of the value-level operations
//!
//! These are the operations earlier passes emit and the machine lowering
//! reducer replaces with loads, stores, arithmetic, and guards.

use std::fmt;

use super::types::Rep;

/// Lossy narrowing conversion guarded by a deoptimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrDeoptKind {
    Uint32ToInt32,
    Int64ToInt32,
    Uint64ToInt32,
    Uint64ToInt64,
    Float64ToInt32,
    Float64ToInt64,
}

impl ChangeOrDeoptKind {
    pub fn input_rep(self) -> Rep {
        match self {
            ChangeOrDeoptKind::Uint32ToInt32 => Rep::Word32,
            ChangeOrDeoptKind::Int64ToInt32
            | ChangeOrDeoptKind::Uint64ToInt32
            | ChangeOrDeoptKind::Uint64ToInt64 => Rep::Word64,
            ChangeOrDeoptKind::Float64ToInt32 | ChangeOrDeoptKind::Float64ToInt64 => Rep::Float64,
        }
    }

    pub fn output_rep(self) -> Rep {
        match self {
            ChangeOrDeoptKind::Uint32ToInt32
            | ChangeOrDeoptKind::Int64ToInt32
            | ChangeOrDeoptKind::Uint64ToInt32
            | ChangeOrDeoptKind::Float64ToInt32 => Rep::Word32,
            ChangeOrDeoptKind::Uint64ToInt64 | ChangeOrDeoptKind::Float64ToInt64 => Rep::Word64,
        }
    }
}

/// Whether a conversion must tell -0.0 apart from 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinusZeroMode {
    CheckForMinusZero,
    DontCheckForMinusZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectIsKind {
    BigInt,
    /// Big-int whose value fits in a signed 64-bit integer
    BigInt64,
    Callable,
    Constructor,
    /// Callable and not undetectable
    DetectableCallable,
    /// Receiver without call behavior
    NonCallable,
    Receiver,
    Undetectable,
    Smi,
    Number,
    Symbol,
    String,
    ArrayBufferView,
}

/// What is statically known about the input of an `ObjectIs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectIsAssumptions {
    None,
    HeapObject,
    BigInt,
}

impl ObjectIsAssumptions {
    /// Whether the input may still be a Smi
    pub fn needs_heap_object_check(self) -> bool {
        match self {
            ObjectIsAssumptions::None => true,
            ObjectIsAssumptions::HeapObject | ObjectIsAssumptions::BigInt => false,
        }
    }
}

/// Target of a primitive-to-object conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertToObjectKind {
    BigInt,
    Number,
    HeapNumber,
    Smi,
    Boolean,
    String,
}

/// How the raw input of a `ConvertToObject` is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputInterpretation {
    Signed,
    Unsigned,
    /// UTF-16 code unit (upper bits ignored)
    CharCode,
    /// Unicode code point, possibly outside the basic plane
    CodePoint,
}

/// Target of a non-deopting object-to-primitive conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToPrimitiveKind {
    Int32,
    Int64,
    Uint32,
    /// Boolean as a word: 1 for the true value, 0 otherwise
    Bit,
}

impl ToPrimitiveKind {
    pub fn output_rep(self) -> Rep {
        match self {
            ToPrimitiveKind::Int32 | ToPrimitiveKind::Uint32 | ToPrimitiveKind::Bit => Rep::Word32,
            ToPrimitiveKind::Int64 => Rep::Word64,
        }
    }
}

/// Shape an earlier pass has already proven for a non-deopting conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToPrimitiveAssumptions {
    Smi,
    NumberOrOddball,
    Object,
}

/// Shape a deopting conversion expects and verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptObjectKind {
    Smi,
    Number,
    NumberOrBoolean,
    NumberOrOddball,
    NumberOrString,
}

/// Target of a deopting object-to-primitive conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptPrimitiveKind {
    Int32,
    Int64,
    Float64,
    /// Pointer-sized integer index
    ArrayIndex,
}

impl DeoptPrimitiveKind {
    pub fn output_rep(self) -> Rep {
        match self {
            DeoptPrimitiveKind::Int32 => Rep::Word32,
            DeoptPrimitiveKind::Int64 => Rep::Word64,
            DeoptPrimitiveKind::Float64 => Rep::Float64,
            DeoptPrimitiveKind::ArrayIndex => Rep::WORD_PTR,
        }
    }
}

/// Element representation of a freshly allocated backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NewArrayKind {
    Double,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinMaxKind {
    Min,
    Max,
}

macro_rules! display_as_debug_snake {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let name = format!("{:?}", self);
                    let mut out = String::with_capacity(name.len() + 4);
                    for (i, ch) in name.char_indices() {
                        if ch.is_ascii_uppercase() {
                            if i > 0 {
                                out.push('_');
                            }
                            out.push(ch.to_ascii_lowercase());
                        } else {
                            out.push(ch);
                        }
                    }
                    f.write_str(&out)
                }
            }
        )*
    };
}

display_as_debug_snake!(
    ChangeOrDeoptKind,
    MinusZeroMode,
    ObjectIsKind,
    ObjectIsAssumptions,
    ConvertToObjectKind,
    InputInterpretation,
    ToPrimitiveKind,
    ToPrimitiveAssumptions,
    DeoptObjectKind,
    DeoptPrimitiveKind,
    NewArrayKind,
    MinMaxKind,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_or_deopt_reps() {
        assert_eq!(ChangeOrDeoptKind::Int64ToInt32.input_rep(), Rep::Word64);
        assert_eq!(ChangeOrDeoptKind::Int64ToInt32.output_rep(), Rep::Word32);
        assert_eq!(ChangeOrDeoptKind::Float64ToInt64.output_rep(), Rep::Word64);
    }

    #[test]
    fn test_display_snake_case() {
        assert_eq!(ObjectIsKind::ArrayBufferView.to_string(), "array_buffer_view");
        assert_eq!(MinusZeroMode::CheckForMinusZero.to_string(), "check_for_minus_zero");
        assert_eq!(MinMaxKind::Max.to_string(), "max");
    }

    #[test]
    fn test_heap_object_check() {
        assert!(ObjectIsAssumptions::None.needs_heap_object_check());
        assert!(!ObjectIsAssumptions::HeapObject.needs_heap_object_check());
        assert!(!ObjectIsAssumptions::BigInt.needs_heap_object_check());
    }
}
