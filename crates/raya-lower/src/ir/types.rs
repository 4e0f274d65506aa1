//! Representations
//!
//! Register representations describe what an operation produces; memory
//! representations describe how a load or store touches the heap.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register representation of an operation's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rep {
    Word32,
    Word64,
    Float64,
    /// A tagged word: Smi or heap pointer
    Tagged,
    /// Result and overflow bit of an overflow-checked operation
    Tuple,
}

impl Rep {
    /// Pointer-sized integer on the 64-bit target
    pub const WORD_PTR: Rep = Rep::Word64;

    pub fn is_word(self) -> bool {
        matches!(self, Rep::Word32 | Rep::Word64)
    }
}

impl fmt::Display for Rep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rep::Word32 => write!(f, "w32"),
            Rep::Word64 => write!(f, "w64"),
            Rep::Float64 => write!(f, "f64"),
            Rep::Tagged => write!(f, "tagged"),
            Rep::Tuple => write!(f, "tuple"),
        }
    }
}

/// Word-sized register representation used by integer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordRep {
    Word32,
    Word64,
}

impl WordRep {
    pub fn rep(self) -> Rep {
        match self {
            WordRep::Word32 => Rep::Word32,
            WordRep::Word64 => Rep::Word64,
        }
    }
}

/// How a value is laid out in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRep {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float64,
    AnyTagged,
    TaggedSigned,
    TaggedPointer,
}

impl MemoryRep {
    pub fn size_in_bytes(self) -> usize {
        match self {
            MemoryRep::Int8 | MemoryRep::Uint8 => 1,
            MemoryRep::Int16 | MemoryRep::Uint16 => 2,
            MemoryRep::Int32 | MemoryRep::Uint32 => 4,
            MemoryRep::Int64
            | MemoryRep::Uint64
            | MemoryRep::Float64
            | MemoryRep::AnyTagged
            | MemoryRep::TaggedSigned
            | MemoryRep::TaggedPointer => 8,
        }
    }

    /// Whether narrow loads sign-extend
    pub fn is_signed(self) -> bool {
        matches!(self, MemoryRep::Int8 | MemoryRep::Int16 | MemoryRep::Int32 | MemoryRep::Int64)
    }

    /// Register representation a load of this memory produces
    pub fn register_rep(self) -> Rep {
        match self {
            MemoryRep::Int8
            | MemoryRep::Uint8
            | MemoryRep::Int16
            | MemoryRep::Uint16
            | MemoryRep::Int32
            | MemoryRep::Uint32 => Rep::Word32,
            MemoryRep::Int64 | MemoryRep::Uint64 => Rep::Word64,
            MemoryRep::Float64 => Rep::Float64,
            MemoryRep::AnyTagged | MemoryRep::TaggedSigned | MemoryRep::TaggedPointer => Rep::Tagged,
        }
    }
}

impl fmt::Display for MemoryRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryRep::Int8 => "i8",
            MemoryRep::Uint8 => "u8",
            MemoryRep::Int16 => "i16",
            MemoryRep::Uint16 => "u16",
            MemoryRep::Int32 => "i32",
            MemoryRep::Uint32 => "u32",
            MemoryRep::Int64 => "i64",
            MemoryRep::Uint64 => "u64",
            MemoryRep::Float64 => "f64",
            MemoryRep::AnyTagged => "tagged",
            MemoryRep::TaggedSigned => "tagged.smi",
            MemoryRep::TaggedPointer => "tagged.ptr",
        };
        f.write_str(s)
    }
}

/// Write barrier required by a store (stores into fresh objects elide it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteBarrier {
    None,
    Map,
    Full,
}

/// Generation hint passed to the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationType {
    #[default]
    Young,
    Old,
}

impl fmt::Display for AllocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationType::Young => write!(f, "young"),
            AllocationType::Old => write!(f, "old"),
        }
    }
}

/// Static branch prediction hint; has no semantic effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BranchHint {
    #[default]
    None,
    True,
    False,
}

impl BranchHint {
    /// Hint for the same branch with its edges swapped
    pub fn invert(self) -> BranchHint {
        match self {
            BranchHint::None => BranchHint::None,
            BranchHint::True => BranchHint::False,
            BranchHint::False => BranchHint::True,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_rep_sizes() {
        assert_eq!(MemoryRep::Uint8.size_in_bytes(), 1);
        assert_eq!(MemoryRep::Uint16.size_in_bytes(), 2);
        assert_eq!(MemoryRep::Uint32.size_in_bytes(), 4);
        assert_eq!(MemoryRep::AnyTagged.size_in_bytes(), 8);
    }

    #[test]
    fn test_memory_rep_register_rep() {
        assert_eq!(MemoryRep::Uint16.register_rep(), Rep::Word32);
        assert_eq!(MemoryRep::Uint64.register_rep(), Rep::Word64);
        assert_eq!(MemoryRep::Float64.register_rep(), Rep::Float64);
        assert_eq!(MemoryRep::TaggedSigned.register_rep(), Rep::Tagged);
    }
}
