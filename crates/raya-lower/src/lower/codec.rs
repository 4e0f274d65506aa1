//! Tagged value codec
//!
//! Conversions between tagged words and raw machine integers. A small
//! integer ("Smi") keeps a zero in the low bit:
//!
//! - 31-bit Smis: the tagged word is the sign extension of `value << 1`.
//!   Shifting left by one is the same as `value + value`, so a checked
//!   32-bit add of the value to itself tags and detects overflow in one step.
//! - 32-bit Smis: the payload sits in the upper half of the word and tagging
//!   an i32 cannot overflow.

use crate::asm::{Assembler, Label};
use crate::config::SmiWidth;
use crate::ir::types::{BranchHint, Rep};
use crate::ir::OpIndex;
use crate::layout::{SMI_TAG, SMI_TAG_MASK};

impl Assembler {
    /// 1 when `value` is a Smi, 0 when it is a heap pointer
    pub fn is_smi(&mut self, value: OpIndex) -> OpIndex {
        let word = self.bitcast_tagged_to_word(value);
        let low = self.truncate_word64_to_word32(word);
        let mask = self.word32_constant(SMI_TAG_MASK);
        let tag = self.word32_bitwise_and(low, mask);
        self.word32_equal_constant(tag, SMI_TAG)
    }

    /// Tag a word32 known to be in Smi range
    pub fn smi_tag(&mut self, value: OpIndex) -> OpIndex {
        debug_assert_eq!(self.rep_of(value), Rep::Word32);
        let word = match self.config().smi_width {
            SmiWidth::Bits31 => {
                let one = self.word32_constant(1);
                let shifted = self.word32_shift_left(value, one);
                self.change_int32_to_int64(shifted)
            }
            SmiWidth::Bits32 => {
                let wide = self.change_int32_to_int64(value);
                let shift = self.word64_constant(32);
                self.word64_shift_left(wide, shift)
            }
        };
        self.bitcast_word_to_tagged(word)
    }

    /// Tag the low 32 bits of a word64 known to be in Smi range
    pub fn smi_tag_word64(&mut self, value: OpIndex) -> OpIndex {
        let low = self.truncate_word64_to_word32(value);
        self.smi_tag(low)
    }

    /// Payload of a Smi as a word32
    pub fn smi_untag(&mut self, value: OpIndex) -> OpIndex {
        let word = self.bitcast_tagged_to_word(value);
        match self.config().smi_width {
            SmiWidth::Bits31 => {
                let low = self.truncate_word64_to_word32(word);
                let one = self.word32_constant(1);
                self.word32_shift_right_arithmetic(low, one)
            }
            SmiWidth::Bits32 => {
                let shift = self.word64_constant(32);
                let payload = self.word64_shift_right_arithmetic(word, shift);
                self.truncate_word64_to_word32(payload)
            }
        }
    }

    /// Tag `value`, jumping to `overflow` when it does not fit a Smi.
    ///
    /// With 31-bit Smis this is `value + value` with a signed overflow
    /// check: the sum is the tagged payload and the overflow bit is set
    /// exactly when bit 31 and bit 30 of `value` differ. Returns the tagged
    /// value on the fallthrough path.
    pub fn smi_tag_or_overflow(&mut self, value: OpIndex, overflow: &mut Label) -> OpIndex {
        match self.config().smi_width {
            SmiWidth::Bits32 => self.smi_tag(value),
            SmiWidth::Bits31 => {
                let add = self.int32_add_check_overflow(value, value);
                let did_overflow = self.projection(add, 1);
                self.goto_if(did_overflow, overflow, &[], BranchHint::False);
                let doubled = self.projection(add, 0);
                let word = self.change_int32_to_int64(doubled);
                self.bitcast_word_to_tagged(word)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::instr::{ChangeKind, Op};
    use crate::ir::verify;

    #[test]
    fn test_smi_tag_31_bit_shape() {
        let mut a = Assembler::new("tag", LoweringConfig::default());
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        let tagged = a.smi_tag(p);
        assert_eq!(a.rep_of(tagged), Rep::Tagged);
        assert!(matches!(
            a.graph().op(tagged),
            Op::Change { kind: ChangeKind::BitcastWordToTagged, .. }
        ));
        a.ret(vec![tagged]);
        assert_eq!(verify(&a.finish()), Ok(()));
    }

    #[test]
    fn test_smi_tag_or_overflow_32_bit_never_branches() {
        let config = LoweringConfig { smi_width: SmiWidth::Bits32, ..LoweringConfig::default() };
        let mut a = Assembler::new("tag", config);
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        let mut overflow = a.new_label(&[]);
        let tagged = a.smi_tag_or_overflow(p, &mut overflow);
        assert_eq!(overflow.edge_count(), 0);
        assert_eq!(a.graph().layout().len(), 1);
        assert_eq!(a.graph().rep(tagged), Some(Rep::Tagged));
        a.ret(vec![tagged]);
        assert_eq!(a.bind_label(&mut overflow), None);
    }

    #[test]
    fn test_smi_tag_or_overflow_31_bit_uses_checked_add() {
        let mut a = Assembler::new("tag", LoweringConfig::default());
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        let mut overflow = a.new_label(&[]);
        let tagged = a.smi_tag_or_overflow(p, &mut overflow);
        a.ret(vec![tagged]);
        assert_eq!(overflow.edge_count(), 1);
        assert_eq!(a.graph().count_ops(|op| matches!(op, Op::Int32AddCheckOverflow { .. })), 1);
        a.bind_label(&mut overflow);
        a.unreachable();
        assert_eq!(verify(&a.finish()), Ok(()));
    }
}
