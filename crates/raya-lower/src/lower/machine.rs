//! Machine lowering reducer
//!
//! Replaces every value-level operation with machine-level loads, stores,
//! arithmetic, allocations and guards. Everything else is forwarded.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::reducer::{Reducer, Reduction};
use super::{array, change, field, object_is, to_object, to_primitive};
use crate::asm::Assembler;
use crate::ir::Op;

/// Lowers value-level operations to machine-level code
pub struct MachineLoweringReducer {
    /// Operations lowered so far, by mnemonic
    lowered: FxHashMap<&'static str, usize>,
}

impl MachineLoweringReducer {
    pub fn new() -> Self {
        MachineLoweringReducer {
            lowered: FxHashMap::default(),
        }
    }

    /// How many operations with `mnemonic` this reducer has lowered
    pub fn lowered_count(&self, mnemonic: &str) -> usize {
        self.lowered.get(mnemonic).copied().unwrap_or(0)
    }

    pub fn total_lowered(&self) -> usize {
        self.lowered.values().sum()
    }
}

impl Default for MachineLoweringReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for MachineLoweringReducer {
    fn name(&self) -> &str {
        "machine-lowering"
    }

    fn reduce(&mut self, op: &Op, asm: &mut Assembler) -> Reduction {
        let result = match *op {
            Op::ChangeOrDeopt { input, frame_state, kind, minus_zero, feedback } => {
                change::lower_change_or_deopt(asm, input, frame_state, kind, minus_zero, feedback)
            }
            Op::ObjectIs { input, kind, assumptions } => {
                object_is::lower_object_is(asm, input, kind, assumptions)
            }
            Op::ConvertToObject { input, kind, input_rep, interpretation, minus_zero } => {
                to_object::lower_convert_to_object(asm, input, kind, input_rep, interpretation, minus_zero)
            }
            Op::ConvertObjectToPrimitive { object, kind, assumptions } => {
                to_primitive::lower_convert_object_to_primitive(asm, object, kind, assumptions)
            }
            Op::ConvertObjectToPrimitiveOrDeopt { object, frame_state, from, to, minus_zero, feedback } => {
                to_primitive::lower_convert_object_to_primitive_or_deopt(
                    asm,
                    object,
                    frame_state,
                    from,
                    to,
                    minus_zero,
                    feedback,
                )
            }
            Op::NewConsString { length, first, second } => {
                array::lower_new_cons_string(asm, length, first, second)
            }
            Op::NewArray { length, kind, allocation } => array::lower_new_array(asm, length, kind, allocation),
            Op::DoubleArrayMinMax { array, kind } => array::lower_double_array_min_max(asm, array, kind),
            Op::LoadFieldByIndex { object, field_index } => {
                field::lower_load_field_by_index(asm, object, field_index)
            }
            _ => return Reduction::Forward,
        };

        let mnemonic = op.mnemonic();
        *self.lowered.entry(mnemonic).or_insert(0) += 1;
        debug!(op = mnemonic, result = %result, block = ?asm.current_block(), "lowered");
        Reduction::Done(result)
    }
}
