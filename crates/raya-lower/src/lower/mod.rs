//! Value-representation lowering
//!
//! Assembler extensions for the tagged value codec, deoptimization guards,
//! and allocation sequences, plus the reducer that uses them to replace
//! value-level operations.
//!
//! Every handler starts in a reachable block and returns with the
//! assembler in a reachable block that the returned value dominates.

mod alloc;
mod array;
mod change;
mod codec;
mod deopt;
mod field;
pub mod machine;
mod object_is;
pub mod reducer;
mod to_object;
mod to_primitive;

pub use machine::MachineLoweringReducer;
pub use reducer::{Reducer, ReducerStack, Reduction};

use crate::asm::{Assembler, Label};
use crate::ir::OpIndex;

/// Bind a single-parameter label every handler path ends in
fn bind_value(asm: &mut Assembler, label: &mut Label) -> OpIndex {
    match asm.bind_label(label) {
        Some(values) => values[0],
        None => panic!("result label has no incoming edges"),
    }
}
