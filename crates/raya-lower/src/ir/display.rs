//! Pretty-printing for graphs
//!
//! Display implementations for debugging and dump output.

use std::fmt;

use super::instr::*;
use super::types::BranchHint;

fn join(values: &[OpIndex]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

fn fmt_address(
    f: &mut fmt::Formatter<'_>,
    base: OpIndex,
    index: Option<OpIndex>,
    offset: i32,
    element_size_log2: u8,
) -> fmt::Result {
    write!(f, "[{}", base)?;
    if let Some(index) = index {
        write!(f, " + {} << {}", index, element_size_log2)?;
    }
    write!(f, " + {}]", offset)
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph @{} ({} ops) {{", self.name, self.op_count())?;
        for block in self.live_blocks() {
            writeln!(
                f,
                "  {}{}:",
                block.id,
                if block.is_loop() { " (loop)" } else { "" }
            )?;
            if !block.predecessors.is_empty() {
                write!(f, "    ; preds:")?;
                for pred in &block.predecessors {
                    write!(f, " {}", pred)?;
                }
                writeln!(f)?;
            }
            for &index in &block.ops {
                writeln!(f, "    {} = {}", index, self.op(index))?;
            }
            writeln!(f, "    {}", block.terminator)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Word32(v) => write!(f, "const.w32 {:#x}", v),
            Constant::Word64(v) => write!(f, "const.w64 {:#x}", v),
            Constant::Float64(v) => write!(f, "const.f64 {}", v),
            Constant::Heap(root) => write!(f, "const.heap {}", root),
            Constant::External(ext) => write!(f, "const.external {}", ext.name()),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Parameter { index, rep } => write!(f, "param.{} #{}", rep, index),
            Op::Constant(c) => write!(f, "{}", c),
            Op::FrameState { id } => write!(f, "frame_state #{}", id),
            Op::WordBinop { kind, rep, left, right } => {
                write!(f, "{:?}.{} {}, {}", kind, rep.rep(), left, right)
            }
            Op::Int32AddCheckOverflow { left, right } => {
                write!(f, "add_check_overflow.w32 {}, {}", left, right)
            }
            Op::Projection { input, index } => write!(f, "projection {}.{}", input, index),
            Op::Comparison { kind, rep, left, right } => {
                write!(f, "cmp.{:?}.{} {}, {}", kind, rep, left, right)
            }
            Op::FloatBinop { kind, left, right } => {
                write!(f, "{:?}.f64 {}, {}", kind, left, right)
            }
            Op::Change { kind, input } => write!(f, "change.{:?} {}", kind, input),
            Op::Load { base, index, offset, element_size_log2, rep } => {
                write!(f, "load.{} ", rep)?;
                fmt_address(f, *base, *index, *offset, *element_size_log2)
            }
            Op::Store { base, index, value, offset, element_size_log2, rep, write_barrier } => {
                write!(f, "store.{} ", rep)?;
                fmt_address(f, *base, *index, *offset, *element_size_log2)?;
                write!(f, ", {} (barrier: {:?})", value, write_barrier)
            }
            Op::Allocate { size, allocation } => write!(f, "allocate.{} {}", allocation, size),
            Op::Call { callee, args } => write!(f, "call {}({})", callee.name(), join(args)),
            Op::Phi { inputs, rep } => write!(f, "phi.{} [{}]", rep, join(inputs)),
            Op::PendingLoopPhi { first, rep } => write!(f, "pending_loop_phi.{} [{}, ?]", rep, first),
            Op::DeoptimizeIf { condition, negated, frame_state, parameters } => write!(
                f,
                "deoptimize_{} {}, {} ({}, {})",
                if *negated { "unless" } else { "if" },
                condition,
                frame_state,
                parameters.reason,
                parameters.feedback
            ),
            Op::ChangeOrDeopt { input, frame_state, kind, minus_zero, .. } => {
                write!(f, "change_or_deopt.{} {}, {} ({})", kind, input, frame_state, minus_zero)
            }
            Op::ObjectIs { input, kind, assumptions } => {
                write!(f, "object_is.{} {} (assume {})", kind, input, assumptions)
            }
            Op::ConvertToObject { input, kind, input_rep, interpretation, .. } => write!(
                f,
                "convert_to_object.{} {} ({} as {})",
                kind, input, input_rep, interpretation
            ),
            Op::ConvertObjectToPrimitive { object, kind, assumptions } => write!(
                f,
                "convert_object_to_primitive.{} {} (assume {})",
                kind, object, assumptions
            ),
            Op::ConvertObjectToPrimitiveOrDeopt { object, frame_state, from, to, .. } => write!(
                f,
                "convert_object_to_primitive_or_deopt.{}.{} {}, {}",
                from, to, object, frame_state
            ),
            Op::NewConsString { length, first, second } => {
                write!(f, "new_cons_string {}, {}, {}", length, first, second)
            }
            Op::NewArray { length, kind, allocation } => {
                write!(f, "new_array.{}.{} {}", kind, allocation, length)
            }
            Op::DoubleArrayMinMax { array, kind } => {
                write!(f, "double_array_min_max.{} {}", kind, array)
            }
            Op::LoadFieldByIndex { object, field_index } => {
                write!(f, "load_field_by_index {}, {}", object, field_index)
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(target) => write!(f, "goto {}", target),
            Terminator::Branch { condition, if_true, if_false, hint } => {
                write!(f, "br {}, {}, {}", condition, if_true, if_false)?;
                match hint {
                    BranchHint::None => Ok(()),
                    BranchHint::True => write!(f, " (likely)"),
                    BranchHint::False => write!(f, " (unlikely)"),
                }
            }
            Terminator::Return(values) => write!(f, "return {}", join(values)),
            Terminator::Deoptimize { frame_state, parameters } => write!(
                f,
                "deoptimize {} ({}, {})",
                frame_state, parameters.reason, parameters.feedback
            ),
            Terminator::Unreachable => write!(f, "unreachable"),
            Terminator::None => write!(f, "<no terminator>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Rep;

    #[test]
    fn test_display_graph() {
        let mut graph = Graph::new("add_one");
        let entry = graph.add_block(BlockKind::Merge);
        graph.bind(entry);
        let p = graph.add_op(entry, Op::Parameter { index: 0, rep: Rep::Word32 });
        graph.block_mut(entry).terminator = Terminator::Return(vec![p]);

        let text = graph.to_string();
        assert!(text.contains("graph @add_one"));
        assert!(text.contains("v0 = param.w32 #0"));
        assert!(text.contains("return v0"));
    }

    #[test]
    fn test_display_branch_hint() {
        let term = Terminator::Branch {
            condition: OpIndex(3),
            if_true: BlockIndex(1),
            if_false: BlockIndex(2),
            hint: BranchHint::False,
        };
        assert_eq!(term.to_string(), "br v3, bb1, bb2 (unlikely)");
    }
}
