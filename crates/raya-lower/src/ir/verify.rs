//! Structural checks for graphs
//!
//! `verify` is run on the input and the output of every lowering pipeline
//! run; `verify_machine_level` additionally rejects operations the machine
//! backends do not understand.

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::instr::{BlockIndex, Graph, Op, OpIndex, Terminator};
use super::types::Rep;

/// A malformed graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("graph has no blocks")]
    Empty,

    #[error("entry block {0} is not first in the layout")]
    EntryNotFirst(BlockIndex),

    #[error("block {0} has no terminator")]
    MissingTerminator(BlockIndex),

    #[error("block {block} jumps to {target}, which is not bound")]
    DeadTarget { block: BlockIndex, target: BlockIndex },

    #[error("edge {from} -> {to} does not match the predecessor list of {to}")]
    InconsistentEdge { from: BlockIndex, to: BlockIndex },

    #[error("loop header {block} has {found} predecessors, expected an entry and a back edge")]
    LoopHeaderArity { block: BlockIndex, found: usize },

    #[error("block {block} is laid out before its predecessor {pred}")]
    BlockOrder { block: BlockIndex, pred: BlockIndex },

    #[error("{op} uses {operand}, which does not exist")]
    UnknownOperand { op: OpIndex, operand: OpIndex },

    #[error("{op} uses {operand} before it is defined")]
    ForwardReference { op: OpIndex, operand: OpIndex },

    #[error("{op} uses {operand}, which produces no value")]
    NoValue { op: OpIndex, operand: OpIndex },

    #[error("phi {op} in {block} has {found} inputs for {expected} predecessors")]
    PhiArity {
        op: OpIndex,
        block: BlockIndex,
        expected: usize,
        found: usize,
    },

    #[error("phi {op} expects {expected} but input {operand} is {found}")]
    PhiRep {
        op: OpIndex,
        operand: OpIndex,
        expected: Rep,
        found: Rep,
    },

    #[error("phi {op} follows a non-phi operation in {block}")]
    PhiNotAtStart { op: OpIndex, block: BlockIndex },

    #[error("loop phi {0} was never closed by a back edge")]
    PendingLoopPhi(OpIndex),

    #[error("{op} is a value-level operation ({mnemonic}) left after lowering")]
    ValueLevelOp { op: OpIndex, mnemonic: &'static str },
}

/// Check that `graph` is well formed
pub fn verify(graph: &Graph) -> Result<(), VerifyError> {
    let layout = graph.layout();
    let Some(&first) = layout.first() else {
        return Err(VerifyError::Empty);
    };
    if first != graph.entry {
        return Err(VerifyError::EntryNotFirst(first));
    }

    let position: FxHashMap<BlockIndex, usize> =
        layout.iter().enumerate().map(|(i, &b)| (b, i)).collect();

    // Edges: every successor is bound and lists this block as a predecessor
    // once per outgoing edge.
    let mut edge_counts: FxHashMap<(BlockIndex, BlockIndex), usize> = FxHashMap::default();
    for block in graph.live_blocks() {
        if block.terminator == Terminator::None {
            return Err(VerifyError::MissingTerminator(block.id));
        }
        for target in block.terminator.successors() {
            if !position.contains_key(&target) {
                return Err(VerifyError::DeadTarget { block: block.id, target });
            }
            *edge_counts.entry((block.id, target)).or_default() += 1;
        }
    }
    for block in graph.live_blocks() {
        let mut listed: FxHashMap<BlockIndex, usize> = FxHashMap::default();
        for &pred in &block.predecessors {
            *listed.entry(pred).or_default() += 1;
        }
        for (&pred, &count) in &listed {
            if edge_counts.get(&(pred, block.id)).copied().unwrap_or(0) != count {
                return Err(VerifyError::InconsistentEdge { from: pred, to: block.id });
            }
        }
        for target in block.terminator.successors() {
            let expected = edge_counts.get(&(block.id, target)).copied().unwrap_or(0);
            let found = graph
                .block(target)
                .predecessors
                .iter()
                .filter(|&&p| p == block.id)
                .count();
            if expected != found {
                return Err(VerifyError::InconsistentEdge { from: block.id, to: target });
            }
        }

        if block.is_loop() && block.predecessors.len() != 2 {
            return Err(VerifyError::LoopHeaderArity { block: block.id, found: block.predecessors.len() });
        }

        // Only the back edge of a loop header may come from later blocks.
        let here = position[&block.id];
        let forward_preds = if block.is_loop() {
            &block.predecessors[..block.predecessors.len().min(1)]
        } else {
            &block.predecessors[..]
        };
        for &pred in forward_preds {
            if position.get(&pred).copied().unwrap_or(usize::MAX) >= here {
                return Err(VerifyError::BlockOrder { block: block.id, pred });
            }
        }
    }

    // Operations
    for block in graph.live_blocks() {
        let mut seen_non_phi = false;
        for &index in &block.ops {
            let op = graph.op(index);
            match op {
                Op::PendingLoopPhi { .. } => return Err(VerifyError::PendingLoopPhi(index)),
                Op::Phi { inputs, rep } => {
                    if seen_non_phi {
                        return Err(VerifyError::PhiNotAtStart { op: index, block: block.id });
                    }
                    if inputs.len() != block.predecessors.len() {
                        return Err(VerifyError::PhiArity {
                            op: index,
                            block: block.id,
                            expected: block.predecessors.len(),
                            found: inputs.len(),
                        });
                    }
                    for (i, &input) in inputs.iter().enumerate() {
                        check_operand(graph, index, input, block.is_loop() && i > 0)?;
                        let found = graph
                            .rep(input)
                            .ok_or(VerifyError::NoValue { op: index, operand: input })?;
                        if found != *rep {
                            return Err(VerifyError::PhiRep {
                                op: index,
                                operand: input,
                                expected: *rep,
                                found,
                            });
                        }
                    }
                    continue;
                }
                _ => seen_non_phi = true,
            }
            for input in op.inputs() {
                check_operand(graph, index, input, false)?;
            }
        }
        for input in block.terminator.inputs() {
            // Terminators come after every op of the block.
            check_operand(graph, OpIndex(graph.op_count() as u32), input, false)?;
        }
    }

    Ok(())
}

fn check_operand(
    graph: &Graph,
    op: OpIndex,
    operand: OpIndex,
    back_edge: bool,
) -> Result<(), VerifyError> {
    if operand.index() >= graph.op_count() {
        return Err(VerifyError::UnknownOperand { op, operand });
    }
    if !back_edge && operand >= op {
        return Err(VerifyError::ForwardReference { op, operand });
    }
    Ok(())
}

/// Check that no value-level operation remains in a live block
pub fn verify_machine_level(graph: &Graph) -> Result<(), VerifyError> {
    for block in graph.live_blocks() {
        for &index in &block.ops {
            let op = graph.op(index);
            if op.is_value_level() {
                return Err(VerifyError::ValueLevelOp { op: index, mnemonic: op.mnemonic() });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::{BlockKind, Constant};
    use crate::ir::value_ops::{ObjectIsAssumptions, ObjectIsKind};

    fn single_block(ops: impl FnOnce(&mut Graph, BlockIndex) -> Terminator) -> Graph {
        let mut graph = Graph::new("test");
        let entry = graph.add_block(BlockKind::Merge);
        graph.bind(entry);
        let term = ops(&mut graph, entry);
        graph.block_mut(entry).terminator = term;
        graph
    }

    #[test]
    fn test_verify_ok() {
        let graph = single_block(|g, b| {
            let c = g.add_op(b, Op::Constant(Constant::Word32(7)));
            Terminator::Return(vec![c])
        });
        assert_eq!(verify(&graph), Ok(()));
        assert_eq!(verify_machine_level(&graph), Ok(()));
    }

    #[test]
    fn test_verify_empty() {
        assert_eq!(verify(&Graph::new("empty")), Err(VerifyError::Empty));
    }

    #[test]
    fn test_verify_missing_terminator() {
        let graph = single_block(|_, _| Terminator::None);
        assert_eq!(verify(&graph), Err(VerifyError::MissingTerminator(BlockIndex(0))));
    }

    #[test]
    fn test_verify_phi_arity() {
        let mut graph = Graph::new("phi");
        let entry = graph.add_block(BlockKind::Merge);
        let join = graph.add_block(BlockKind::Merge);
        graph.bind(entry);
        let c = graph.add_op(entry, Op::Constant(Constant::Word32(1)));
        graph.block_mut(entry).terminator = Terminator::Goto(join);
        graph.bind(join);
        graph.block_mut(join).predecessors.push(entry);
        let phi = graph.add_op(join, Op::Phi { inputs: vec![c, c], rep: Rep::Word32 });
        graph.block_mut(join).terminator = Terminator::Return(vec![phi]);

        assert!(matches!(
            verify(&graph),
            Err(VerifyError::PhiArity { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn test_verify_inconsistent_edge() {
        let mut graph = Graph::new("edge");
        let entry = graph.add_block(BlockKind::Merge);
        let next = graph.add_block(BlockKind::Merge);
        graph.bind(entry);
        graph.block_mut(entry).terminator = Terminator::Goto(next);
        graph.bind(next);
        graph.block_mut(next).terminator = Terminator::Unreachable;

        assert_eq!(
            verify(&graph),
            Err(VerifyError::InconsistentEdge { from: entry, to: next })
        );
    }

    #[test]
    fn test_verify_loop_header_without_back_edge() {
        let mut graph = Graph::new("loop");
        let entry = graph.add_block(BlockKind::Merge);
        let header = graph.add_block(BlockKind::Loop);
        graph.bind(entry);
        graph.block_mut(entry).terminator = Terminator::Goto(header);
        graph.bind(header);
        graph.block_mut(header).predecessors.push(entry);
        graph.block_mut(header).terminator = Terminator::Return(vec![]);

        assert_eq!(
            verify(&graph),
            Err(VerifyError::LoopHeaderArity { block: header, found: 1 })
        );
    }

    #[test]
    fn test_verify_machine_level_rejects_value_ops() {
        let graph = single_block(|g, b| {
            let p = g.add_op(b, Op::Parameter { index: 0, rep: Rep::Tagged });
            let is = g.add_op(
                b,
                Op::ObjectIs {
                    input: p,
                    kind: ObjectIsKind::Smi,
                    assumptions: ObjectIsAssumptions::None,
                },
            );
            Terminator::Return(vec![is])
        });
        assert_eq!(verify(&graph), Ok(()));
        assert_eq!(
            verify_machine_level(&graph),
            Err(VerifyError::ValueLevelOp { op: OpIndex(1), mnemonic: "object_is" })
        );
    }
}
