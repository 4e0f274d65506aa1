//! Lowering pipeline: verified input graph → reducers → verified output graph
//!
//! The pipeline copies the input graph block by block into a fresh
//! assembler:
//! 1. Verify the input
//! 2. Map every bound input block to an output block (loops stay loops)
//! 3. Bind each block in layout order and offer its operations to the
//!    reducer stack, with operands renamed to output values
//! 4. Copy the terminator with mapped targets
//! 5. Fill in phi inputs once every edge exists
//! 6. Verify the output and check that no value-level operation survived
//!
//! Blocks the assembler finds unreachable are skipped entirely.

use std::path::Path;

use tracing::{debug, trace};

use crate::asm::Assembler;
use crate::config::{ConfigError, LoweringConfig};
use crate::ir::{verify, verify_machine_level, BlockIndex, Graph, Op, OpIndex, Terminator, VerifyError};
use crate::lower::ReducerStack;

/// Errors from the lowering pipeline
#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    #[error("Invalid input graph: {0}")]
    InvalidInput(VerifyError),
    #[error("Invalid output graph: {0}")]
    InvalidOutput(VerifyError),
    #[error("{op} uses {operand}, which was not lowered")]
    DanglingOperand { op: OpIndex, operand: OpIndex },
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// An input phi waiting for its output edges
struct PendingPhi {
    output: OpIndex,
    input: OpIndex,
    block: BlockIndex,
}

/// Complete lowering pipeline
pub struct LoweringPipeline {
    config: LoweringConfig,
    reducers: ReducerStack,
}

impl LoweringPipeline {
    /// Create a pipeline with the default reducer stack
    pub fn new(config: LoweringConfig) -> Self {
        LoweringPipeline {
            config,
            reducers: ReducerStack::new(),
        }
    }

    /// Create a pipeline with a custom reducer stack
    pub fn with_reducers(config: LoweringConfig, reducers: ReducerStack) -> Self {
        LoweringPipeline { config, reducers }
    }

    /// Load and validate a config file, then build the default pipeline
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, LowerError> {
        let config = LoweringConfig::from_file(path)?;
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    pub fn reducers(&self) -> &ReducerStack {
        &self.reducers
    }

    /// Lower `input` into a new machine-level graph
    pub fn run(&mut self, input: &Graph) -> Result<Graph, LowerError> {
        verify(input).map_err(LowerError::InvalidInput)?;
        debug!(
            graph = %input.name,
            ops = input.op_count(),
            value_level = input.value_level_op_count(),
            "lowering"
        );

        let mut asm = Assembler::new(input.name.clone(), self.config);
        let output_entry = asm.graph().entry;
        asm.graph_mut().block_mut(output_entry).origin = Some(input.entry);

        let mut block_map: Vec<Option<BlockIndex>> = vec![None; input.blocks.len()];
        for &block in input.layout() {
            let mapped = if block == input.entry {
                output_entry
            } else if input.block(block).is_loop() {
                asm.new_loop_header()
            } else {
                asm.new_block()
            };
            block_map[block.index()] = Some(mapped);
        }

        let mut op_map: Vec<Option<OpIndex>> = vec![None; input.op_count()];
        let mut pending_phis = Vec::new();

        for &block in input.layout() {
            let target = mapped_block(&block_map, block);
            asm.set_origin(Some(block));
            if block != input.entry && !asm.bind(target) {
                trace!(block = %block, "skipping unreachable block");
                continue;
            }

            for &index in &input.block(block).ops {
                let op = input.op(index);
                if let Op::Phi { rep, .. } = op {
                    // Inputs are filled in once all edges exist.
                    let output = asm.phi(vec![], *rep);
                    op_map[index.index()] = Some(output);
                    pending_phis.push(PendingPhi { output, input: index, block });
                    continue;
                }

                for operand in op.inputs() {
                    if op_map[operand.index()].is_none() {
                        return Err(LowerError::DanglingOperand { op: index, operand });
                    }
                }
                let renamed = op.map_inputs(|operand| op_map[operand.index()].unwrap_or(operand));
                let result = self.reducers.reduce(&renamed, &mut asm);
                op_map[index.index()] = Some(result);
            }

            if !asm.is_reachable() {
                continue;
            }
            let rename = |value: OpIndex| {
                op_map[value.index()].ok_or(LowerError::DanglingOperand { op: value, operand: value })
            };
            // Terminators have no index of their own; report the operand twice.
            match &input.block(block).terminator {
                Terminator::Goto(next) => asm.goto(mapped_block(&block_map, *next)),
                Terminator::Branch { condition, if_true, if_false, hint } => {
                    let condition = rename(*condition)?;
                    asm.branch(
                        condition,
                        mapped_block(&block_map, *if_true),
                        mapped_block(&block_map, *if_false),
                        *hint,
                    );
                }
                Terminator::Return(values) => {
                    let values = values.iter().map(|&v| rename(v)).collect::<Result<Vec<_>, _>>()?;
                    asm.ret(values);
                }
                Terminator::Deoptimize { frame_state, parameters } => {
                    let frame_state = rename(*frame_state)?;
                    asm.deoptimize(frame_state, *parameters);
                }
                Terminator::Unreachable => asm.unreachable(),
                Terminator::None => {
                    return Err(LowerError::InvalidInput(VerifyError::MissingTerminator(block)));
                }
            }
        }

        let mut output = asm.finish();
        for phi in pending_phis {
            fill_phi(input, &mut output, &op_map, &phi)?;
        }

        verify(&output).map_err(LowerError::InvalidOutput)?;
        verify_machine_level(&output).map_err(LowerError::InvalidOutput)?;
        debug!(
            graph = %output.name,
            blocks = output.layout().len(),
            ops = output.op_count(),
            "lowered"
        );
        Ok(output)
    }
}

fn mapped_block(block_map: &[Option<BlockIndex>], block: BlockIndex) -> BlockIndex {
    match block_map[block.index()] {
        Some(mapped) => mapped,
        None => panic!("{} is not bound in the input graph", block),
    }
}

/// Give an output phi one input per output predecessor. Each predecessor was
/// produced from some input block; that block's position among the input
/// predecessors selects the input phi operand.
fn fill_phi(
    input: &Graph,
    output: &mut Graph,
    op_map: &[Option<OpIndex>],
    phi: &PendingPhi,
) -> Result<(), LowerError> {
    let Op::Phi { inputs: input_operands, rep } = input.op(phi.input) else {
        panic!("{} is not a phi", phi.input);
    };
    let input_preds = &input.block(phi.block).predecessors;
    let output_block = output.op_block(phi.output);

    let mut operands = Vec::with_capacity(input_operands.len());
    for &pred in &output.block(output_block).predecessors {
        let origin = output.block(pred).origin;
        let position = origin.and_then(|origin| input_preds.iter().position(|&p| p == origin));
        let Some(position) = position else {
            panic!("edge {} -> {} has no input counterpart", pred, output_block);
        };
        let operand = input_operands[position];
        match op_map[operand.index()] {
            Some(mapped) => operands.push(mapped),
            None => return Err(LowerError::DanglingOperand { op: phi.input, operand }),
        }
    }

    *output.op_mut(phi.output) = Op::Phi { inputs: operands, rep: *rep };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::Constant;
    use crate::ir::types::{BranchHint, Rep};
    use crate::ir::value_ops::{ObjectIsAssumptions, ObjectIsKind};
    use crate::ir::BlockKind;

    fn input_graph() -> Graph {
        // bb0: p = param; c = object_is(p); br c, bb1, bb2
        // bb1: goto bb3     bb2: goto bb3
        // bb3: phi(1, 2); ret
        let mut g = Graph::new("select");
        let b0 = g.add_block(BlockKind::Merge);
        let b1 = g.add_block(BlockKind::Merge);
        let b2 = g.add_block(BlockKind::Merge);
        let b3 = g.add_block(BlockKind::Merge);
        for b in [b0, b1, b2, b3] {
            g.bind(b);
        }
        let p = g.add_op(b0, Op::Parameter { index: 0, rep: Rep::Tagged });
        let c = g.add_op(
            b0,
            Op::ObjectIs { input: p, kind: ObjectIsKind::Number, assumptions: ObjectIsAssumptions::None },
        );
        let one = g.add_op(b1, Op::Constant(Constant::Word32(1)));
        let two = g.add_op(b2, Op::Constant(Constant::Word32(2)));
        g.block_mut(b0).terminator = Terminator::Branch { condition: c, if_true: b1, if_false: b2, hint: BranchHint::None };
        g.block_mut(b1).terminator = Terminator::Goto(b3);
        g.block_mut(b2).terminator = Terminator::Goto(b3);
        g.block_mut(b1).predecessors = vec![b0];
        g.block_mut(b2).predecessors = vec![b0];
        g.block_mut(b3).predecessors = vec![b1, b2];
        let phi = g.add_op(b3, Op::Phi { inputs: vec![one, two], rep: Rep::Word32 });
        g.block_mut(b3).terminator = Terminator::Return(vec![phi]);
        g
    }

    #[test]
    fn test_pipeline_lowers_and_keeps_phi_order() {
        let input = input_graph();
        let mut pipeline = LoweringPipeline::new(LoweringConfig::default());
        let output = pipeline.run(&input).unwrap();
        assert_eq!(output.value_level_op_count(), 0);

        let (_, phi) = output
            .ops()
            .filter(|(_, op)| matches!(op, Op::Phi { rep: Rep::Word32, inputs } if inputs.len() == 2))
            .last()
            .unwrap();
        let Op::Phi { inputs, .. } = phi else { unreachable!() };
        assert_eq!(output.op(inputs[0]), &Op::Constant(Constant::Word32(1)));
        assert_eq!(output.op(inputs[1]), &Op::Constant(Constant::Word32(2)));
    }

    #[test]
    fn test_empty_stack_rejects_value_level_output() {
        let input = input_graph();
        let mut pipeline = LoweringPipeline::with_reducers(LoweringConfig::default(), ReducerStack::empty());
        let err = pipeline.run(&input).unwrap_err();
        assert!(matches!(err, LowerError::InvalidOutput(VerifyError::ValueLevelOp { .. })));
    }

    #[test]
    fn test_invalid_input_is_reported() {
        let mut g = Graph::new("broken");
        let b0 = g.add_block(BlockKind::Merge);
        g.bind(b0);
        g.add_op(b0, Op::FrameState { id: 0 });
        let mut pipeline = LoweringPipeline::new(LoweringConfig::default());
        let err = pipeline.run(&g).unwrap_err();
        assert!(matches!(err, LowerError::InvalidInput(VerifyError::MissingTerminator(_))));
        assert!(err.to_string().starts_with("Invalid input graph"));
    }
}
