//! Shared helpers for lowering integration tests
//!
//! Each test builds a tiny value-level graph (parameters, one frame state,
//! the operation under test, a return), lowers it, and runs the result on
//! the reference evaluator.

#![allow(dead_code)]

use raya_lower::ir::instr::FeedbackSource;
use raya_lower::ir::DeoptimizeReason;
use raya_lower::{Assembler, Graph, LoweringConfig, LoweringPipeline, Machine, Op, OpIndex, Outcome, Rep, Value};

/// Frame state id every test graph carries
pub const FRAME_STATE: u32 = 7;
/// Feedback slot attached to every guarding operation
pub const FEEDBACK: FeedbackSource = FeedbackSource(Some(3));

/// Operands available to a graph builder
pub struct Inputs {
    pub params: Vec<OpIndex>,
    pub frame_state: OpIndex,
}

/// Build, verify, and lower a single-result graph
pub fn lower(
    config: LoweringConfig,
    params: &[Rep],
    build: impl FnOnce(&mut Assembler, &Inputs) -> OpIndex,
) -> Graph {
    let input = build_input(config, params, build);
    let mut pipeline = LoweringPipeline::new(config);
    match pipeline.run(&input) {
        Ok(graph) => graph,
        Err(err) => panic!("lowering failed: {}", err),
    }
}

/// Build a value-level graph without lowering it
pub fn build_input(
    config: LoweringConfig,
    params: &[Rep],
    build: impl FnOnce(&mut Assembler, &Inputs) -> OpIndex,
) -> Graph {
    let mut asm = Assembler::new("test", config);
    let params = params
        .iter()
        .enumerate()
        .map(|(index, &rep)| asm.emit(Op::Parameter { index: index as u32, rep }))
        .collect();
    let frame_state = asm.emit(Op::FrameState { id: FRAME_STATE });
    let inputs = Inputs { params, frame_state };
    let result = build(&mut asm, &inputs);
    asm.ret(vec![result]);
    asm.finish()
}

/// Lower a single value-level operation over its parameters
pub fn lower_op(config: LoweringConfig, params: &[Rep], make: impl FnOnce(&Inputs) -> Op) -> Graph {
    lower(config, params, |asm, inputs| {
        let op = make(inputs);
        asm.emit(op)
    })
}

pub fn machine(config: &LoweringConfig) -> Machine {
    Machine::new(config).unwrap()
}

pub fn run(machine: &mut Machine, graph: &Graph, args: &[Value]) -> Outcome {
    match machine.run(graph, args) {
        Ok(outcome) => outcome,
        Err(err) => panic!("evaluation failed: {}", err),
    }
}

/// Run and expect a guard to fire with `reason`
pub fn expect_deopt(machine: &mut Machine, graph: &Graph, args: &[Value], reason: DeoptimizeReason) {
    let outcome = run(machine, graph, args);
    assert_eq!(
        outcome,
        Outcome::Deoptimized { reason, feedback: FEEDBACK, frame_state: FRAME_STATE },
        "args {:?}",
        args
    );
}

pub fn tagged(value: Value) -> u64 {
    match value {
        Value::Tagged(word) => word,
        other => panic!("expected a tagged value, got {:?}", other),
    }
}

pub fn word32(value: Value) -> u32 {
    match value {
        Value::Word32(word) => word,
        other => panic!("expected a word32, got {:?}", other),
    }
}

pub fn word64(value: Value) -> u64 {
    match value {
        Value::Word64(word) => word,
        other => panic!("expected a word64, got {:?}", other),
    }
}

pub fn float64(value: Value) -> f64 {
    match value {
        Value::Float64(v) => v,
        other => panic!("expected a float64, got {:?}", other),
    }
}

pub fn big_endian() -> LoweringConfig {
    LoweringConfig { endianness: raya_lower::Endianness::Big, ..LoweringConfig::default() }
}

pub fn smi32() -> LoweringConfig {
    LoweringConfig { smi_width: raya_lower::SmiWidth::Bits32, ..LoweringConfig::default() }
}
