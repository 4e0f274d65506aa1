//! Reference evaluator for machine-level graphs
//!
//! Executes a lowered graph against a [`SimHeap`] so tests can observe what
//! compiled code would do: the returned values, the objects it allocated,
//! and which guard (if any) sent it back to the slow tier.
//!
//! Float-to-integer truncations follow x86-64 `cvttsd2si`: NaN and
//! out-of-range inputs produce the "integer indefinite" value (the minimum
//! signed integer of the target width).

pub mod heap;

pub use heap::{AllocationRecord, SimHeap};

use thiserror::Error;
use tracing::trace;

use crate::config::LoweringConfig;
use crate::ir::instr::{
    BlockIndex, ChangeKind, ComparisonKind, Constant, DeoptimizeReason, ExternalRef, FeedbackSource,
    FloatBinopKind, Graph, Op, OpIndex, Terminator, WordBinopKind,
};
use crate::ir::types::{MemoryRep, Rep, WordRep};
use crate::layout::HEAP_OBJECT_TAG;

/// A runtime value in a register
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Word32(u32),
    Word64(u64),
    Float64(f64),
    Tagged(u64),
    /// Result and overflow bit of a checked operation
    Tuple(u32, bool),
}

impl Value {
    pub fn rep(self) -> Rep {
        match self {
            Value::Word32(_) => Rep::Word32,
            Value::Word64(_) => Rep::Word64,
            Value::Float64(_) => Rep::Float64,
            Value::Tagged(_) => Rep::Tagged,
            Value::Tuple(..) => Rep::Tuple,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Vec<Value>),
    Deoptimized {
        reason: DeoptimizeReason,
        feedback: FeedbackSource,
        frame_state: u32,
    },
}

impl Outcome {
    /// The single returned value; panics on deoptimization
    pub fn value(&self) -> Value {
        match self {
            Outcome::Returned(values) if values.len() == 1 => values[0],
            other => panic!("expected a single returned value, got {:?}", other),
        }
    }

    pub fn deopt_reason(&self) -> Option<DeoptimizeReason> {
        match self {
            Outcome::Deoptimized { reason, .. } => Some(*reason),
            Outcome::Returned(_) => None,
        }
    }
}

/// Errors raised while evaluating a graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("expected {expected} arguments, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("argument {index} should be {expected}, got {found}")]
    ArgumentRep { index: u32, expected: Rep, found: Rep },

    #[error("{op} ({mnemonic}) received an operand of the wrong representation")]
    OperandRep { op: OpIndex, mnemonic: &'static str },

    #[error("{0} is not a frame state")]
    NotAFrameState(OpIndex),

    #[error("{0} has no value yet")]
    Undefined(OpIndex),

    #[error("{op} ({mnemonic}) cannot be evaluated")]
    Unsupported { op: OpIndex, mnemonic: &'static str },

    #[error("memory access of {size} bytes at {address:#x} is out of bounds")]
    OutOfBounds { address: u64, size: usize },

    #[error("heap exhausted allocating {requested} bytes")]
    OutOfMemory { requested: u64 },

    #[error("{0:#x} is not a heap object")]
    NotAHeapObject(u64),

    #[error("{0:#x} is not a Smi")]
    NotASmi(u64),

    #[error("block {0} was entered from a block that is not its predecessor")]
    BadEdge(BlockIndex),

    #[error("reached unreachable code in {0}")]
    ReachedUnreachable(BlockIndex),

    #[error("evaluation ran out of fuel after {0} steps")]
    OutOfFuel(u64),
}

/// Evaluator over a simulated heap
pub struct Machine {
    heap: SimHeap,
    fuel: u64,
}

impl Machine {
    pub fn new(config: &LoweringConfig) -> Result<Self, EvalError> {
        Ok(Machine {
            heap: SimHeap::new(config)?,
            fuel: config.eval_fuel,
        })
    }

    pub fn heap(&self) -> &SimHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut SimHeap {
        &mut self.heap
    }

    /// Run `graph` with `args` bound to its parameters
    pub fn run(&mut self, graph: &Graph, args: &[Value]) -> Result<Outcome, EvalError> {
        let parameters = graph.count_ops(|op| matches!(op, Op::Parameter { .. }));
        if parameters > args.len() {
            return Err(EvalError::ArgumentCount { expected: parameters, found: args.len() });
        }

        let mut values: Vec<Option<Value>> = vec![None; graph.op_count()];
        let mut steps: u64 = 0;
        let mut previous: Option<BlockIndex> = None;
        let mut current = graph.entry;

        loop {
            let block = graph.block(current);
            trace!(block = %current, "enter");

            // Phis read their inputs all at once, on entry.
            let edge = match previous {
                Some(pred) => Some(
                    block
                        .predecessors
                        .iter()
                        .position(|&p| p == pred)
                        .ok_or(EvalError::BadEdge(current))?,
                ),
                None => None,
            };
            let mut phi_values = Vec::new();
            for &index in &block.ops {
                let Op::Phi { inputs, .. } = graph.op(index) else {
                    continue;
                };
                let Some(edge) = edge else {
                    return Err(EvalError::BadEdge(current));
                };
                phi_values.push((index, read(&values, inputs[edge])?));
            }
            for (index, value) in phi_values {
                values[index.index()] = Some(value);
            }

            for &index in &block.ops {
                steps += 1;
                if steps > self.fuel {
                    return Err(EvalError::OutOfFuel(self.fuel));
                }
                let op = graph.op(index);
                match op {
                    Op::Phi { .. } => continue,
                    Op::DeoptimizeIf { condition, negated, frame_state, parameters } => {
                        let taken = truthy(index, op, read(&values, *condition)?)? != *negated;
                        if taken {
                            return Ok(Outcome::Deoptimized {
                                reason: parameters.reason,
                                feedback: parameters.feedback,
                                frame_state: frame_state_id(graph, *frame_state)?,
                            });
                        }
                        continue;
                    }
                    _ => {}
                }
                if let Some(value) = self.step(graph, index, &values, args)? {
                    values[index.index()] = Some(value);
                }
            }

            previous = Some(current);
            current = match &block.terminator {
                Terminator::Goto(next) => *next,
                Terminator::Branch { condition, if_true, if_false, .. } => {
                    let value = read(&values, *condition)?;
                    let op = graph.op(*condition);
                    if truthy(*condition, op, value)? {
                        *if_true
                    } else {
                        *if_false
                    }
                }
                Terminator::Return(results) => {
                    let results = results.iter().map(|&v| read(&values, v)).collect::<Result<_, _>>()?;
                    return Ok(Outcome::Returned(results));
                }
                Terminator::Deoptimize { frame_state, parameters } => {
                    return Ok(Outcome::Deoptimized {
                        reason: parameters.reason,
                        feedback: parameters.feedback,
                        frame_state: frame_state_id(graph, *frame_state)?,
                    });
                }
                Terminator::Unreachable | Terminator::None => {
                    return Err(EvalError::ReachedUnreachable(current));
                }
            };
        }
    }

    /// Evaluate one non-phi, non-guard operation
    fn step(
        &mut self,
        graph: &Graph,
        index: OpIndex,
        values: &[Option<Value>],
        args: &[Value],
    ) -> Result<Option<Value>, EvalError> {
        let op = graph.op(index);
        let bad_operand = || EvalError::OperandRep { op: index, mnemonic: op.mnemonic() };
        let get = |operand: OpIndex| read(values, operand);

        let value = match op {
            Op::Parameter { index: param, rep } => {
                let arg = *args
                    .get(*param as usize)
                    .ok_or(EvalError::ArgumentCount { expected: *param as usize + 1, found: args.len() })?;
                if arg.rep() != *rep {
                    return Err(EvalError::ArgumentRep { index: *param, expected: *rep, found: arg.rep() });
                }
                arg
            }
            Op::Constant(constant) => match *constant {
                Constant::Word32(v) => Value::Word32(v),
                Constant::Word64(v) => Value::Word64(v),
                Constant::Float64(v) => Value::Float64(v),
                Constant::Heap(root) => Value::Tagged(self.heap.root(root)),
                Constant::External(external) => Value::Word64(external_address(external)),
            },
            Op::FrameState { .. } => return Ok(None),
            Op::WordBinop { kind, rep, left, right } => match (rep, get(*left)?, get(*right)?) {
                (WordRep::Word32, Value::Word32(a), Value::Word32(b)) => Value::Word32(word32_binop(*kind, a, b)),
                (WordRep::Word64, Value::Word64(a), Value::Word64(b)) => Value::Word64(word64_binop(*kind, a, b)),
                _ => return Err(bad_operand()),
            },
            Op::Int32AddCheckOverflow { left, right } => match (get(*left)?, get(*right)?) {
                (Value::Word32(a), Value::Word32(b)) => {
                    let (sum, overflow) = (a as i32).overflowing_add(b as i32);
                    Value::Tuple(sum as u32, overflow)
                }
                _ => return Err(bad_operand()),
            },
            Op::Projection { input, index: projection } => match get(*input)? {
                Value::Tuple(result, overflow) => {
                    Value::Word32(if *projection == 0 { result } else { overflow as u32 })
                }
                _ => return Err(bad_operand()),
            },
            Op::Comparison { kind, rep, left, right } => {
                let holds = compare(*kind, *rep, get(*left)?, get(*right)?).ok_or_else(bad_operand)?;
                Value::Word32(holds as u32)
            }
            Op::FloatBinop { kind, left, right } => match (get(*left)?, get(*right)?) {
                (Value::Float64(a), Value::Float64(b)) => Value::Float64(float64_binop(*kind, a, b)),
                _ => return Err(bad_operand()),
            },
            Op::Change { kind, input } => change(*kind, get(*input)?).ok_or_else(bad_operand)?,
            Op::Load { base, index: element, offset, element_size_log2, rep } => {
                let address = effective_address(get(*base)?, element.map(get).transpose()?, *offset, *element_size_log2)
                    .ok_or_else(bad_operand)?;
                self.load(address, *rep)?
            }
            Op::Store { base, index: element, value, offset, element_size_log2, rep, .. } => {
                let address = effective_address(get(*base)?, element.map(get).transpose()?, *offset, *element_size_log2)
                    .ok_or_else(bad_operand)?;
                self.store(address, *rep, get(*value)?).ok_or_else(bad_operand)??;
                return Ok(None);
            }
            Op::Allocate { size, allocation } => match get(*size)? {
                Value::Word64(size) => Value::Tagged(self.heap.allocate(size, *allocation)?),
                _ => return Err(bad_operand()),
            },
            Op::Call { callee: ExternalRef::StringToArrayIndex, args: call_args } => {
                match call_args.first().map(|&a| get(a)).transpose()? {
                    Some(Value::Tagged(object)) => {
                        Value::Word32(self.heap.string_to_array_index(object)? as u32)
                    }
                    _ => return Err(bad_operand()),
                }
            }
            _ => return Err(EvalError::Unsupported { op: index, mnemonic: op.mnemonic() }),
        };
        Ok(Some(value))
    }

    fn load(&self, address: u64, rep: MemoryRep) -> Result<Value, EvalError> {
        let heap = &self.heap;
        Ok(match rep {
            MemoryRep::Int8 => Value::Word32(heap.read_u8(address)? as i8 as i32 as u32),
            MemoryRep::Uint8 => Value::Word32(heap.read_u8(address)? as u32),
            MemoryRep::Int16 => Value::Word32(heap.read_u16(address)? as i16 as i32 as u32),
            MemoryRep::Uint16 => Value::Word32(heap.read_u16(address)? as u32),
            MemoryRep::Int32 | MemoryRep::Uint32 => Value::Word32(heap.read_u32(address)?),
            MemoryRep::Int64 | MemoryRep::Uint64 => Value::Word64(heap.read_u64(address)?),
            MemoryRep::Float64 => Value::Float64(heap.read_f64(address)?),
            MemoryRep::AnyTagged | MemoryRep::TaggedSigned | MemoryRep::TaggedPointer => {
                Value::Tagged(heap.read_u64(address)?)
            }
        })
    }

    /// `None` when `value` cannot be stored as `rep`
    fn store(&mut self, address: u64, rep: MemoryRep, value: Value) -> Option<Result<(), EvalError>> {
        let heap = &mut self.heap;
        Some(match (rep, value) {
            (MemoryRep::Int8 | MemoryRep::Uint8, Value::Word32(v)) => heap.write_u8(address, v as u8),
            (MemoryRep::Int16 | MemoryRep::Uint16, Value::Word32(v)) => heap.write_u16(address, v as u16),
            (MemoryRep::Int32 | MemoryRep::Uint32, Value::Word32(v)) => heap.write_u32(address, v),
            (MemoryRep::Int64 | MemoryRep::Uint64, Value::Word64(v)) => heap.write_u64(address, v),
            (MemoryRep::Float64, Value::Float64(v)) => heap.write_f64(address, v),
            (MemoryRep::AnyTagged | MemoryRep::TaggedSigned | MemoryRep::TaggedPointer, Value::Tagged(v)) => {
                heap.write_u64(address, v)
            }
            _ => return None,
        })
    }
}

fn read(values: &[Option<Value>], operand: OpIndex) -> Result<Value, EvalError> {
    values[operand.index()].ok_or(EvalError::Undefined(operand))
}

fn truthy(index: OpIndex, op: &Op, value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Word32(v) => Ok(v != 0),
        Value::Word64(v) => Ok(v != 0),
        _ => Err(EvalError::OperandRep { op: index, mnemonic: op.mnemonic() }),
    }
}

fn frame_state_id(graph: &Graph, frame_state: OpIndex) -> Result<u32, EvalError> {
    match graph.op(frame_state) {
        Op::FrameState { id } => Ok(*id),
        _ => Err(EvalError::NotAFrameState(frame_state)),
    }
}

fn external_address(external: ExternalRef) -> u64 {
    match external {
        ExternalRef::StringToArrayIndex => 0xE000_0000,
    }
}

/// `base - tag + offset + (index << scale)`
fn effective_address(base: Value, index: Option<Value>, offset: i32, scale: u8) -> Option<u64> {
    let base = match base {
        Value::Tagged(word) => word.wrapping_sub(HEAP_OBJECT_TAG),
        _ => return None,
    };
    let scaled = match index {
        None => 0,
        Some(Value::Word64(i)) => i.wrapping_shl(scale as u32),
        Some(_) => return None,
    };
    Some(base.wrapping_add(offset as i64 as u64).wrapping_add(scaled))
}

fn word32_binop(kind: WordBinopKind, a: u32, b: u32) -> u32 {
    match kind {
        WordBinopKind::Add => a.wrapping_add(b),
        WordBinopKind::Sub => a.wrapping_sub(b),
        WordBinopKind::Mul => a.wrapping_mul(b),
        WordBinopKind::BitwiseAnd => a & b,
        WordBinopKind::BitwiseOr => a | b,
        WordBinopKind::BitwiseXor => a ^ b,
        WordBinopKind::ShiftLeft => a.wrapping_shl(b),
        WordBinopKind::ShiftRightArithmetic => (a as i32).wrapping_shr(b) as u32,
        WordBinopKind::ShiftRightLogical => a.wrapping_shr(b),
    }
}

fn word64_binop(kind: WordBinopKind, a: u64, b: u64) -> u64 {
    let shift = b as u32;
    match kind {
        WordBinopKind::Add => a.wrapping_add(b),
        WordBinopKind::Sub => a.wrapping_sub(b),
        WordBinopKind::Mul => a.wrapping_mul(b),
        WordBinopKind::BitwiseAnd => a & b,
        WordBinopKind::BitwiseOr => a | b,
        WordBinopKind::BitwiseXor => a ^ b,
        WordBinopKind::ShiftLeft => a.wrapping_shl(shift),
        WordBinopKind::ShiftRightArithmetic => (a as i64).wrapping_shr(shift) as u64,
        WordBinopKind::ShiftRightLogical => a.wrapping_shr(shift),
    }
}

fn compare(kind: ComparisonKind, rep: Rep, left: Value, right: Value) -> Option<bool> {
    use ComparisonKind::*;
    Some(match (rep, left, right) {
        (Rep::Word32, Value::Word32(a), Value::Word32(b)) => match kind {
            Equal => a == b,
            SignedLessThan => (a as i32) < (b as i32),
            SignedLessThanOrEqual => (a as i32) <= (b as i32),
            UnsignedLessThan => a < b,
            UnsignedLessThanOrEqual => a <= b,
        },
        (Rep::Word64, Value::Word64(a), Value::Word64(b)) => match kind {
            Equal => a == b,
            SignedLessThan => (a as i64) < (b as i64),
            SignedLessThanOrEqual => (a as i64) <= (b as i64),
            UnsignedLessThan => a < b,
            UnsignedLessThanOrEqual => a <= b,
        },
        (Rep::Float64, Value::Float64(a), Value::Float64(b)) => match kind {
            Equal => a == b,
            SignedLessThan => a < b,
            SignedLessThanOrEqual => a <= b,
            UnsignedLessThan | UnsignedLessThanOrEqual => return None,
        },
        (Rep::Tagged, Value::Tagged(a), Value::Tagged(b)) if kind == Equal => a == b,
        _ => return None,
    })
}

/// IEEE-754 arithmetic; min/max propagate NaN and order -0.0 below +0.0
fn float64_binop(kind: FloatBinopKind, a: f64, b: f64) -> f64 {
    match kind {
        FloatBinopKind::Add => a + b,
        FloatBinopKind::Sub => a - b,
        FloatBinopKind::Mul => a * b,
        FloatBinopKind::Div => a / b,
        FloatBinopKind::Min | FloatBinopKind::Max if a.is_nan() || b.is_nan() => f64::NAN,
        FloatBinopKind::Min if a == b => {
            if a.is_sign_negative() {
                a
            } else {
                b
            }
        }
        FloatBinopKind::Max if a == b => {
            if a.is_sign_positive() {
                a
            } else {
                b
            }
        }
        FloatBinopKind::Min => a.min(b),
        FloatBinopKind::Max => a.max(b),
    }
}

/// x86-64 `cvttsd2si` into 32 bits
pub fn truncate_float64_to_int32(value: f64) -> i32 {
    if value.is_nan() || value <= i32::MIN as f64 - 1.0 || value >= i32::MAX as f64 + 1.0 {
        return i32::MIN;
    }
    value.trunc() as i32
}

/// x86-64 `cvttsd2si` into 64 bits
pub fn truncate_float64_to_int64(value: f64) -> i64 {
    // i64::MIN is exactly representable; 2^63 is the first value out of range.
    if value.is_nan() || value < i64::MIN as f64 || value >= 9_223_372_036_854_775_808.0 {
        return i64::MIN;
    }
    value.trunc() as i64
}

fn change(kind: ChangeKind, input: Value) -> Option<Value> {
    Some(match (kind, input) {
        (ChangeKind::SignExtend32To64, Value::Word32(v)) => Value::Word64(v as i32 as i64 as u64),
        (ChangeKind::ZeroExtend32To64, Value::Word32(v)) => Value::Word64(v as u64),
        (ChangeKind::Truncate64To32, Value::Word64(v)) => Value::Word32(v as u32),
        (ChangeKind::Int32ToFloat64, Value::Word32(v)) => Value::Float64(v as i32 as f64),
        (ChangeKind::Uint32ToFloat64, Value::Word32(v)) => Value::Float64(v as f64),
        (ChangeKind::Int64ToFloat64, Value::Word64(v)) => Value::Float64(v as i64 as f64),
        (ChangeKind::Uint64ToFloat64, Value::Word64(v)) => Value::Float64(v as f64),
        (ChangeKind::TruncateFloat64ToInt32, Value::Float64(v)) => {
            Value::Word32(truncate_float64_to_int32(v) as u32)
        }
        (ChangeKind::TruncateFloat64ToInt64, Value::Float64(v)) => {
            Value::Word64(truncate_float64_to_int64(v) as u64)
        }
        // Truncated through 64 bits, keeping the low word.
        (ChangeKind::TruncateFloat64ToUint32, Value::Float64(v)) => {
            Value::Word32(truncate_float64_to_int64(v) as u32)
        }
        (ChangeKind::Float64ExtractHighWord32, Value::Float64(v)) => Value::Word32((v.to_bits() >> 32) as u32),
        (ChangeKind::BitcastTaggedToWord, Value::Tagged(v)) => Value::Word64(v),
        (ChangeKind::BitcastWordToTagged, Value::Word64(v)) => Value::Tagged(v),
        _ => return None,
    })
}
