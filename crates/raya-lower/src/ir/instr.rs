//! Operations, blocks, and graphs
//!
//! A single vocabulary covers both the value-level operations produced by
//! earlier passes and the machine-level operations lowering turns them into.
//! Every operation lives in a flat arena and is referenced by `OpIndex`;
//! blocks list the operations they execute in order and end in a terminator.

use std::fmt;

use super::types::{AllocationType, BranchHint, MemoryRep, Rep, WordRep, WriteBarrier};
use super::value_ops::*;
use crate::layout::RootIndex;

/// Reference to an operation (and to the value it produces)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpIndex(pub u32);

impl OpIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OpIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Basic block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex(pub u32);

impl BlockIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

// ============================================================================
// Deoptimization
// ============================================================================

/// Why compiled code gave up and resumed in the slow tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptimizeReason {
    LostPrecision,
    LostPrecisionOrNaN,
    MinusZero,
    NotASmi,
    NotAHeapNumber,
    NotANumberOrBoolean,
    NotANumberOrOddball,
    NotAString,
    NotAnArrayIndex,
}

impl fmt::Display for DeoptimizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeoptimizeReason::LostPrecision => "lost precision",
            DeoptimizeReason::LostPrecisionOrNaN => "lost precision or NaN",
            DeoptimizeReason::MinusZero => "minus zero",
            DeoptimizeReason::NotASmi => "not a Smi",
            DeoptimizeReason::NotAHeapNumber => "not a heap number",
            DeoptimizeReason::NotANumberOrBoolean => "not a Number or Boolean",
            DeoptimizeReason::NotANumberOrOddball => "not a Number or Oddball",
            DeoptimizeReason::NotAString => "not a String",
            DeoptimizeReason::NotAnArrayIndex => "not an array index",
        };
        f.write_str(s)
    }
}

/// Opaque token correlating a guard with recorded type feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeedbackSource(pub Option<u32>);

impl FeedbackSource {
    pub fn none() -> Self {
        FeedbackSource(None)
    }
}

impl fmt::Display for FeedbackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(slot) => write!(f, "fb#{}", slot),
            None => write!(f, "fb#-"),
        }
    }
}

/// Reason and feedback attached to a deoptimization exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeoptimizeParameters {
    pub reason: DeoptimizeReason,
    pub feedback: FeedbackSource,
}

// ============================================================================
// Operation kinds
// ============================================================================

/// Runtime functions compiled code may call directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalRef {
    /// `(string) -> i32`, the array index a string spells, or -1
    StringToArrayIndex,
}

impl ExternalRef {
    pub fn return_rep(self) -> Rep {
        match self {
            ExternalRef::StringToArrayIndex => Rep::Word32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExternalRef::StringToArrayIndex => "string_to_array_index",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Word32(u32),
    Word64(u64),
    Float64(f64),
    /// Canonical heap object, resolved when the code is lowered
    Heap(RootIndex),
    External(ExternalRef),
}

impl Constant {
    pub fn rep(&self) -> Rep {
        match self {
            Constant::Word32(_) => Rep::Word32,
            Constant::Word64(_) | Constant::External(_) => Rep::Word64,
            Constant::Float64(_) => Rep::Float64,
            Constant::Heap(_) => Rep::Tagged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordBinopKind {
    Add,
    Sub,
    Mul,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRightArithmetic,
    ShiftRightLogical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonKind {
    Equal,
    SignedLessThan,
    SignedLessThanOrEqual,
    UnsignedLessThan,
    UnsignedLessThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatBinopKind {
    Add,
    Sub,
    Mul,
    Div,
    /// IEEE-754 minimum: NaN propagates, -0 < +0
    Min,
    /// IEEE-754 maximum: NaN propagates, -0 < +0
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    SignExtend32To64,
    ZeroExtend32To64,
    Truncate64To32,
    Int32ToFloat64,
    Uint32ToFloat64,
    Int64ToFloat64,
    Uint64ToFloat64,
    /// Result is unspecified when the value is NaN or out of range
    TruncateFloat64ToInt32,
    /// Result is unspecified when the value is NaN or out of range
    TruncateFloat64ToInt64,
    /// Result is unspecified when the value is NaN or out of range
    TruncateFloat64ToUint32,
    Float64ExtractHighWord32,
    BitcastTaggedToWord,
    BitcastWordToTagged,
}

impl ChangeKind {
    pub fn from_rep(self) -> Rep {
        match self {
            ChangeKind::SignExtend32To64
            | ChangeKind::ZeroExtend32To64
            | ChangeKind::Int32ToFloat64
            | ChangeKind::Uint32ToFloat64 => Rep::Word32,
            ChangeKind::Truncate64To32
            | ChangeKind::Int64ToFloat64
            | ChangeKind::Uint64ToFloat64
            | ChangeKind::BitcastWordToTagged => Rep::Word64,
            ChangeKind::TruncateFloat64ToInt32
            | ChangeKind::TruncateFloat64ToInt64
            | ChangeKind::TruncateFloat64ToUint32
            | ChangeKind::Float64ExtractHighWord32 => Rep::Float64,
            ChangeKind::BitcastTaggedToWord => Rep::Tagged,
        }
    }

    pub fn to_rep(self) -> Rep {
        match self {
            ChangeKind::Truncate64To32
            | ChangeKind::TruncateFloat64ToInt32
            | ChangeKind::TruncateFloat64ToUint32
            | ChangeKind::Float64ExtractHighWord32 => Rep::Word32,
            ChangeKind::SignExtend32To64
            | ChangeKind::ZeroExtend32To64
            | ChangeKind::TruncateFloat64ToInt64
            | ChangeKind::BitcastTaggedToWord => Rep::Word64,
            ChangeKind::Int32ToFloat64
            | ChangeKind::Uint32ToFloat64
            | ChangeKind::Int64ToFloat64
            | ChangeKind::Uint64ToFloat64 => Rep::Float64,
            ChangeKind::BitcastWordToTagged => Rep::Tagged,
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// A graph operation
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ===== Inputs =====
    Parameter { index: u32, rep: Rep },
    Constant(Constant),
    /// Opaque snapshot a deoptimization resumes from
    FrameState { id: u32 },

    // ===== Arithmetic =====
    WordBinop { kind: WordBinopKind, rep: WordRep, left: OpIndex, right: OpIndex },
    /// Signed 32-bit add producing (result, overflow bit)
    Int32AddCheckOverflow { left: OpIndex, right: OpIndex },
    Projection { input: OpIndex, index: u8 },
    Comparison { kind: ComparisonKind, rep: Rep, left: OpIndex, right: OpIndex },
    FloatBinop { kind: FloatBinopKind, left: OpIndex, right: OpIndex },
    Change { kind: ChangeKind, input: OpIndex },

    // ===== Memory =====
    /// Reads `base - tag + offset + (index << element_size_log2)`
    Load {
        base: OpIndex,
        index: Option<OpIndex>,
        offset: i32,
        element_size_log2: u8,
        rep: MemoryRep,
    },
    Store {
        base: OpIndex,
        index: Option<OpIndex>,
        value: OpIndex,
        offset: i32,
        element_size_log2: u8,
        rep: MemoryRep,
        write_barrier: WriteBarrier,
    },
    /// Uninitialized storage of `size` bytes from the managed heap
    Allocate { size: OpIndex, allocation: AllocationType },
    Call { callee: ExternalRef, args: Vec<OpIndex> },

    // ===== SSA =====
    Phi { inputs: Vec<OpIndex>, rep: Rep },
    /// Loop header phi whose back-edge input is not known yet
    PendingLoopPhi { first: OpIndex, rep: Rep },

    // ===== Guards =====
    DeoptimizeIf {
        condition: OpIndex,
        negated: bool,
        frame_state: OpIndex,
        parameters: DeoptimizeParameters,
    },

    // ===== Value-level operations =====
    ChangeOrDeopt {
        input: OpIndex,
        frame_state: OpIndex,
        kind: ChangeOrDeoptKind,
        minus_zero: MinusZeroMode,
        feedback: FeedbackSource,
    },
    ObjectIs { input: OpIndex, kind: ObjectIsKind, assumptions: ObjectIsAssumptions },
    ConvertToObject {
        input: OpIndex,
        kind: ConvertToObjectKind,
        input_rep: Rep,
        interpretation: InputInterpretation,
        minus_zero: MinusZeroMode,
    },
    ConvertObjectToPrimitive {
        object: OpIndex,
        kind: ToPrimitiveKind,
        assumptions: ToPrimitiveAssumptions,
    },
    ConvertObjectToPrimitiveOrDeopt {
        object: OpIndex,
        frame_state: OpIndex,
        from: DeoptObjectKind,
        to: DeoptPrimitiveKind,
        minus_zero: MinusZeroMode,
        feedback: FeedbackSource,
    },
    NewConsString { length: OpIndex, first: OpIndex, second: OpIndex },
    NewArray { length: OpIndex, kind: NewArrayKind, allocation: AllocationType },
    DoubleArrayMinMax { array: OpIndex, kind: MinMaxKind },
    LoadFieldByIndex { object: OpIndex, field_index: OpIndex },
}

impl Op {
    /// Representation of the value this operation produces, if any
    pub fn result_rep(&self) -> Option<Rep> {
        match self {
            Op::Parameter { rep, .. } => Some(*rep),
            Op::Constant(c) => Some(c.rep()),
            Op::FrameState { .. } => None,
            Op::WordBinop { rep, .. } => Some(rep.rep()),
            Op::Int32AddCheckOverflow { .. } => Some(Rep::Tuple),
            Op::Projection { .. } => Some(Rep::Word32),
            Op::Comparison { .. } => Some(Rep::Word32),
            Op::FloatBinop { .. } => Some(Rep::Float64),
            Op::Change { kind, .. } => Some(kind.to_rep()),
            Op::Load { rep, .. } => Some(rep.register_rep()),
            Op::Store { .. } => None,
            Op::Allocate { .. } => Some(Rep::Tagged),
            Op::Call { callee, .. } => Some(callee.return_rep()),
            Op::Phi { rep, .. } | Op::PendingLoopPhi { rep, .. } => Some(*rep),
            Op::DeoptimizeIf { .. } => None,
            Op::ChangeOrDeopt { kind, .. } => Some(kind.output_rep()),
            Op::ObjectIs { .. } => Some(Rep::Word32),
            Op::ConvertToObject { .. } => Some(Rep::Tagged),
            Op::ConvertObjectToPrimitive { kind, .. } => Some(kind.output_rep()),
            Op::ConvertObjectToPrimitiveOrDeopt { to, .. } => Some(to.output_rep()),
            Op::NewConsString { .. }
            | Op::NewArray { .. }
            | Op::DoubleArrayMinMax { .. }
            | Op::LoadFieldByIndex { .. } => Some(Rep::Tagged),
        }
    }

    /// Whether this operation belongs to the value-level vocabulary that
    /// lowering must remove
    pub fn is_value_level(&self) -> bool {
        matches!(
            self,
            Op::ChangeOrDeopt { .. }
                | Op::ObjectIs { .. }
                | Op::ConvertToObject { .. }
                | Op::ConvertObjectToPrimitive { .. }
                | Op::ConvertObjectToPrimitiveOrDeopt { .. }
                | Op::NewConsString { .. }
                | Op::NewArray { .. }
                | Op::DoubleArrayMinMax { .. }
                | Op::LoadFieldByIndex { .. }
        )
    }

    /// Short name used in logs
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Parameter { .. } => "parameter",
            Op::Constant(_) => "constant",
            Op::FrameState { .. } => "frame_state",
            Op::WordBinop { .. } => "word_binop",
            Op::Int32AddCheckOverflow { .. } => "int32_add_check_overflow",
            Op::Projection { .. } => "projection",
            Op::Comparison { .. } => "comparison",
            Op::FloatBinop { .. } => "float_binop",
            Op::Change { .. } => "change",
            Op::Load { .. } => "load",
            Op::Store { .. } => "store",
            Op::Allocate { .. } => "allocate",
            Op::Call { .. } => "call",
            Op::Phi { .. } => "phi",
            Op::PendingLoopPhi { .. } => "pending_loop_phi",
            Op::DeoptimizeIf { .. } => "deoptimize_if",
            Op::ChangeOrDeopt { .. } => "change_or_deopt",
            Op::ObjectIs { .. } => "object_is",
            Op::ConvertToObject { .. } => "convert_to_object",
            Op::ConvertObjectToPrimitive { .. } => "convert_object_to_primitive",
            Op::ConvertObjectToPrimitiveOrDeopt { .. } => "convert_object_to_primitive_or_deopt",
            Op::NewConsString { .. } => "new_cons_string",
            Op::NewArray { .. } => "new_array",
            Op::DoubleArrayMinMax { .. } => "double_array_min_max",
            Op::LoadFieldByIndex { .. } => "load_field_by_index",
        }
    }

    /// Operands of this operation, in a fixed order
    pub fn inputs(&self) -> Vec<OpIndex> {
        match self {
            Op::Parameter { .. } | Op::Constant(_) | Op::FrameState { .. } => vec![],
            Op::WordBinop { left, right, .. }
            | Op::Int32AddCheckOverflow { left, right }
            | Op::Comparison { left, right, .. }
            | Op::FloatBinop { left, right, .. } => vec![*left, *right],
            Op::Projection { input, .. } | Op::Change { input, .. } => vec![*input],
            Op::Load { base, index, .. } => {
                let mut v = vec![*base];
                v.extend(index.iter().copied());
                v
            }
            Op::Store { base, index, value, .. } => {
                let mut v = vec![*base];
                v.extend(index.iter().copied());
                v.push(*value);
                v
            }
            Op::Allocate { size, .. } => vec![*size],
            Op::Call { args, .. } => args.clone(),
            Op::Phi { inputs, .. } => inputs.clone(),
            Op::PendingLoopPhi { first, .. } => vec![*first],
            Op::DeoptimizeIf { condition, frame_state, .. } => vec![*condition, *frame_state],
            Op::ChangeOrDeopt { input, frame_state, .. } => vec![*input, *frame_state],
            Op::ObjectIs { input, .. } | Op::ConvertToObject { input, .. } => vec![*input],
            Op::ConvertObjectToPrimitive { object, .. } => vec![*object],
            Op::ConvertObjectToPrimitiveOrDeopt { object, frame_state, .. } => {
                vec![*object, *frame_state]
            }
            Op::NewConsString { length, first, second } => vec![*length, *first, *second],
            Op::NewArray { length, .. } => vec![*length],
            Op::DoubleArrayMinMax { array, .. } => vec![*array],
            Op::LoadFieldByIndex { object, field_index } => vec![*object, *field_index],
        }
    }

    /// Copy of this operation with every operand passed through `f`
    pub fn map_inputs(&self, mut f: impl FnMut(OpIndex) -> OpIndex) -> Op {
        let mut op = self.clone();
        match &mut op {
            Op::Parameter { .. } | Op::Constant(_) | Op::FrameState { .. } => {}
            Op::WordBinop { left, right, .. }
            | Op::Int32AddCheckOverflow { left, right }
            | Op::Comparison { left, right, .. }
            | Op::FloatBinop { left, right, .. } => {
                *left = f(*left);
                *right = f(*right);
            }
            Op::Projection { input, .. } | Op::Change { input, .. } => *input = f(*input),
            Op::Load { base, index, .. } => {
                *base = f(*base);
                if let Some(index) = index {
                    *index = f(*index);
                }
            }
            Op::Store { base, index, value, .. } => {
                *base = f(*base);
                if let Some(index) = index {
                    *index = f(*index);
                }
                *value = f(*value);
            }
            Op::Allocate { size, .. } => *size = f(*size),
            Op::Call { args, .. } => args.iter_mut().for_each(|a| *a = f(*a)),
            Op::Phi { inputs, .. } => inputs.iter_mut().for_each(|i| *i = f(*i)),
            Op::PendingLoopPhi { first, .. } => *first = f(*first),
            Op::DeoptimizeIf { condition, frame_state, .. } => {
                *condition = f(*condition);
                *frame_state = f(*frame_state);
            }
            Op::ChangeOrDeopt { input, frame_state, .. } => {
                *input = f(*input);
                *frame_state = f(*frame_state);
            }
            Op::ObjectIs { input, .. } | Op::ConvertToObject { input, .. } => *input = f(*input),
            Op::ConvertObjectToPrimitive { object, .. } => *object = f(*object),
            Op::ConvertObjectToPrimitiveOrDeopt { object, frame_state, .. } => {
                *object = f(*object);
                *frame_state = f(*frame_state);
            }
            Op::NewConsString { length, first, second } => {
                *length = f(*length);
                *first = f(*first);
                *second = f(*second);
            }
            Op::NewArray { length, .. } => *length = f(*length),
            Op::DoubleArrayMinMax { array, .. } => *array = f(*array),
            Op::LoadFieldByIndex { object, field_index } => {
                *object = f(*object);
                *field_index = f(*field_index);
            }
        }
        op
    }
}

// ============================================================================
// Blocks and graphs
// ============================================================================

/// How a block ends
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Goto(BlockIndex),
    Branch {
        condition: OpIndex,
        if_true: BlockIndex,
        if_false: BlockIndex,
        hint: BranchHint,
    },
    Return(Vec<OpIndex>),
    /// Unconditional exit to the slow tier
    Deoptimize {
        frame_state: OpIndex,
        parameters: DeoptimizeParameters,
    },
    Unreachable,
    /// Placeholder terminator (not yet assigned)
    None,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockIndex> {
        match self {
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch { if_true, if_false, .. } => vec![*if_true, *if_false],
            _ => vec![],
        }
    }

    pub fn inputs(&self) -> Vec<OpIndex> {
        match self {
            Terminator::Branch { condition, .. } => vec![*condition],
            Terminator::Return(values) => values.clone(),
            Terminator::Deoptimize { frame_state, .. } => vec![*frame_state],
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Merge,
    /// Loop header: one forward predecessor, one back edge
    Loop,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockIndex,
    pub kind: BlockKind,
    pub ops: Vec<OpIndex>,
    pub terminator: Terminator,
    /// Predecessors in the order their edges were emitted; phi inputs follow
    /// the same order
    pub predecessors: Vec<BlockIndex>,
    /// Input block this block was produced from, when built by a copying phase
    pub origin: Option<BlockIndex>,
}

impl Block {
    pub fn is_loop(&self) -> bool {
        self.kind == BlockKind::Loop
    }
}

/// A function-sized graph of blocks over a flat operation arena
#[derive(Debug, Clone)]
pub struct Graph {
    /// Function name (for debugging)
    pub name: String,
    ops: Vec<Op>,
    op_blocks: Vec<BlockIndex>,
    pub blocks: Vec<Block>,
    /// Blocks in the order they were bound; unbound blocks are dead
    layout: Vec<BlockIndex>,
    pub entry: BlockIndex,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            ops: vec![],
            op_blocks: vec![],
            blocks: vec![],
            layout: vec![],
            entry: BlockIndex(0),
        }
    }

    pub fn add_block(&mut self, kind: BlockKind) -> BlockIndex {
        let id = BlockIndex(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            kind,
            ops: vec![],
            terminator: Terminator::None,
            predecessors: vec![],
            origin: None,
        });
        id
    }

    /// Place `block` next in the layout
    pub fn bind(&mut self, block: BlockIndex) {
        debug_assert!(!self.layout.contains(&block), "{} bound twice", block);
        self.layout.push(block);
    }

    pub fn layout(&self) -> &[BlockIndex] {
        &self.layout
    }

    /// Bound blocks in layout order
    pub fn live_blocks(&self) -> impl Iterator<Item = &Block> {
        self.layout.iter().map(|id| &self.blocks[id.index()])
    }

    /// Append `op` to `block` and return its index
    pub fn add_op(&mut self, block: BlockIndex, op: Op) -> OpIndex {
        let index = OpIndex(self.ops.len() as u32);
        self.ops.push(op);
        self.op_blocks.push(block);
        self.blocks[block.index()].ops.push(index);
        index
    }

    pub fn op(&self, index: OpIndex) -> &Op {
        &self.ops[index.index()]
    }

    pub fn op_mut(&mut self, index: OpIndex) -> &mut Op {
        &mut self.ops[index.index()]
    }

    /// Block an operation was emitted into
    pub fn op_block(&self, index: OpIndex) -> BlockIndex {
        self.op_blocks[index.index()]
    }

    pub fn rep(&self, index: OpIndex) -> Option<Rep> {
        self.op(index).result_rep()
    }

    pub fn block(&self, id: BlockIndex) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockIndex) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// All operations with their indices, in arena order
    pub fn ops(&self) -> impl Iterator<Item = (OpIndex, &Op)> {
        self.ops.iter().enumerate().map(|(i, op)| (OpIndex(i as u32), op))
    }

    /// Number of value-level operations still present
    pub fn value_level_op_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_value_level()).count()
    }

    /// Count operations matching a predicate (used by tests and dumps)
    pub fn count_ops(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }
}
