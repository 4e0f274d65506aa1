//! Graph assembler
//!
//! Emits machine-level operations into an output graph. The assembler tracks
//! a current block; control-flow helpers end it and bind new ones. Once the
//! current block has been terminated, code is unreachable until the next
//! successful bind: further jumps are ignored and emitting an operation is a
//! contract violation.
//!
//! Structured helpers (labels, loops, if/else) live in [`label`].

pub mod label;

pub use label::Label;

use crate::config::LoweringConfig;
use crate::ir::instr::*;
use crate::ir::types::{AllocationType, BranchHint, MemoryRep, Rep, WordRep, WriteBarrier};
use crate::layout::{ElementAccess, FieldAccess, RootIndex};

/// Open `if` scope waiting for `else_` / `end_if`
#[derive(Debug)]
struct IfScope {
    else_block: BlockIndex,
    merge: BlockIndex,
    else_bound: bool,
}

/// Builder that emits operations into an owned output graph
pub struct Assembler {
    graph: Graph,
    config: LoweringConfig,
    current: Option<BlockIndex>,
    origin: Option<BlockIndex>,
    if_scopes: Vec<IfScope>,
}

macro_rules! word_binops {
    ($($name:ident => ($kind:ident, $rep:ident)),* $(,)?) => {
        $(
            pub fn $name(&mut self, left: OpIndex, right: OpIndex) -> OpIndex {
                self.emit(Op::WordBinop { kind: WordBinopKind::$kind, rep: WordRep::$rep, left, right })
            }
        )*
    };
}

macro_rules! comparisons {
    ($($name:ident => ($kind:ident, $rep:ident)),* $(,)?) => {
        $(
            pub fn $name(&mut self, left: OpIndex, right: OpIndex) -> OpIndex {
                self.emit(Op::Comparison { kind: ComparisonKind::$kind, rep: Rep::$rep, left, right })
            }
        )*
    };
}

macro_rules! changes {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, input: OpIndex) -> OpIndex {
                self.emit(Op::Change { kind: ChangeKind::$kind, input })
            }
        )*
    };
}

impl Assembler {
    /// Create an assembler for a new graph; the entry block is bound
    pub fn new(name: impl Into<String>, config: LoweringConfig) -> Self {
        let mut graph = Graph::new(name);
        let entry = graph.add_block(BlockKind::Merge);
        graph.bind(entry);
        Assembler {
            graph,
            config,
            current: Some(entry),
            origin: None,
            if_scopes: Vec::new(),
        }
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Finish assembly and take the output graph
    pub fn finish(self) -> Graph {
        assert!(self.if_scopes.is_empty(), "unclosed if scope at end of assembly");
        self.graph
    }

    /// Record the input block subsequently bound blocks are produced from
    pub fn set_origin(&mut self, origin: Option<BlockIndex>) {
        self.origin = origin;
    }

    pub fn current_block(&self) -> Option<BlockIndex> {
        self.current
    }

    pub fn is_reachable(&self) -> bool {
        self.current.is_some()
    }

    // ===== Blocks =====

    pub fn new_block(&mut self) -> BlockIndex {
        self.graph.add_block(BlockKind::Merge)
    }

    pub fn new_loop_header(&mut self) -> BlockIndex {
        self.graph.add_block(BlockKind::Loop)
    }

    /// Make `block` current. A non-entry block nobody jumps to stays
    /// unbound and leaves the assembler in unreachable code.
    pub fn bind(&mut self, block: BlockIndex) -> bool {
        assert!(
            self.current.is_none(),
            "binding {} while {:?} is still open",
            block,
            self.current
        );
        if block != self.graph.entry && self.graph.block(block).predecessors.is_empty() {
            return false;
        }
        self.graph.bind(block);
        self.graph.block_mut(block).origin = self.origin;
        self.current = Some(block);
        true
    }

    /// Append an operation to the current block
    pub fn emit(&mut self, op: Op) -> OpIndex {
        let Some(block) = self.current else {
            panic!("emitting {} into unreachable code", op.mnemonic());
        };
        self.graph.add_op(block, op)
    }

    fn terminate(&mut self, terminator: Terminator) -> Option<BlockIndex> {
        let block = self.current.take()?;
        for target in terminator.successors() {
            self.graph.block_mut(target).predecessors.push(block);
        }
        self.graph.block_mut(block).terminator = terminator;
        Some(block)
    }

    pub fn goto(&mut self, target: BlockIndex) {
        self.terminate(Terminator::Goto(target));
    }

    pub fn branch(&mut self, condition: OpIndex, if_true: BlockIndex, if_false: BlockIndex, hint: BranchHint) {
        assert_ne!(if_true, if_false, "branch to {} on both edges", if_true);
        self.terminate(Terminator::Branch { condition, if_true, if_false, hint });
    }

    pub fn ret(&mut self, values: Vec<OpIndex>) {
        self.terminate(Terminator::Return(values));
    }

    pub fn deoptimize(&mut self, frame_state: OpIndex, parameters: DeoptimizeParameters) {
        self.terminate(Terminator::Deoptimize { frame_state, parameters });
    }

    pub fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    // ===== If / else =====

    /// Open a conditional region entered when `condition` is non-zero
    pub fn if_(&mut self, condition: OpIndex, hint: BranchHint) {
        let then_block = self.new_block();
        let else_block = self.new_block();
        let merge = self.new_block();
        self.branch(condition, then_block, else_block, hint);
        self.bind(then_block);
        self.if_scopes.push(IfScope { else_block, merge, else_bound: false });
    }

    /// Open a conditional region entered when `condition` is zero
    pub fn if_not(&mut self, condition: OpIndex, hint: BranchHint) {
        let then_block = self.new_block();
        let else_block = self.new_block();
        let merge = self.new_block();
        self.branch(condition, else_block, then_block, hint.invert());
        self.bind(then_block);
        self.if_scopes.push(IfScope { else_block, merge, else_bound: false });
    }

    pub fn else_(&mut self) {
        let Some(scope) = self.if_scopes.last_mut() else {
            panic!("else_ without if_");
        };
        assert!(!scope.else_bound, "second else_ in one if scope");
        scope.else_bound = true;
        let (else_block, merge) = (scope.else_block, scope.merge);
        self.goto(merge);
        self.bind(else_block);
    }

    pub fn end_if(&mut self) {
        let Some(scope) = self.if_scopes.pop() else {
            panic!("end_if without if_");
        };
        self.goto(scope.merge);
        if !scope.else_bound && self.bind(scope.else_block) {
            self.goto(scope.merge);
        }
        self.bind(scope.merge);
    }

    // ===== Constants =====

    pub fn word32_constant(&mut self, value: u32) -> OpIndex {
        self.emit(Op::Constant(Constant::Word32(value)))
    }

    pub fn int32_constant(&mut self, value: i32) -> OpIndex {
        self.word32_constant(value as u32)
    }

    pub fn word64_constant(&mut self, value: u64) -> OpIndex {
        self.emit(Op::Constant(Constant::Word64(value)))
    }

    pub fn int64_constant(&mut self, value: i64) -> OpIndex {
        self.word64_constant(value as u64)
    }

    pub fn intptr_constant(&mut self, value: i64) -> OpIndex {
        self.int64_constant(value)
    }

    pub fn float64_constant(&mut self, value: f64) -> OpIndex {
        self.emit(Op::Constant(Constant::Float64(value)))
    }

    pub fn heap_constant(&mut self, root: RootIndex) -> OpIndex {
        self.emit(Op::Constant(Constant::Heap(root)))
    }

    pub fn external_constant(&mut self, external: ExternalRef) -> OpIndex {
        self.emit(Op::Constant(Constant::External(external)))
    }

    // ===== Arithmetic =====

    word_binops! {
        word32_add => (Add, Word32),
        word32_sub => (Sub, Word32),
        word32_bitwise_and => (BitwiseAnd, Word32),
        word32_bitwise_or => (BitwiseOr, Word32),
        word32_shift_left => (ShiftLeft, Word32),
        word32_shift_right_arithmetic => (ShiftRightArithmetic, Word32),
        word32_shift_right_logical => (ShiftRightLogical, Word32),
        word64_add => (Add, Word64),
        word64_sub => (Sub, Word64),
        word64_bitwise_and => (BitwiseAnd, Word64),
        word64_bitwise_or => (BitwiseOr, Word64),
        word64_bitwise_xor => (BitwiseXor, Word64),
        word64_shift_left => (ShiftLeft, Word64),
        word64_shift_right_arithmetic => (ShiftRightArithmetic, Word64),
        word64_shift_right_logical => (ShiftRightLogical, Word64),
    }

    comparisons! {
        word32_equal => (Equal, Word32),
        int32_less_than => (SignedLessThan, Word32),
        int32_less_than_or_equal => (SignedLessThanOrEqual, Word32),
        uint32_less_than => (UnsignedLessThan, Word32),
        uint32_less_than_or_equal => (UnsignedLessThanOrEqual, Word32),
        word64_equal => (Equal, Word64),
        int64_less_than => (SignedLessThan, Word64),
        int64_less_than_or_equal => (SignedLessThanOrEqual, Word64),
        uint64_less_than => (UnsignedLessThan, Word64),
        uint64_less_than_or_equal => (UnsignedLessThanOrEqual, Word64),
        float64_equal => (Equal, Float64),
        float64_less_than => (SignedLessThan, Float64),
        tagged_equal => (Equal, Tagged),
    }

    changes! {
        change_int32_to_int64 => SignExtend32To64,
        change_uint32_to_uint64 => ZeroExtend32To64,
        truncate_word64_to_word32 => Truncate64To32,
        change_int32_to_float64 => Int32ToFloat64,
        change_uint32_to_float64 => Uint32ToFloat64,
        change_int64_to_float64 => Int64ToFloat64,
        change_uint64_to_float64 => Uint64ToFloat64,
        truncate_float64_to_int32_overflow_undefined => TruncateFloat64ToInt32,
        truncate_float64_to_int64_overflow_undefined => TruncateFloat64ToInt64,
        truncate_float64_to_uint32_overflow_undefined => TruncateFloat64ToUint32,
        float64_extract_high_word32 => Float64ExtractHighWord32,
        bitcast_tagged_to_word => BitcastTaggedToWord,
        bitcast_word_to_tagged => BitcastWordToTagged,
    }

    pub fn word32_equal_constant(&mut self, left: OpIndex, value: u32) -> OpIndex {
        let right = self.word32_constant(value);
        self.word32_equal(left, right)
    }

    pub fn int32_add_check_overflow(&mut self, left: OpIndex, right: OpIndex) -> OpIndex {
        self.emit(Op::Int32AddCheckOverflow { left, right })
    }

    pub fn projection(&mut self, input: OpIndex, index: u8) -> OpIndex {
        self.emit(Op::Projection { input, index })
    }

    pub fn float64_min(&mut self, left: OpIndex, right: OpIndex) -> OpIndex {
        self.emit(Op::FloatBinop { kind: FloatBinopKind::Min, left, right })
    }

    pub fn float64_max(&mut self, left: OpIndex, right: OpIndex) -> OpIndex {
        self.emit(Op::FloatBinop { kind: FloatBinopKind::Max, left, right })
    }

    /// Pointer-sized value of a word32 index
    pub fn change_int32_to_intptr(&mut self, input: OpIndex) -> OpIndex {
        self.change_int32_to_int64(input)
    }

    // ===== Memory =====

    pub fn load(
        &mut self,
        base: OpIndex,
        index: Option<OpIndex>,
        offset: i32,
        element_size_log2: u8,
        rep: MemoryRep,
    ) -> OpIndex {
        self.emit(Op::Load { base, index, offset, element_size_log2, rep })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &mut self,
        base: OpIndex,
        index: Option<OpIndex>,
        value: OpIndex,
        offset: i32,
        element_size_log2: u8,
        rep: MemoryRep,
        write_barrier: WriteBarrier,
    ) {
        self.emit(Op::Store { base, index, value, offset, element_size_log2, rep, write_barrier });
    }

    pub fn load_field(&mut self, object: OpIndex, access: FieldAccess) -> OpIndex {
        self.load(object, None, access.offset, 0, access.rep)
    }

    pub fn store_field(&mut self, object: OpIndex, access: FieldAccess, value: OpIndex) {
        self.store(object, None, value, access.offset, 0, access.rep, access.write_barrier);
    }

    /// Store into a freshly allocated object; no barrier is needed
    pub fn init_field(&mut self, object: OpIndex, access: FieldAccess, value: OpIndex) {
        self.store(object, None, value, access.offset, 0, access.rep, WriteBarrier::None);
    }

    pub fn load_element(&mut self, object: OpIndex, access: ElementAccess, index: OpIndex) -> OpIndex {
        self.load(object, Some(index), access.header_size, access.element_size_log2, access.rep)
    }

    pub fn store_element(&mut self, object: OpIndex, access: ElementAccess, index: OpIndex, value: OpIndex) {
        self.store(
            object,
            Some(index),
            value,
            access.header_size,
            access.element_size_log2,
            access.rep,
            access.write_barrier,
        );
    }

    pub fn load_map(&mut self, object: OpIndex) -> OpIndex {
        self.load_field(object, FieldAccess::map())
    }

    pub fn load_instance_type(&mut self, map: OpIndex) -> OpIndex {
        self.load_field(map, FieldAccess::map_instance_type())
    }

    /// Raw storage of `size` bytes (a pointer-sized word)
    pub fn allocate(&mut self, size: OpIndex, allocation: AllocationType) -> OpIndex {
        self.emit(Op::Allocate { size, allocation })
    }

    pub fn call(&mut self, callee: ExternalRef, args: Vec<OpIndex>) -> OpIndex {
        self.emit(Op::Call { callee, args })
    }

    // ===== SSA =====

    pub fn phi(&mut self, inputs: Vec<OpIndex>, rep: Rep) -> OpIndex {
        self.emit(Op::Phi { inputs, rep })
    }

    /// Representation of an emitted value; panics for operations without one
    pub fn rep_of(&self, value: OpIndex) -> Rep {
        match self.graph.rep(value) {
            Some(rep) => rep,
            None => panic!("{} ({}) produces no value", value, self.graph.op(value).mnemonic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::verify;

    fn asm() -> Assembler {
        Assembler::new("test", LoweringConfig::default())
    }

    #[test]
    fn test_entry_is_bound() {
        let mut a = asm();
        assert_eq!(a.current_block(), Some(BlockIndex(0)));
        let c = a.word32_constant(1);
        a.ret(vec![c]);
        assert!(!a.is_reachable());
        let graph = a.finish();
        assert_eq!(verify(&graph), Ok(()));
    }

    #[test]
    fn test_bind_without_predecessors_is_unreachable() {
        let mut a = asm();
        let dead = a.new_block();
        a.unreachable();
        assert!(!a.bind(dead));
        assert!(!a.is_reachable());
        // Jumps from unreachable code are dropped.
        a.goto(dead);
        assert!(a.graph().block(dead).predecessors.is_empty());
    }

    #[test]
    fn test_if_else_merges() {
        let mut a = asm();
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        a.if_(p, BranchHint::True);
        a.word32_constant(1);
        a.else_();
        a.word32_constant(2);
        a.end_if();
        assert!(a.is_reachable());
        let merge = a.current_block().unwrap();
        assert_eq!(a.graph().block(merge).predecessors.len(), 2);
        a.ret(vec![p]);
        assert_eq!(verify(&a.finish()), Ok(()));
    }

    #[test]
    fn test_if_without_else() {
        let mut a = asm();
        let p = a.emit(Op::Parameter { index: 0, rep: Rep::Word32 });
        a.if_not(p, BranchHint::None);
        a.word32_constant(1);
        a.end_if();
        a.ret(vec![]);
        let graph = a.finish();
        assert_eq!(verify(&graph), Ok(()));
        assert_eq!(graph.layout().len(), 4);
    }

    #[test]
    #[should_panic(expected = "into unreachable code")]
    fn test_emit_into_unreachable_panics() {
        let mut a = asm();
        a.unreachable();
        a.word32_constant(0);
    }

    #[test]
    fn test_branch_hint_invert() {
        assert_eq!(BranchHint::True.invert(), BranchHint::False);
        assert_eq!(BranchHint::None.invert(), BranchHint::None);
    }
}
