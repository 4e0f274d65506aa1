//! Lowering IR: a block graph over a flat operation arena

pub mod types;
pub mod value_ops;
pub mod instr;
pub mod display;
pub mod verify;

pub use types::{AllocationType, BranchHint, MemoryRep, Rep, WordRep, WriteBarrier};
pub use instr::{Block, BlockIndex, BlockKind, Graph, Op, OpIndex, Terminator};
pub use instr::{ChangeKind, ComparisonKind, Constant, ExternalRef, FloatBinopKind, WordBinopKind};
pub use instr::{DeoptimizeParameters, DeoptimizeReason, FeedbackSource};
pub use verify::{verify, verify_machine_level, VerifyError};
