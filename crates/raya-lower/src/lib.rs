//! Raya JIT Value Lowering
//!
//! The stage of the optimizing JIT that turns value-level operations
//! (type tests, boxing and unboxing, checked conversions, string and array
//! construction) into machine-level code over the managed heap layout:
//! - **Layout**: tagging scheme, object shapes, and canonical roots (`layout`)
//! - **IR**: block graph, operations, and verification (`ir`)
//! - **Assembler**: structured control-flow builder (`asm`)
//! - **Lowering**: codec, allocation, guards, and the reducer (`lower`)
//! - **Pipeline**: copies a graph through the reducer stack (`pipeline`)
//! - **Evaluator**: reference interpreter over a simulated heap (`eval`)
//!
//! # Example
//!
//! ```rust,ignore
//! use raya_lower::{LoweringConfig, LoweringPipeline, Machine, Value};
//!
//! let mut pipeline = LoweringPipeline::new(LoweringConfig::default());
//! let lowered = pipeline.run(&graph)?;
//!
//! let mut machine = Machine::new(pipeline.config())?;
//! let outcome = machine.run(&lowered, &[Value::Word32(7)])?;
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

// ============================================================================
// Core Modules
// ============================================================================

/// Target parameters (`lowering.toml`)
pub mod config;

/// Object model layout and canonical roots
pub mod layout;

/// Lowering IR
pub mod ir;

/// Graph assembler and structured control flow
pub mod asm;

/// Value-representation lowering
pub mod lower;

/// Lowering pipeline driver
pub mod pipeline;

/// Reference evaluator for lowered graphs
pub mod eval;

// ============================================================================
// Re-exports
// ============================================================================

pub use asm::{Assembler, Label};
pub use config::{ConfigError, Endianness, LoweringConfig, SmiWidth};
pub use eval::{EvalError, Machine, Outcome, SimHeap, Value};
pub use ir::{BlockIndex, Graph, Op, OpIndex, Rep, Terminator, VerifyError};
pub use layout::RootIndex;
pub use lower::{MachineLoweringReducer, Reducer, ReducerStack, Reduction};
pub use pipeline::{LowerError, LoweringPipeline};
