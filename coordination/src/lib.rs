//! Deterministic half of the `cgen` compile-feedback loop.
//!
//! This library provides:
//! - [`conversation`]: the alternating requester/generator transcript sent to the model
//! - [`feedback`]: code extraction, native compilation, and fix-prompt construction
//!
//! Nothing here performs network I/O; the agent crate drives these pieces
//! against a live model.

#![allow(clippy::uninlined_format_args)]

pub mod conversation;
pub mod feedback;

pub use conversation::{OutOfTurn, Part, Role, Transcript, Turn};
pub use feedback::{
    extract_code, format_fix_prompt, Attempt, AttemptRecord, CCompiler, CompileResult,
    CompilerError, CorrectionConfig, SourceCompiler,
};
