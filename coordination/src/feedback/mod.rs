//! Compilation Feedback Module
//!
//! Pieces of the generate → compile → fix loop that do not talk to a model:
//! - Pull C source out of a model reply
//! - Compile it with a native compiler and capture diagnostics
//! - Turn diagnostics into the next fix request
//!
//! # Architecture
//!
//! ```text
//! Reply → Extractor → out.c → Compiler → CompileResult → fix prompt → Model
//!                                               ↑                        |
//!                                               └────────────────────────┘
//! ```

pub mod compiler;
pub mod correction_loop;
pub mod extractor;

pub use compiler::{CCompiler, CompileResult, CompilerError, SourceCompiler};
pub use correction_loop::{
    format_fix_prompt, Attempt, AttemptRecord, CorrectionConfig, DEFAULT_MAX_ATTEMPTS,
};
pub use extractor::extract_code;
