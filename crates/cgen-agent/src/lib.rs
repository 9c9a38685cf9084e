//! LLM-driven C code generation with a compile/feedback loop.
//!
//! The binary (`cgen`) asks a Gemini model for a C program, compiles it, and
//! feeds compiler diagnostics back into the conversation until the code
//! builds or the attempt ceiling is reached.

pub mod config;
pub mod errors;
pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod state_machine;
pub mod telemetry;

pub use config::{ApiKey, LoopConfig};
pub use errors::{CodegenError, ErrorKind};
pub use generator::{CodeGenerator, GeminiGenerator, Reply};
pub use orchestrator::{prepare, FeedbackLoop, LoopSuccess};
