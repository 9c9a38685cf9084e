//! Bookkeeping for the compile-and-fix loop
//!
//! Holds the loop configuration, the per-attempt record, and the fix prompt
//! built from a compiler diagnostic. The loop itself lives with the agent,
//! which owns the model client.

use crate::feedback::compiler::CompileResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Longest diagnostic excerpt kept in an [`AttemptRecord`].
const EXCERPT_MAX_CHARS: usize = 2048;

/// Configuration for the correction loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Maximum generate/compile attempts
    pub max_attempts: u32,
    /// Where each attempt's extracted source is written
    pub source_path: PathBuf,
    /// Where a successful compile leaves the binary
    pub artifact_path: PathBuf,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            source_path: PathBuf::from("out.c"),
            artifact_path: PathBuf::from("out"),
        }
    }
}

/// One generate → extract → compile cycle.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Attempt number (1-indexed)
    pub ordinal: u32,
    /// Source handed to the compiler
    pub source: String,
    /// Compiler verdict
    pub result: CompileResult,
}

impl Attempt {
    /// Fold into a serializable record, dropping the source text.
    pub fn record(&self) -> AttemptRecord {
        AttemptRecord {
            attempt: self.ordinal,
            timestamp: Utc::now(),
            compiled: self.result.success,
            exit_code: self.result.exit_code,
            source_bytes: self.source.len(),
            compile_ms: self.result.duration_ms,
            diagnostic: if self.result.success {
                None
            } else {
                Some(excerpt(&self.result.diagnostic))
            },
        }
    }
}

/// Serializable trace of an attempt for the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub compiled: bool,
    pub exit_code: Option<i32>,
    pub source_bytes: usize,
    pub compile_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Build the requester turn sent after a failed compile.
///
/// The diagnostic is embedded verbatim.
pub fn format_fix_prompt(diagnostic: &str) -> String {
    format!(
        "The code failed to compile with the following error:\n{diagnostic}\n\
         Please fix the code. Output only the fixed C code."
    )
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_MAX_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(EXCERPT_MAX_CHARS).collect();
    cut.push_str("\n... [truncated]");
    cut
}
