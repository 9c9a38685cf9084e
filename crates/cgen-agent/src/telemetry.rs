//! Run summary for post-mortems.
//!
//! When `--summary <path>` is given, a pretty-printed JSON snapshot of the
//! run is written once the run ends, whether it succeeded, exhausted its
//! attempts, or was aborted (setup failures included). Writing is
//! best-effort: failures are logged and never change the exit code.

use std::path::Path;

use chrono::{DateTime, Utc};
use coordination::feedback::{AttemptRecord, SourceCompiler};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::CodegenError;
use crate::generator::CodeGenerator;
use crate::orchestrator::{FeedbackLoop, LoopSuccess};
use crate::prompts::PROMPT_VERSION;
use crate::state_machine::{LoopState, TransitionRecord};

/// Current schema version for run summaries.
/// Bump when adding/removing/renaming fields.
pub const SUMMARY_SCHEMA_VERSION: u8 = 1;

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
    Aborted { kind: String, message: String },
}

impl RunOutcome {
    pub fn from_result(result: &Result<LoopSuccess, CodegenError>) -> Self {
        match result {
            Ok(success) => Self::Succeeded {
                attempts: success.attempts,
            },
            Err(CodegenError::Exhausted { attempts, .. }) => Self::Exhausted {
                attempts: *attempts,
            },
            Err(e) => Self::aborted(e),
        }
    }

    fn aborted(error: &CodegenError) -> Self {
        Self::Aborted {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Snapshot of one `cgen` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u8,
    pub started_at: DateTime<Utc>,
    pub model: String,
    pub compiler: String,
    pub prompt_version: String,
    pub outcome: RunOutcome,
    pub final_state: LoopState,
    pub duration_ms: u64,
    pub transcript_turns: usize,
    pub attempts: Vec<AttemptRecord>,
    pub transitions: Vec<TransitionRecord>,
}

impl RunSummary {
    pub fn capture<G, C>(
        feedback: &FeedbackLoop<G, C>,
        result: &Result<LoopSuccess, CodegenError>,
        model: &str,
        compiler: &str,
    ) -> Self
    where
        G: CodeGenerator,
        C: SourceCompiler,
    {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            started_at: feedback.started_at(),
            model: model.to_string(),
            compiler: compiler.to_string(),
            prompt_version: PROMPT_VERSION.to_string(),
            outcome: RunOutcome::from_result(result),
            final_state: feedback.state(),
            duration_ms: feedback.elapsed_ms(),
            transcript_turns: feedback.transcript().len(),
            attempts: feedback.attempts().to_vec(),
            transitions: feedback.transitions().to_vec(),
        }
    }

    /// Summary for a run rejected during setup, before any request was sent.
    pub fn setup_failure(error: &CodegenError, model: &str, compiler: &str) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            started_at: Utc::now(),
            model: model.to_string(),
            compiler: compiler.to_string(),
            prompt_version: PROMPT_VERSION.to_string(),
            outcome: RunOutcome::aborted(error),
            final_state: LoopState::Aborted,
            duration_ms: 0,
            transcript_turns: 0,
            attempts: Vec::new(),
            transitions: Vec::new(),
        }
    }
}

/// Write the summary as pretty JSON, overwriting `path`.
pub fn write_summary(summary: &RunSummary, path: &Path) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => match std::fs::write(path, json) {
            Ok(()) => info!(path = %path.display(), "Wrote run summary"),
            Err(e) => warn!("Failed to write run summary: {e}"),
        },
        Err(e) => warn!("Failed to serialize run summary: {e}"),
    }
}
