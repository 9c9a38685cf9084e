//! Native C compiler wrapper.
//!
//! Runs `<compiler> <source> -o <artifact>` and captures stderr verbatim.
//! A failed build is ordinary data ([`CompileResult`]); only a compiler that
//! cannot be launched at all is an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Compiler could not be run at all.
#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("failed to launch compiler `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one compile invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    /// Whether the compiler exited successfully
    pub success: bool,
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,
    /// Compiler stderr on failure, empty on success
    pub diagnostic: String,
    /// Wall-clock time spent in the compiler
    pub duration_ms: u64,
}

impl CompileResult {
    pub fn passed(duration_ms: u64) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            diagnostic: String::new(),
            duration_ms,
        }
    }

    pub fn failed(exit_code: Option<i32>, diagnostic: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            exit_code,
            diagnostic: diagnostic.into(),
            duration_ms,
        }
    }

    /// First line of the diagnostic, for log lines.
    pub fn headline(&self) -> &str {
        self.diagnostic.lines().next().unwrap_or("")
    }
}

/// Anything that can turn a source file into a pass/fail verdict.
#[async_trait]
pub trait SourceCompiler: Send + Sync {
    /// Compile the file at `source`. The caller has already written it.
    async fn compile(&self, source: &Path) -> Result<CompileResult, CompilerError>;
}

/// Invokes a system C compiler (`clang` by default).
#[derive(Debug, Clone)]
pub struct CCompiler {
    program: String,
    artifact: PathBuf,
    timeout: Option<Duration>,
}

impl CCompiler {
    pub fn new(program: impl Into<String>, artifact: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            artifact: artifact.as_ref().to_path_buf(),
            timeout: None,
        }
    }

    /// Kill the compiler and report a failed build after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Where a successful build leaves its output.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }
}

#[async_trait]
impl SourceCompiler for CCompiler {
    async fn compile(&self, source: &Path) -> Result<CompileResult, CompilerError> {
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg(source)
            .arg("-o")
            .arg(&self.artifact)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    tracing::warn!(program = %self.program, "Compiler timed out");
                    return Ok(CompileResult::failed(
                        None,
                        format!("compiler timed out after {limit:?}"),
                        start.elapsed().as_millis() as u64,
                    ));
                }
            },
            None => cmd.output().await,
        };

        let output = output.map_err(|source| CompilerError::Launch {
            program: self.program.clone(),
            source,
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        if output.status.success() {
            Ok(CompileResult::passed(duration_ms))
        } else {
            Ok(CompileResult::failed(
                output.status.code(),
                String::from_utf8_lossy(&output.stderr),
                duration_ms,
            ))
        }
    }
}
