//! Feedback loop controller.
//!
//! Owns the transcript and drives generate → extract → compile until the code
//! builds or the attempt ceiling is hit. Compile failures are fed back to the
//! model as a new requester turn; every other failure ends the run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use coordination::feedback::{
    extract_code, format_fix_prompt, Attempt, AttemptRecord, CCompiler, CorrectionConfig,
    SourceCompiler,
};
use coordination::Transcript;
use tracing::{info, warn};

use crate::config::{ApiKey, LoopConfig};
use crate::errors::CodegenError;
use crate::generator::CodeGenerator;
use crate::state_machine::{LoopState, StateMachine, TransitionRecord};

/// Returned when an attempt compiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSuccess {
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// Final source file
    pub source_path: PathBuf,
    /// Compiled binary
    pub artifact_path: PathBuf,
}

/// The generate/compile/feedback controller.
pub struct FeedbackLoop<G, C> {
    generator: G,
    compiler: C,
    config: CorrectionConfig,
    transcript: Transcript,
    machine: StateMachine,
    attempts: Vec<AttemptRecord>,
    started_at: DateTime<Utc>,
}

impl<G: CodeGenerator, C: SourceCompiler> FeedbackLoop<G, C> {
    /// Seed the transcript with `prompt`. Nothing is sent until [`run`](Self::run).
    pub fn new(generator: G, compiler: C, config: CorrectionConfig, prompt: impl Into<String>) -> Self {
        Self {
            generator,
            compiler,
            config,
            transcript: Transcript::seed(prompt),
            machine: StateMachine::new(),
            attempts: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Run the loop to a terminal state.
    ///
    /// `Err(CodegenError::Exhausted)` means every attempt failed to compile;
    /// any other error aborted the run before the ceiling.
    pub async fn run(&mut self) -> Result<LoopSuccess, CodegenError> {
        let outcome = self.drive().await;
        if let Err(e) = &outcome {
            if !self.machine.is_terminal() {
                if let Err(illegal) = self.machine.abort(&e.to_string()) {
                    warn!("{illegal}");
                }
            }
        }
        outcome
    }

    async fn drive(&mut self) -> Result<LoopSuccess, CodegenError> {
        let max_attempts = self.config.max_attempts;
        if max_attempts == 0 {
            return Err(CodegenError::Configuration(
                "max attempts must be at least 1".into(),
            ));
        }

        let mut attempt = 1;
        self.machine.set_attempt(attempt);
        self.step(LoopState::Generating, None)?;

        loop {
            info!(attempt, max_attempts, "Attempt {attempt}/{max_attempts}: generating code");

            let reply = self.generator.generate(&self.transcript).await?;
            let text = reply.text();
            self.transcript.push_reply(text.as_str())?;

            self.step(LoopState::Extracting, None)?;
            let source = extract_code(&text);
            tokio::fs::write(&self.config.source_path, &source)
                .await
                .map_err(|source| CodegenError::Io {
                    path: self.config.source_path.clone(),
                    source,
                })?;

            self.step(LoopState::Compiling, None)?;
            info!(attempt, path = %self.config.source_path.display(), "Compiling");
            let result = self.compiler.compile(&self.config.source_path).await?;

            let current = Attempt {
                ordinal: attempt,
                source,
                result,
            };
            self.attempts.push(current.record());

            if current.result.success {
                self.step(LoopState::Succeeded, None)?;
                info!(
                    attempt,
                    artifact = %self.config.artifact_path.display(),
                    "Compilation succeeded"
                );
                return Ok(LoopSuccess {
                    attempts: attempt,
                    source_path: self.config.source_path.clone(),
                    artifact_path: self.config.artifact_path.clone(),
                });
            }

            let headline = current.result.headline().to_string();
            let diagnostic = current.result.diagnostic;
            warn!(
                attempt,
                exit_code = ?current.result.exit_code,
                "Compilation failed:\n{diagnostic}"
            );

            self.step(LoopState::Retrying, Some(&headline))?;
            self.transcript.push_request(format_fix_prompt(&diagnostic))?;

            if attempt >= max_attempts {
                self.step(LoopState::Exhausted, Some("attempt ceiling reached"))?;
                warn!(attempts = attempt, "No compilable code after maximum attempts");
                return Err(CodegenError::Exhausted {
                    attempts: attempt,
                    last_diagnostic: diagnostic,
                });
            }

            attempt += 1;
            self.machine.set_attempt(attempt);
            self.step(LoopState::Generating, None)?;
        }
    }

    fn step(&mut self, to: LoopState, reason: Option<&str>) -> Result<(), CodegenError> {
        self.machine
            .advance(to, reason)
            .map_err(|e| CodegenError::Internal(e.into()))
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> LoopState {
        self.machine.current()
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        self.machine.transitions()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.machine.elapsed_ms()
    }

    /// One-line state path, for the final log line.
    pub fn path_summary(&self) -> String {
        self.machine.summary()
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }
}

/// Validate settings, check the credential, and wire up the loop.
///
/// The credential is checked before `connect` runs, so a missing key never
/// results in a generator being built or a request being sent.
pub fn prepare<G, F>(
    config: &LoopConfig,
    lookup: impl Fn(&str) -> Option<String>,
    connect: F,
) -> Result<FeedbackLoop<G, CCompiler>, CodegenError>
where
    G: CodeGenerator,
    F: FnOnce(&LoopConfig, ApiKey) -> Result<G, CodegenError>,
{
    config.validate()?;
    let api_key = ApiKey::from_lookup(&config.api_key_var, lookup)?;
    let generator = connect(config, api_key)?;
    let compiler = CCompiler::new(&config.compiler, &config.artifact_path)
        .with_timeout(config.compile_timeout());

    Ok(FeedbackLoop::new(
        generator,
        compiler,
        config.correction(),
        config.prompt.clone(),
    ))
}
