//! Feedback loop state machine: explicit states and legal transition guards.
//!
//! The controller calls `advance()` to move between states. Each call
//! validates the edge against the transition table and records it, so a run
//! summary can replay the exact path a run took.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// States of the generate/compile/feedback loop.
///
/// Every run starts at `Seeding` and ends at `Succeeded`, `Exhausted`, or
/// `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Building the initial transcript.
    Seeding,
    /// Waiting on the model.
    Generating,
    /// Pulling code out of the reply and writing the source file.
    Extracting,
    /// Running the compiler.
    Compiling,
    /// Feeding the diagnostic back and deciding whether to go again.
    Retrying,
    /// Code compiled. Terminal.
    Succeeded,
    /// Attempt ceiling reached without a clean compile. Terminal.
    Exhausted,
    /// A fatal error (config, oracle, environment) ended the run. Terminal.
    Aborted,
}

impl LoopState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Aborted)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seeding => write!(f, "Seeding"),
            Self::Generating => write!(f, "Generating"),
            Self::Extracting => write!(f, "Extracting"),
            Self::Compiling => write!(f, "Compiling"),
            Self::Retrying => write!(f, "Retrying"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Legal transitions:
/// ```text
/// Seeding → Generating
/// Generating → Extracting
/// Extracting → Compiling
/// Compiling → Succeeded | Retrying
/// Retrying → Generating | Exhausted
/// any non-terminal → Aborted
/// ```
fn is_legal_transition(from: LoopState, to: LoopState) -> bool {
    use LoopState::*;

    if to == Aborted && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Seeding, Generating)
            | (Generating, Extracting)
            | (Extracting, Compiling)
            | (Compiling, Succeeded)
            | (Compiling, Retrying)
            | (Retrying, Generating)
            | (Retrying, Exhausted)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: LoopState,
    pub to: LoopState,
    /// Attempt number at the time of transition (0 before the first attempt).
    pub attempt: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: LoopState,
    pub to: LoopState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state and the transition log.
pub struct StateMachine {
    current: LoopState,
    attempt: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Create a new state machine starting at `Seeding`.
    pub fn new() -> Self {
        Self {
            current: LoopState::Seeding,
            attempt: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> LoopState {
        self.current
    }

    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    /// Attempt to advance to the next state.
    pub fn advance(&mut self, to: LoopState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            attempt = self.attempt,
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Move to `Aborted` from any non-terminal state.
    pub fn abort(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(LoopState::Aborted, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Milliseconds since the state machine was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }

    /// e.g. `Seeding → Succeeded (812ms, 5 transitions) [Generating → ... → Succeeded]`
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({}ms, {} transitions)",
            LoopState::Seeding,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
