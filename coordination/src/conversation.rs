//! Conversation transcript shared between the feedback loop and the oracle.
//!
//! The transcript is an append-only list of turns that alternate between the
//! requester (us) and the generator (the model), always starting with the
//! requester. It serializes directly into the `contents` array expected by
//! `generateContent`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The side asking for code and reporting diagnostics.
    #[serde(rename = "user")]
    Requester,
    /// The code-generation model.
    #[serde(rename = "model")]
    Generator,
}

impl Role {
    /// The role expected to speak after this one.
    pub fn next(self) -> Self {
        match self {
            Self::Requester => Self::Generator,
            Self::Generator => Self::Requester,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requester => write!(f, "requester"),
            Self::Generator => write!(f, "generator"),
        }
    }
}

/// A single text segment of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// Build a single-segment turn.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// All text segments joined without a separator.
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Returned when an append would break requester/generator alternation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfTurn {
    /// Role that was expected next.
    pub expected: Role,
    /// Role that tried to append.
    pub found: Role,
}

impl fmt::Display for OutOfTurn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transcript expected a {} turn but got a {} turn",
            self.expected, self.found
        )
    }
}

impl std::error::Error for OutOfTurn {}

/// Append-only, alternating conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a conversation with the initial requester instruction.
    pub fn seed(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(Role::Requester, prompt)],
        }
    }

    /// Append a turn, enforcing alternation.
    pub fn push(&mut self, turn: Turn) -> Result<(), OutOfTurn> {
        let expected = self.expected_role();
        if turn.role != expected {
            return Err(OutOfTurn {
                expected,
                found: turn.role,
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Record the generator's reply to the latest request.
    pub fn push_reply(&mut self, text: impl Into<String>) -> Result<(), OutOfTurn> {
        self.push(Turn::new(Role::Generator, text))
    }

    /// Record a follow-up request (e.g. compiler feedback).
    pub fn push_request(&mut self, text: impl Into<String>) -> Result<(), OutOfTurn> {
        self.push(Turn::new(Role::Requester, text))
    }

    /// Role the next appended turn must carry.
    pub fn expected_role(&self) -> Role {
        self.turns
            .last()
            .map(|t| t.role.next())
            .unwrap_or(Role::Requester)
    }

    /// True when the last turn is a request still waiting for a reply.
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.turns.last(), Some(t) if t.role == Role::Requester)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Total characters across all segments (for logging request size).
    pub fn char_count(&self) -> usize {
        self.turns
            .iter()
            .flat_map(|t| t.parts.iter())
            .map(|p| p.text.chars().count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_awaits_reply() {
        let t = Transcript::seed("write code");
        assert_eq!(t.len(), 1);
        assert!(t.awaiting_reply());
        assert_eq!(t.expected_role(), Role::Generator);
    }

    #[test]
    fn test_alternation_enforced() {
        let mut t = Transcript::seed("write code");
        let err = t.push_request("again").unwrap_err();
        assert_eq!(err.expected, Role::Generator);
        assert_eq!(err.found, Role::Requester);
        assert_eq!(t.len(), 1);

        t.push_reply("int main(void) { return 0; }").unwrap();
        assert!(!t.awaiting_reply());
        assert!(t.push_reply("twice").is_err());

        t.push_request("fix it").unwrap();
        assert_eq!(t.len(), 3);
        assert!(t.awaiting_reply());
    }

    #[test]
    fn test_serializes_as_contents_array() {
        let mut t = Transcript::seed("hi");
        t.push_reply("hello").unwrap();

        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "hello"}]}
            ])
        );
    }

    #[test]
    fn test_turn_text_joins_segments() {
        let turn = Turn {
            role: Role::Generator,
            parts: vec![
                Part { text: "int ".into() },
                Part { text: "x;".into() },
            ],
        };
        assert_eq!(turn.text(), "int x;");
    }
}
