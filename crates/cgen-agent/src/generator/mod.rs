//! Code-generation oracle abstraction.
//!
//! The feedback loop only needs "send the transcript, get text back". The
//! Gemini REST client is the production implementation; tests substitute
//! recording stubs.

pub mod gemini;

use async_trait::async_trait;
use coordination::Transcript;

use crate::errors::CodegenError;

pub use gemini::GeminiGenerator;

/// Text segments produced by the generator for the latest turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub segments: Vec<String>,
}

impl Reply {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Single-segment reply.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            segments: vec![text.into()],
        }
    }

    /// Logical response text: segments concatenated in order, no separator.
    pub fn text(&self) -> String {
        self.segments.concat()
    }
}

/// A conversational model that can answer the transcript's latest request.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce a reply for a transcript that ends with a requester turn.
    ///
    /// Any error is fatal to the run; transport problems are never retried.
    async fn generate(&self, transcript: &Transcript) -> Result<Reply, CodegenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_concatenates_without_separator() {
        let reply = Reply::new(vec!["```c\nint ".into(), "main;\n".into(), "```".into()]);
        assert_eq!(reply.text(), "```c\nint main;\n```");
    }

    #[test]
    fn empty_reply_text() {
        assert_eq!(Reply::default().text(), "");
    }
}
