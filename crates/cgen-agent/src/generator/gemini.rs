//! Gemini `generateContent` client.
//!
//! One POST per call with the full transcript as `contents`. Only the first
//! candidate is read; its text parts are concatenated into the reply.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use coordination::{OutOfTurn, Role, Transcript};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CodeGenerator, Reply};
use crate::config::{ApiKey, LoopConfig};
use crate::errors::CodegenError;

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a Transcript,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// A response segment; non-text parts (function calls, inline data) have no `text`.
#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Turn a raw `generateContent` body into a [`Reply`].
pub fn parse_reply(body: &str) -> Result<Reply, CodegenError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| CodegenError::malformed(format!("unparsable response body: {e}")))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!(" (blockReason: {r})"))
            .unwrap_or_default();
        return Err(CodegenError::malformed(format!(
            "response contained no candidates{reason}"
        )));
    };

    let segments: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if segments.is_empty() {
        let finish = candidate
            .finish_reason
            .map(|r| format!(" (finishReason: {r})"))
            .unwrap_or_default();
        return Err(CodegenError::malformed(format!(
            "first candidate has no text parts{finish}"
        )));
    }

    Ok(Reply::new(segments))
}

/// Production [`CodeGenerator`] backed by the Gemini REST API.
pub struct GeminiGenerator {
    endpoint: String,
    model: String,
    api_key: ApiKey,
    response_log: Option<PathBuf>,
    http: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &LoopConfig, api_key: ApiKey) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client for Gemini")?;

        Ok(Self {
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                config.model
            ),
            model: config.model.clone(),
            api_key,
            response_log: config.response_log.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overwrite the raw-response log. Failures are logged, never fatal.
    async fn log_response(&self, body: &str) {
        let Some(path) = &self.response_log else {
            return;
        };
        if let Err(e) = tokio::fs::write(path, body).await {
            warn!(path = %path.display(), "Failed to write response log: {e}");
        }
    }
}

#[async_trait]
impl CodeGenerator for GeminiGenerator {
    async fn generate(&self, transcript: &Transcript) -> Result<Reply, CodegenError> {
        if !transcript.awaiting_reply() {
            return Err(OutOfTurn {
                expected: transcript.expected_role(),
                found: Role::Generator,
            }
            .into());
        }

        debug!(
            model = %self.model,
            turns = transcript.len(),
            chars = transcript.char_count(),
            "Sending generateContent request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&GenerateContentRequest {
                contents: transcript,
            })
            .send()
            .await
            .map_err(|e| CodegenError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CodegenError::Transport(format!("Failed to read response: {e}")))?;

        self.log_response(&body).await;

        if !status.is_success() {
            return Err(CodegenError::Transport(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        parse_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_candidate_text_parts() {
        let body = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [
                    {"text": "```c\nint main(void) {"},
                    {"functionCall": {"name": "noop", "args": {}}},
                    {"text": " return 0; }\n```"}
                ]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"totalTokenCount": 42}
        }"#;

        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.segments.len(), 2);
        assert_eq!(reply.text(), "```c\nint main(void) { return 0; }\n```");
    }

    #[test]
    fn empty_candidates_is_malformed() {
        let err = parse_reply(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, CodegenError::MalformedResponse(_)));
        assert!(err.to_string().contains("no candidates"));
    }

    #[test]
    fn missing_candidates_reports_block_reason() {
        let err = parse_reply(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn candidate_without_text_is_malformed() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        let err = parse_reply(body).unwrap_err();
        assert!(matches!(err, CodegenError::MalformedResponse(_)));
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_reply("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, CodegenError::MalformedResponse(_)));
    }

    #[test]
    fn endpoint_from_config() {
        let config = LoopConfig {
            api_base: "http://127.0.0.1:9/v1beta/".into(),
            model: "gemini-test".into(),
            ..LoopConfig::default()
        };
        let key = ApiKey::from_lookup("K", |_| Some("secret".into())).unwrap();
        let generator = GeminiGenerator::new(&config, key).unwrap();
        assert_eq!(
            generator.endpoint(),
            "http://127.0.0.1:9/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(generator.model(), "gemini-test");
    }

    #[tokio::test]
    async fn refuses_transcript_not_awaiting_reply() {
        let key = ApiKey::from_lookup("K", |_| Some("secret".into())).unwrap();
        let generator = GeminiGenerator::new(&LoopConfig::default(), key).unwrap();

        let mut transcript = Transcript::seed("write code");
        transcript.push_reply("int x;").unwrap();

        let err = generator.generate(&transcript).await.unwrap_err();
        assert!(matches!(err, CodegenError::Transcript(_)));
    }
}
