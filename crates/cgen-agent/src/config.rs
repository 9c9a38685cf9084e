use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use coordination::feedback::{CorrectionConfig, DEFAULT_MAX_ATTEMPTS};

use crate::errors::CodegenError;
use crate::prompts;

/// Environment variable holding the Gemini API key unless overridden.
pub const DEFAULT_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Gemini REST API secret.
///
/// `Debug` is redacted so the key never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Read the key from `var` via `lookup`.
    ///
    /// Missing or blank values are a configuration error.
    pub fn from_lookup(
        var: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CodegenError> {
        match lookup(var) {
            Some(value) if !value.trim().is_empty() => Ok(Self(value.trim().to_string())),
            _ => Err(CodegenError::Configuration(format!(
                "{var} environment variable not set"
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Gemini REST base, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub api_base: String,
    /// Model id used in `models/{model}:generateContent`
    pub model: String,
    /// Environment variable carrying the API key
    pub api_key_var: String,
    /// HTTP request timeout for one generation call
    pub request_timeout_secs: u64,
    /// Initial instruction sent to the model
    pub prompt: String,
    /// Attempt ceiling
    pub max_attempts: u32,
    /// Compiler executable
    pub compiler: String,
    /// Extracted source file (overwritten every attempt)
    pub source_path: PathBuf,
    /// Compiled artifact (only written on success)
    pub artifact_path: PathBuf,
    /// Per-compile timeout; `None` waits indefinitely
    pub compile_timeout_secs: Option<u64>,
    /// Raw response body of the latest generation call
    pub response_log: Option<PathBuf>,
    /// JSON run summary written when the loop ends
    pub summary_path: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-3-pro-preview".into(),
            api_key_var: DEFAULT_API_KEY_VAR.into(),
            request_timeout_secs: 300,
            prompt: prompts::SEED_PROMPT.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            compiler: "clang".into(),
            source_path: PathBuf::from("out.c"),
            artifact_path: PathBuf::from("out"),
            compile_timeout_secs: None,
            response_log: None,
            summary_path: None,
        }
    }
}

impl LoopConfig {
    /// Defaults overlaid with `CGEN_*` environment variables.
    pub fn from_env() -> Result<Self, CodegenError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Like [`from_env`](Self::from_env), reading through `lookup`.
    ///
    /// A numeric variable that does not parse is a configuration error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CodegenError> {
        let mut config = Self::default();

        if let Some(url) = lookup("CGEN_API_BASE") {
            config.api_base = url;
        }
        if let Some(model) = lookup("CGEN_MODEL") {
            config.model = model;
        }
        if let Some(var) = lookup("CGEN_API_KEY_VAR") {
            config.api_key_var = var;
        }
        if let Some(secs) = parse_var(&lookup, "CGEN_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout_secs = secs;
        }
        if let Some(max) = parse_var(&lookup, "CGEN_MAX_ATTEMPTS")? {
            config.max_attempts = max;
        }
        if let Some(cc) = lookup("CGEN_COMPILER") {
            config.compiler = cc;
        }
        if let Some(path) = lookup("CGEN_SOURCE_PATH") {
            config.source_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("CGEN_ARTIFACT_PATH") {
            config.artifact_path = PathBuf::from(path);
        }
        if let Some(secs) = parse_var(&lookup, "CGEN_COMPILE_TIMEOUT_SECS")? {
            config.compile_timeout_secs = Some(secs);
        }
        if let Some(path) = lookup("CGEN_RESPONSE_LOG") {
            config.response_log = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), CodegenError> {
        if self.max_attempts == 0 {
            return Err(CodegenError::Configuration(
                "max attempts must be at least 1".into(),
            ));
        }
        if self.compiler.trim().is_empty() {
            return Err(CodegenError::Configuration(
                "compiler must not be empty".into(),
            ));
        }
        if self.prompt.trim().is_empty() {
            return Err(CodegenError::Configuration("prompt must not be empty".into()));
        }
        if self.source_path.as_os_str().is_empty() || self.artifact_path.as_os_str().is_empty() {
            return Err(CodegenError::Configuration(
                "source and artifact paths must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn correction(&self) -> CorrectionConfig {
        CorrectionConfig {
            max_attempts: self.max_attempts,
            source_path: self.source_path.clone(),
            artifact_path: self.artifact_path.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn compile_timeout(&self) -> Option<Duration> {
        self.compile_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, CodegenError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(var)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| CodegenError::Configuration(format!("{var}: {e} (got {raw:?})")))
        })
        .transpose()
}
