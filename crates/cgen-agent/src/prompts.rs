//! Prompt constants sent to the generation model.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever prompt content changes
//! (including the fix template in `coordination::feedback::format_fix_prompt`)
//! so run summaries can be tied back to the wording that produced them.

/// Prompt version. Bump on any prompt content change.
pub const PROMPT_VERSION: &str = "1.0.0";

/// Initial instruction that seeds every transcript.
pub const SEED_PROMPT: &str =
    "Create a simple C program for a reverse engineering exercise. Do not explain. Output only code.";
