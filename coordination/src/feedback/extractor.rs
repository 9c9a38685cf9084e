//! Pull the C payload out of a model reply.
//!
//! Replies usually wrap code in markdown fences. Lookup order:
//! 1. the first ```` ```c ```` block (tag followed by whitespace),
//! 2. the first block of any kind,
//! 3. the whole reply.
//!
//! Extraction never fails; the compiler decides whether the result is code.

const FENCE: &str = "```";

/// Language tag that marks a fence as C.
pub const C_TAG: &str = "c";

/// Extract the C source from a reply, falling back to the trimmed text.
pub fn extract_code(text: &str) -> String {
    extract_tagged_block(text, C_TAG)
        .or_else(|| extract_any_block(text))
        .unwrap_or_else(|| text.trim())
        .to_string()
}

/// Contents of the first fence opened with exactly `tag`.
///
/// A tag only counts when followed by whitespace, so ```` ```cpp ```` does not
/// match `c`.
pub fn extract_tagged_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let marker = format!("{FENCE}{tag}");
    for (start, _) in text.match_indices(&marker) {
        let body_start = start + marker.len();
        let rest = &text[body_start..];
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        // Only the first tagged fence is considered; unclosed means no match.
        return rest.find(FENCE).map(|end| rest[..end].trim());
    }
    None
}

/// Contents between the first fence and the next one.
pub fn extract_any_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let end = text[start..].find(FENCE)?;
    Some(text[start..start + end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_block() {
        let reply = "Here you go:\n```c\nint main(void) { return 0; }\n```\nEnjoy!";
        assert_eq!(extract_code(reply), "int main(void) { return 0; }");
    }

    #[test]
    fn test_tagged_block_ignores_trailing_fences() {
        let reply = "```c\nint a;\n```\nand also\n```c\nint b;\n```";
        assert_eq!(extract_code(reply), "int a;");
    }

    #[test]
    fn test_tagged_block_preferred_over_earlier_generic() {
        let reply = "```\n$ clang out.c\n```\n```c\nint x;\n```";
        assert_eq!(extract_code(reply), "int x;");
    }

    #[test]
    fn test_cpp_tag_is_not_c() {
        assert_eq!(extract_tagged_block("```cpp\nint x;\n```", "c"), None);
        // Falls back to the generic block, info string included.
        assert_eq!(extract_code("```cpp\nint x;\n```"), "cpp\nint x;");
    }

    #[test]
    fn test_generic_block() {
        let reply = "Sure.\n```\n#include <stdio.h>\nint main(void){puts(\"hi\");}\n```";
        assert_eq!(
            extract_code(reply),
            "#include <stdio.h>\nint main(void){puts(\"hi\");}"
        );
    }

    #[test]
    fn test_no_fences_returns_trimmed_text() {
        let reply = "  \n int main(void) { return 0; }\n\n";
        assert_eq!(extract_code(reply), "int main(void) { return 0; }");
    }

    #[test]
    fn test_unclosed_fence_returns_whole_text() {
        let reply = "```c\nint main(void) { return 0; }";
        assert_eq!(extract_code(reply), reply.trim());
    }

    #[test]
    fn test_unclosed_tagged_fence_falls_back_to_earlier_generic_block() {
        let reply = "```\n$ clang out.c\n```\n```c\nint main(void) { return 0; }";
        assert_eq!(extract_tagged_block(reply, C_TAG), None);
        assert_eq!(extract_code(reply), "$ clang out.c");
    }

    #[test]
    fn test_unfenced_is_idempotent() {
        for text in ["int x;", "  prose only  ", "", "\tint main(){}\n"] {
            let once = extract_code(text);
            assert_eq!(extract_code(&once), once);
        }
    }
}
