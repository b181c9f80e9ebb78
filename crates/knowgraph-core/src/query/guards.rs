//! Shared guardrails for query payload bounds and traversal limits.

// Graph traversal guards
pub const MAX_DEPENDENCY_DEPTH: i64 = 16;
pub const MAX_GRAPH_VISITED: usize = 10_000;

// Result size guards
pub const MAX_RESULT_LIMIT: i64 = 100;
pub const MAX_QA_RESULTS: i64 = 50;
pub const MAX_QUESTION_LENGTH: usize = 4096;
pub const MAX_MODEL_ALTERNATIVES: usize = 4;

pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_depth(value: i64, maximum: i64) -> i64 {
    clamp_int(value, 1, maximum)
}

pub fn clamp_limit(value: i64, maximum: i64) -> i64 {
    clamp_int(value, 1, maximum)
}

/// Trim and cut `text` to at most `max_bytes`, never splitting a character.
pub fn truncate_text(text: &str, max_bytes: usize) -> String {
    let stripped = text.trim();
    if stripped.len() <= max_bytes {
        return stripped.to_string();
    }
    let mut end = max_bytes;
    while !stripped.is_char_boundary(end) {
        end -= 1;
    }
    stripped[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_bounds() {
        assert_eq!(clamp_depth(0, MAX_DEPENDENCY_DEPTH), 1);
        assert_eq!(clamp_depth(99, MAX_DEPENDENCY_DEPTH), 16);
        assert_eq!(clamp_limit(-5, MAX_QA_RESULTS), 1);
        assert_eq!(clamp_limit(7, MAX_QA_RESULTS), 7);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_text("  hello  ", 10), "hello");
        assert_eq!(truncate_text("héllo", 2), "h");
        assert_eq!(truncate_text("abcdef", 3), "abc");
    }
}
