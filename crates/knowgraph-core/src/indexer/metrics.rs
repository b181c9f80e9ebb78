//! Per-method complexity and size metrics.

use crate::indexer::facts::{ConstructKind, ControlConstruct};

/// 1 + one point per decision construct and boolean operator.
pub fn cyclomatic_complexity(constructs: &[ControlConstruct]) -> u32 {
    1 + constructs.len() as u32
}

/// Structural constructs cost `1 + nesting`; boolean operators cost a flat 1.
pub fn cognitive_complexity(constructs: &[ControlConstruct]) -> u32 {
    constructs
        .iter()
        .map(|c| match c.kind {
            ConstructKind::BooleanOperator => 1,
            _ => 1 + c.nesting,
        })
        .sum()
}

/// Count non-blank lines that are not entirely comments.
///
/// `//` lines and the interior of `/* ... */` blocks are skipped. A line with
/// code before or after a comment still counts.
pub fn count_code_lines(text: &str) -> u32 {
    let mut count = 0u32;
    let mut in_block = false;

    for raw in text.lines() {
        let mut line = raw.trim();
        let mut has_code = false;

        loop {
            if in_block {
                match line.find("*/") {
                    Some(end) => {
                        in_block = false;
                        line = line[end + 2..].trim_start();
                    }
                    None => break,
                }
                continue;
            }
            if line.is_empty() || line.starts_with("//") {
                break;
            }
            match line.find("/*") {
                Some(0) => {
                    in_block = true;
                    line = &line[2..];
                }
                Some(start) => {
                    has_code = true;
                    in_block = true;
                    line = &line[start + 2..];
                }
                None => {
                    has_code = true;
                    break;
                }
            }
        }

        if has_code {
            count += 1;
        }
    }

    count
}
