//! Heuristic detection of mathematical or scientific content.
//!
//! Over-inclusive: a bare `±`, a Greek letter, or `2-3` all
//! count. Callers use the flag for filtering, not for parsing.

use once_cell::sync::Lazy;
use regex::Regex;

static FORMULA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(",
        r"\b(?:equation|formula|theorem|proof|lemma|corollary)\b",
        r"|[∫∑∏∆∇∂√±×÷≤≥≠≈∞α-ωΑ-Ω]",
        r"|\$[^$]+\$",
        r"|\\[a-zA-Z]+\{[^}]*\}",
        r"|\b(?:sin|cos|tan|log|ln|exp|lim)\b",
        r"|\d+\s*[+\-×÷=]\s*\d+",
        r"|[xy]\s*[=<>]\s*[\d\w\s+\-×÷()]+",
        r")"
    ))
    .unwrap()
});

/// True if `text` looks like it carries a formula. Blank input is never a formula.
pub fn has_formula(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    FORMULA.is_match(text)
}
