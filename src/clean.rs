//! Multi-stage text normalizer for social-media rows and extracted pages.
//!
//! Cleaning is an ordered list of pure `&str -> String` stages ([`STAGES`]).
//! Order matters: hashtag and mention stripping must see the `#`/`@`
//! markers before the symbol pass removes them, and mojibake repair must
//! run before control characters are stripped because some broken
//! sequences contain C1 controls.
//!
//! Cleaning is deliberately destructive: URLs, tags, and symbols may be
//! dropped. An input that cleans down to nothing yields `None`, which
//! callers treat as "record intentionally dropped", never as an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Which optional social-text stripping passes to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanOptions {
    pub remove_hashtag: bool,
    pub remove_mention: bool,
    pub remove_emoji: bool,
}

impl CleanOptions {
    /// Display cleanup only; used for document chunks.
    pub const STRUCTURAL: Self = Self {
        remove_hashtag: false,
        remove_mention: false,
        remove_emoji: false,
    };

    /// Every stripping pass enabled.
    pub const SOCIAL: Self = Self {
        remove_hashtag: true,
        remove_mention: true,
        remove_emoji: true,
    };
}

/// One named step of the cleaning pipeline.
pub struct Stage {
    pub name: &'static str,
    run: fn(&str, CleanOptions) -> String,
}

impl Stage {
    pub fn apply(&self, input: &str, options: CleanOptions) -> String {
        (self.run)(input, options)
    }
}

/// The cleaning pipeline, in execution order.
pub const STAGES: &[Stage] = &[
    Stage { name: "decode_entities", run: decode_entities },
    Stage { name: "repair_mojibake", run: repair_mojibake },
    Stage { name: "nfc", run: nfc },
    Stage { name: "strip_urls", run: strip_urls },
    Stage { name: "strip_hashtags", run: strip_hashtags },
    Stage { name: "strip_mentions", run: strip_mentions },
    Stage { name: "strip_invisible", run: strip_invisible },
    Stage { name: "strip_symbols", run: strip_symbols },
    Stage { name: "strip_controls", run: strip_controls },
    Stage { name: "reflow_lines", run: reflow_lines },
    Stage { name: "collapse_blank_lines", run: collapse_blank_lines },
    Stage { name: "trim", run: trim },
];

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b((?:https?://|www\.)\S+|(?:[a-z0-9-]+\.)+[a-z]{2,}(?:/\S*)?)").unwrap()
});

// No look-behind in `regex`: the leading non-word char (or start of input)
// is captured and written back.
static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^0-9A-Za-z_])#[\p{L}0-9_]+").unwrap());
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^0-9A-Za-z_])@[\p{L}0-9_]+").unwrap());

static INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}]").unwrap());
static SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{S}\p{Cn}]").unwrap());
static CONTROLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{Cc}&&[^\n\t]]").unwrap());

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|[\n\x0B\x0C\r\u{85}\u{2028}\u{2029}]").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\r]+").unwrap());
static MULTI_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Known double-decoding artifacts and their intended characters.
const MOJIBAKE: &[(&str, &str)] = &[
    ("\u{201A}\u{00C4}\u{00EC}", "\u{2013}"),
    ("\u{00E2}\u{20AC}\u{201C}", "\u{2013}"),
    ("\u{00E2}\u{20AC}\u{201D}", "\u{2014}"),
    ("\u{00E2}\u{20AC}\u{02DC}", "\u{2018}"),
    ("\u{00E2}\u{20AC}\u{2122}", "\u{2019}"),
    ("\u{00E2}\u{20AC}\u{0153}", "\u{201C}"),
    ("\u{00E2}\u{20AC}\u{009D}", "\u{201D}"),
    ("\u{00E2}\u{20AC}\u{00A6}", "\u{2026}"),
    ("\u{00E2}\u{201E}\u{00A2}", "\u{2122}"),
    ("\u{00C3}\u{00A1}", "\u{00E1}"),
    ("\u{00C3}\u{00A9}", "\u{00E9}"),
    ("\u{00C3}\u{00AD}", "\u{00ED}"),
    ("\u{00C3}\u{00B3}", "\u{00F3}"),
    ("\u{00C3}\u{00BA}", "\u{00FA}"),
    ("\u{00C3}\u{00B1}", "\u{00F1}"),
    ("\u{00A0}", " "),
];

/// Clean `raw` through every stage. `None` in, `None` out; an input that
/// cleans down to the empty string also yields `None`.
pub fn clean(raw: Option<&str>, options: CleanOptions) -> Option<String> {
    let raw = raw?;
    let cleaned = STAGES
        .iter()
        .fold(raw.to_string(), |text, stage| stage.apply(&text, options));

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Convenience wrapper for a present string.
pub fn clean_text(raw: &str, options: CleanOptions) -> Option<String> {
    clean(Some(raw), options)
}

fn decode_entities(s: &str, _: CleanOptions) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

fn repair_mojibake(s: &str, _: CleanOptions) -> String {
    MOJIBAKE
        .iter()
        .fold(s.to_string(), |acc, (broken, fixed)| acc.replace(broken, fixed))
}

fn nfc(s: &str, _: CleanOptions) -> String {
    s.nfc().collect()
}

fn strip_urls(s: &str, _: CleanOptions) -> String {
    URL.replace_all(s, "").into_owned()
}

fn strip_hashtags(s: &str, options: CleanOptions) -> String {
    if !options.remove_hashtag {
        return s.to_string();
    }
    HASHTAG.replace_all(s, "$1").into_owned()
}

fn strip_mentions(s: &str, options: CleanOptions) -> String {
    if !options.remove_mention {
        return s.to_string();
    }
    MENTION.replace_all(s, "$1").into_owned()
}

fn strip_invisible(s: &str, _: CleanOptions) -> String {
    INVISIBLE.replace_all(s, "").into_owned()
}

// Broad pass: math and currency symbols go too, not just pictographs.
fn strip_symbols(s: &str, options: CleanOptions) -> String {
    if !options.remove_emoji {
        return s.to_string();
    }
    SYMBOLS.replace_all(s, "").into_owned()
}

fn strip_controls(s: &str, _: CleanOptions) -> String {
    CONTROLS.replace_all(s, "").into_owned()
}

fn reflow_lines(s: &str, _: CleanOptions) -> String {
    let mut out = String::with_capacity(s.len());
    for line in LINE_BREAK.split(s) {
        let trimmed = trim_ascii_controls(line);
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(&MULTI_SPACE.replace_all(trimmed, " "));
        out.push('\n');
    }
    out
}

fn collapse_blank_lines(s: &str, _: CleanOptions) -> String {
    MULTI_NEWLINE.replace_all(s, "\n\n").into_owned()
}

fn trim(s: &str, _: CleanOptions) -> String {
    trim_ascii_controls(s).to_string()
}

/// Trims space and every ASCII control character from both ends.
fn trim_ascii_controls(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}
