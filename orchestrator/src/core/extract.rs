//! Recover the single shell command from a pre-exec block.
//!
//! Pre-exec blocks are written by people or models and drift from the
//! canonical `<Command>` + newline + command shape: markdown emphasis, inline
//! tags, code fences, and reasoning sections all show up. Extraction runs in a
//! fixed priority order:
//!
//! 1. Reasoning sections (`<think>`, `<thinking>`, `<reasoning>`) are removed.
//! 2. The first line carrying a `Command` tag decides the result: inline text
//!    on that line, otherwise the first usable line after it. Emphasis that
//!    wraps the whole tag line is removed from both ends, and a code fence
//!    opened on the tag line is read from the next line.
//! 3. A tag with nothing usable after it is [`ExtractError::MalformedCommand`].
//!    There is no looser retry once a tag has been seen.
//! 4. Only when no tag exists at all, a single-line `Command: ...` pattern
//!    behind list or bracket noise is accepted.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Why no command could be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no Command tag found in pre-exec block")]
    NoCommandFound,
    #[error("Command tag present but no command follows it")]
    MalformedCommand,
}

/// Characters treated as markdown decoration around a tag line.
const ADORNMENTS: &[char] = &[
    ' ', '\t', '*', '`', '_', '"', '\'', '(', ')', '>', '#',
];

static REASONING_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<\s*(?:think|thinking|reasoning)\s*>.*?<\s*/\s*(?:think|thinking|reasoning)\s*>",
    )
    .expect("reasoning block regex")
});

static REASONING_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*/\s*(?:think|thinking|reasoning)\s*>").expect("reasoning close regex")
});

static REASONING_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(?:think|thinking|reasoning)\s*>").expect("reasoning open regex")
});

/// `Command` tag at the start of an adornment-stripped line.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(?:<\s*command\s*>|command[*_`'")\]]*\s*(?::[*_]*|-[*_]*(?:\s|$)|$))"#,
    )
    .expect("command tag regex")
});

static CLOSING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*/\s*command\s*>\s*$").expect("closing tag regex")
});

/// Section headers of the action protocol written without angle brackets.
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(?:command|intent|expected|expectation|on\s*error|fallback|observation|inference|next)[*_`'")]*\s*(?::|-(?:\s|$)|$)"#,
    )
    .expect("section header regex")
});

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[\w+.\-]*$").expect("fence regex"));

/// Last-resort `Command: text` line behind list, heading, or bracket noise.
static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[\s>*_#\-\[(\d.]*command[*_]*[ \t]*(?:[\])][*_]*[ \t]*(?::|-[ \t])?|:|-[ \t])[ \t]*(.+?)[ \t]*$",
    )
    .expect("inline command regex")
});

/// Extract the command from a pre-exec block.
///
/// Pure function of its input: repeated calls on the same text agree.
pub fn extract_command(block: &str) -> Result<String, ExtractError> {
    let text = strip_reasoning(block);
    match scan_tagged(&text) {
        TagScan::Found(command) => Ok(command),
        TagScan::Malformed => Err(ExtractError::MalformedCommand),
        TagScan::Absent => inline_fallback(&text).ok_or(ExtractError::NoCommandFound),
    }
}

enum TagScan {
    Found(String),
    Malformed,
    Absent,
}

/// Remove reasoning side-channel sections so tags inside them are never seen.
fn strip_reasoning(block: &str) -> Cow<'_, str> {
    let mut text = REASONING_BLOCK_RE.replace_all(block, "");
    // A closer without opener: everything before it was reasoning.
    let stray_close = REASONING_CLOSE_RE.find_iter(&text).last().map(|m| m.end());
    if let Some(end) = stray_close {
        text = Cow::Owned(text[end..].to_string());
    }
    // An opener without closer: everything after it is reasoning.
    let stray_open = REASONING_OPEN_RE.find(&text).map(|m| m.start());
    if let Some(start) = stray_open {
        text = Cow::Owned(text[..start].to_string());
    }
    text
}

fn scan_tagged(text: &str) -> TagScan {
    let mut lines = text.lines();
    while let Some(raw) = lines.next() {
        let lead = raw.trim_start_matches(ADORNMENTS);
        let Some(tag) = TAG_RE.find(lead) else {
            continue;
        };

        // Emphasis opened before the tag and not closed inside it wraps the
        // whole line, so the same markers trail the command.
        let opened = emphasis_count(&raw[..raw.len() - lead.len()]);
        let unclosed = opened.saturating_sub(emphasis_count(tag.as_str()));
        let rest = trim_emphasis(&lead[tag.end()..], unclosed);
        let rest = CLOSING_TAG_RE.replace(rest, "");
        let rest = rest.trim();

        let in_fence = FENCE_RE.is_match(rest);
        if !in_fence {
            let command = strip_quoting(rest);
            if !command.is_empty() {
                return TagScan::Found(command.to_string());
            }
        }
        return match scan_after_tag(lines, in_fence) {
            Some(command) => TagScan::Found(command),
            None => TagScan::Malformed,
        };
    }
    TagScan::Absent
}

fn emphasis_count(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '*' | '_')).count()
}

/// Drop up to `count` trailing emphasis markers.
fn trim_emphasis(text: &str, count: usize) -> &str {
    let mut s = text.trim_end();
    for _ in 0..count {
        match s.strip_suffix(['*', '_']) {
            Some(shorter) => s = shorter,
            None => break,
        }
    }
    s.trim_end()
}

/// Find the first usable line after a bare tag, stopping at the next tag.
///
/// `in_fence` is set when the tag line itself opened a code fence.
fn scan_after_tag<'a>(
    lines: impl Iterator<Item = &'a str>,
    mut in_fence: bool,
) -> Option<String> {
    for raw in lines {
        let line = raw.trim();
        if FENCE_RE.is_match(line) {
            in_fence = !in_fence;
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if in_fence {
            return Some(line.to_string());
        }
        if starts_new_tag(line) {
            return None;
        }
        let command = strip_quoting(line);
        if !command.is_empty() {
            return Some(command.to_string());
        }
    }
    None
}

fn starts_new_tag(line: &str) -> bool {
    let lead = line.trim_start_matches(ADORNMENTS);
    lead.starts_with('<') || SECTION_RE.is_match(lead)
}

fn inline_fallback(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let captured = INLINE_RE.captures(line)?.get(1)?.as_str();
        let captured = captured.trim_end_matches(['*', '_']).trim();
        let unwrapped = captured
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
            .unwrap_or(captured);
        let command = strip_quoting(unwrapped);
        (!command.is_empty()).then(|| command.to_string())
    })
}

/// Remove one layer of surrounding backticks, then one pair of matching quotes.
///
/// A pair is only removed when the delimiter does not also occur inside, so
/// `"a" && "b"` stays intact.
fn strip_quoting(text: &str) -> &str {
    let mut s = text.trim();

    let ticks = s.chars().take_while(|c| *c == '`').count();
    if ticks > 0 && s.len() > 2 * ticks && s.ends_with(&s[..ticks]) {
        let inner = &s[ticks..s.len() - ticks];
        if ticks > 1 || !inner.contains('`') {
            s = inner.trim();
        }
    }

    if let Some(first) = s.chars().next()
        && (first == '"' || first == '\'')
        && s.len() >= 2
        && s.ends_with(first)
    {
        let inner = &s[1..s.len() - 1];
        if !inner.contains(first) {
            s = inner.trim();
        }
    }

    s
}
