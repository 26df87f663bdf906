// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Text cleanup and length-bounded slicing.
//!
//! ChatGPT exports carry a fair amount of noise that has no meaning outside
//! the ChatGPT web client: private-use glyphs that delimit citations,
//! citation tokens such as `citeturn0search3`, and page markers left behind
//! by the file reader. [`sanitize`] strips all of it. [`split_text`] and
//! [`truncate_label`] keep text under the outliner's label length limit.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Maximum number of characters allowed in a single node label.
pub const MAX_LABEL_CHARS: usize = 4000;

/// Marker appended to truncated text and around split points.
pub const ELLIPSIS: &str = "...";

/// Replacement for citation tokens.
const CITATION_PLACEHOLDER: &str = "[file]";

/// Citation tokens that remain once the private-use delimiters are gone,
/// e.g. `citeturn0search3turn0news12` or `filecite turn2file0 L10-L20`.
static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:file|nav)?(?:cite|list)(?:\s?turn\d+[a-z]+\d+)+(?:\s?L\d+(?:-L\d+)?)?")
        .expect("valid regex")
});

/// Page markers inserted by the file reader tool.
static PAGE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:PARSED TEXT FOR PAGE|IMAGE FOR PAGE):\s*\d+\s*/\s*\d+>").expect("valid regex")
});

/// Returns `true` for characters in any of the Unicode private-use areas.
const fn is_private_use(c: char) -> bool {
    matches!(c, '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}')
}

/// Cleans raw turn text for use as node labels.
///
/// In order: drops private-use characters, replaces citation tokens with
/// `[file]`, removes page markers, normalizes line endings to `\n`, drops
/// control characters other than newline and tab, and trims the result.
///
/// The pipeline is repeated until the text stops changing, so markers that
/// only become visible after noise between them is removed are caught too.
/// That makes the function idempotent. Every pass that changes the text
/// either shortens it or removes a carriage return, so the loop ends.
///
/// # Example
///
/// ```
/// use chat2tana::text::sanitize;
///
/// let raw = "See \u{e200}citeturn0search1\u{e201} for details.\r\n";
/// assert_eq!(sanitize(raw), "See [file] for details.");
/// ```
#[must_use]
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_once(text);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let visible: String = text.chars().filter(|&c| !is_private_use(c)).collect();
    let cited = CITATION_RE.replace_all(&visible, CITATION_PLACEHOLDER);
    let unmarked = PAGE_MARKER_RE.replace_all(&cited, "");
    let normalized = unmarked.replace("\r\n", "\n").replace('\r', "\n");

    normalized
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Shortens `text` to at most `max_chars` characters, ending in `...` when
/// anything was cut.
///
/// Returns the input unchanged (borrowed) when it already fits.
#[must_use]
pub fn truncate_label(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// Splits prefer the last space at or before `max_chars - 3`. When there is
/// no such space, or it sits in the first half of the window, the text is
/// cut hard at `max_chars - 3` so that no chunk ends up nearly empty. Each
/// emitted chunk except the last ends with `...` and each chunk except the
/// first starts with `...`.
///
/// Limits too small to hold the continuation markers fall back to plain
/// fixed-width slicing.
///
/// # Example
///
/// ```
/// use chat2tana::text::split_text;
///
/// let chunks = split_text("alpha beta gamma delta", 14);
/// assert_eq!(chunks, ["alpha beta...", "...gamma delta"]);
/// ```
#[must_use]
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut rest: Vec<char> = text.chars().collect();

    if rest.len() <= max_chars {
        return vec![text.to_owned()];
    }

    // Each marked split keeps max_chars - 3 and re-adds 3, so the
    // remainder only shrinks when more than 6 characters fit.
    if max_chars <= 2 * ELLIPSIS.len() {
        return rest
            .chunks(max_chars)
            .map(|chunk| chunk.iter().collect())
            .collect();
    }

    let window = max_chars - ELLIPSIS.len();
    let mut chunks = Vec::new();

    while rest.len() > max_chars {
        let space = rest[..=window].iter().rposition(|&c| c == ' ');
        let (head, tail_start) = match space {
            Some(pos) if pos >= max_chars / 2 => (&rest[..pos], pos + 1),
            _ => (&rest[..window], window),
        };

        let mut chunk: String = head.iter().collect();
        chunk.truncate(chunk.trim_end().len());
        chunk.push_str(ELLIPSIS);
        chunks.push(chunk);

        let mut next: Vec<char> = ELLIPSIS.chars().collect();
        next.extend(rest[tail_start..].iter().skip_while(|c| **c == ' '));
        rest = next;
    }

    chunks.push(rest.into_iter().collect());
    chunks
}
