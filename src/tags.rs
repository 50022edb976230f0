//! Inline paralinguistic tag handling.
//!
//! Engines that understand bracketed tokens like `[laugh]` declare a tag
//! vocabulary; tokens outside it are stripped before dispatch so they are
//! never spoken literally. Engines with an empty vocabulary get the text
//! untouched, brackets and all.

use std::collections::BTreeSet;

use tracing::warn;

/// Result of one rewrite pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TagOutcome {
    pub text: String,
    /// Words of the tokens that were removed, in order of appearance.
    pub stripped: Vec<String>,
}

/// Rewrite `text` against a tag vocabulary (lowercase entries).
///
/// A token is `[` + word characters + `]`. Known tokens are kept exactly as
/// written (matching is case-insensitive); unknown tokens are removed along
/// with one adjacent space so no doubled spacing is left behind. Anything
/// not shaped like a token passes through untouched.
pub fn rewrite(text: &str, vocabulary: &BTreeSet<String>) -> TagOutcome {
    if vocabulary.is_empty() {
        return TagOutcome {
            text: text.to_string(),
            stripped: Vec::new(),
        };
    }

    let mut out = String::with_capacity(text.len());
    let mut stripped = Vec::new();
    let mut iter = text.char_indices().peekable();

    while let Some((start, c)) = iter.next() {
        if c != '[' {
            out.push(c);
            continue;
        }

        match token_end(text, start) {
            None => out.push(c),
            Some(end) => {
                let word = &text[start + 1..end];
                if vocabulary.contains(&word.to_lowercase()) {
                    out.push_str(&text[start..=end]);
                } else {
                    warn!(tag = word, "dropping unknown inline tag");
                    stripped.push(word.to_string());
                }
                // Skip the scanner past the token body.
                while let Some(&(idx, _)) = iter.peek() {
                    if idx > end {
                        break;
                    }
                    iter.next();
                }
                // After a removal, swallow one following space when the
                // output already ends in whitespace (or is empty).
                if !vocabulary.contains(&word.to_lowercase())
                    && out.chars().next_back().map_or(true, char::is_whitespace)
                {
                    if let Some(&(_, ' ')) = iter.peek() {
                        iter.next();
                    }
                }
            }
        }
    }

    if !stripped.is_empty() {
        out = out.trim().to_string();
    }

    TagOutcome { text: out, stripped }
}

// Byte index of the closing ']' if a well-formed token starts at `open`.
fn token_end(text: &str, open: usize) -> Option<usize> {
    let mut saw_word = false;
    for (idx, c) in text[open + 1..].char_indices() {
        if c == ']' {
            return saw_word.then_some(open + 1 + idx);
        }
        if c.is_alphanumeric() || c == '_' {
            saw_word = true;
        } else {
            return None;
        }
    }
    None
}
