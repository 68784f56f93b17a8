//! Word tokenization for lexical scoring.
//!
//! The primary tokenizer is Unicode-aware: words keep inner apostrophes and
//! hyphens (`d'água`, `pós-graduação`), punctuation marks become tokens of
//! their own. Without a word pattern, text is split on whitespace instead.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:['’\-]\w+)*|[^\w\s]").unwrap());

/// Tokenize `text` for indexing or querying. Never fails.
///
/// Input is lowercased before splitting so that index and query terms
/// normalise the same way.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with(text, Some(&*WORD_RE))
}

/// Tokenize with `word_re`, or split on whitespace when no word pattern is
/// available.
pub(crate) fn tokenize_with(text: &str, word_re: Option<&Regex>) -> Vec<String> {
    let lowered = text.to_lowercase();
    match word_re {
        Some(re) => re
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect(),
        None => {
            tracing::debug!("word tokenizer unavailable, using whitespace split");
            lowered.split_whitespace().map(str::to_string).collect()
        }
    }
}
