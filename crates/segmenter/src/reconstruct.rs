//! Token-to-word reconstruction.
//!
//! Tokens are folded into one string: fragments containing `##` are glued to
//! the previous text with every `##` removed, `I` tokens are joined with `_`,
//! anything else opens a new word after a space. The string is then split on
//! whitespace. A leading SentencePiece marker `▁` is dropped from fragments
//! first; word boundaries stay label-driven.

use crate::token::{ClassificationToken, EntityLabel};

const CONTINUATION: &str = "##";
const WORD_START: char = '\u{2581}';

pub fn reconstruct_words(tokens: &[ClassificationToken]) -> Vec<String> {
    let mut joined = String::new();
    for token in tokens {
        let fragment = token.word.strip_prefix(WORD_START).unwrap_or(token.word.as_str());
        if fragment.contains(CONTINUATION) {
            joined.push_str(&fragment.replace(CONTINUATION, ""));
        } else if token.entity == EntityLabel::Inside {
            joined.push('_');
            joined.push_str(fragment);
        } else {
            joined.push(' ');
            joined.push_str(fragment);
        }
    }
    joined.split_whitespace().map(str::to_string).collect()
}

pub fn apply_case(words: Vec<String>, preserve_case: bool) -> Vec<String> {
    if preserve_case {
        words
    } else {
        words.into_iter().map(|word| word.to_lowercase()).collect()
    }
}
