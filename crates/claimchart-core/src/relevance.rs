//! Keyword-based excerpt extraction.
//!
//! No tokenizer is involved: keywords are whitespace-separated runs of word
//! characters longer than two characters, and a sentence is relevant when it
//! contains any keyword as a substring.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_MAX_LENGTH: usize = 500;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation regex"));

const SENTENCE_ENDINGS: [char; 3] = ['。', '！', '？'];

/// Return the part of `document` most relevant to `feature`, at most
/// `max_length` characters long.
///
/// Falls back to the head of the document when the feature yields no
/// keywords or no sentence matches.
pub fn find_relevant(feature: &str, document: &str, max_length: usize) -> String {
    let keywords = extract_keywords(feature);
    if keywords.is_empty() {
        return truncate_chars(document, max_length);
    }

    let mut relevant: Vec<&str> = Vec::new();
    let mut joined_len = 0usize;
    for sentence in document.split(SENTENCE_ENDINGS) {
        if !keywords.iter().any(|k| sentence.contains(k.as_str())) {
            continue;
        }
        if !relevant.is_empty() {
            joined_len += 1;
        }
        joined_len += sentence.chars().count();
        relevant.push(sentence);
        if joined_len > max_length {
            break;
        }
    }

    if relevant.is_empty() {
        return truncate_chars(document, max_length);
    }
    truncate_chars(&relevant.join("。"), max_length)
}

fn extract_keywords(feature: &str) -> Vec<String> {
    PUNCTUATION
        .replace_all(feature, " ")
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

fn truncate_chars(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
