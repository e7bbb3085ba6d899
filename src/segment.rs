//! Sentence segmentation.
//!
//! Splits raw user text into parallel (sentence, delimiter) lists so the
//! reply can be reassembled with an emoji fragment behind every sentence.
//! CJK text is split on a fixed punctuation class; everything else goes
//! through Unicode sentence boundaries with trailing punctuation peeled off
//! into the delimiter list.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;
use whatlang::Lang;

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://\S+|www\.\S+").expect("URL regex must compile")
});

static TRAILING_PUNCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\w\s]+$").expect("trailing punctuation regex must compile")
});

/// Punctuation treated as a sentence delimiter in CJK text. Whitespace counts
/// as well (see [`is_cjk_delimiter`]).
const CJK_DELIMITERS: &[char] = &['，', ',', '。', '.', '？', '?', '！', '!', ';'];

fn is_cjk_delimiter(c: char) -> bool {
    c.is_whitespace() || CJK_DELIMITERS.contains(&c)
}

/// Parallel sentence/delimiter lists produced by [`segment`].
///
/// Invariant: `delimiters.len() <= sentences.len()`. Delimiter `i` is the
/// separator that followed sentence `i` in the original text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub sentences: Vec<String>,
    pub delimiters: Vec<String>,
}

/// Split raw input text into sentences and their trailing delimiters.
///
/// URLs are stripped first. Empty or whitespace-only input yields empty
/// lists.
#[must_use]
pub fn segment(input: &str) -> Segments {
    let stripped = URL_RE.replace_all(input, "");
    if stripped.trim().is_empty() {
        return Segments::default();
    }

    if is_cjk_family(&stripped) {
        split_cjk(&stripped)
    } else {
        split_on_sentence_bounds(&stripped)
    }
}

/// Language-family check backed by the whatlang classifier. Mandarin,
/// Japanese and Korean take the punctuation-class split path.
fn is_cjk_family(text: &str) -> bool {
    let flattened = text.replace('\n', "");
    matches!(
        whatlang::detect(&flattened).map(|info| info.lang()),
        Some(Lang::Cmn | Lang::Jpn | Lang::Kor)
    )
}

fn split_cjk(text: &str) -> Segments {
    let text = text.trim_matches([' ', '\n']);

    let mut sentences = Vec::new();
    let mut delimiters = Vec::new();
    let mut sentence = String::new();
    let mut delimiter = String::new();

    for c in text.chars() {
        if is_cjk_delimiter(c) {
            delimiter.push(c);
        } else {
            if !delimiter.is_empty() {
                sentences.push(std::mem::take(&mut sentence));
                delimiters.push(std::mem::take(&mut delimiter));
            }
            sentence.push(c);
        }
    }
    sentences.push(sentence);
    if !delimiter.is_empty() {
        delimiters.push(delimiter);
    }

    // Trailing delimiters leave an empty last sentence behind; drop it.
    while sentences.last().is_some_and(String::is_empty) {
        sentences.pop();
        if delimiters.len() > sentences.len() {
            delimiters.pop();
        }
    }

    Segments { sentences, delimiters }
}

fn split_on_sentence_bounds(text: &str) -> Segments {
    let mut sentences = Vec::new();
    let mut delimiters = Vec::new();

    for sentence in text.split_sentence_bounds() {
        match TRAILING_PUNCT_RE.find(sentence) {
            Some(m) => {
                sentences.push(sentence[..m.start()].to_string());
                delimiters.push(sentence[m.start()..].to_string());
            }
            None => {
                sentences.push(sentence.to_string());
                delimiters.push(String::new());
            }
        }
    }

    Segments { sentences, delimiters }
}
