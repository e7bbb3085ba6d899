//! Reply reassembly.
//!
//! Zips the sentence, fragment and delimiter lists back into one string.
//! List lengths can diverge by a few elements depending on how segmentation
//! went, so the interleave is deliberately lenient: it never drops input
//! text, it only changes where the leftovers land.

/// Interleave sentences, generated fragments and delimiters into the reply
/// string.
///
/// Elements are zipped up to the shortest common length as
/// `sentence, fragment, delimiter, ...`; any leftover tail elements are then
/// appended in the fixed order sentences, fragments, delimiters. The
/// tie-break order is load-bearing: given empty fragments this reproduces
/// the segmenter's input exactly.
#[must_use]
pub fn interleave(sentences: &[String], fragments: &[String], delimiters: &[String]) -> String {
    let min_len = sentences
        .len()
        .min(fragments.len())
        .min(delimiters.len());

    let mut output = String::new();
    for i in 0..min_len {
        output.push_str(&sentences[i]);
        output.push_str(&fragments[i]);
        output.push_str(&delimiters[i]);
    }
    for sentence in &sentences[min_len..] {
        output.push_str(sentence);
    }
    for fragment in &fragments[min_len..] {
        output.push_str(fragment);
    }
    for delimiter in &delimiters[min_len..] {
        output.push_str(delimiter);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_equal_lengths() {
        let out = interleave(
            &strings(&["a", "b"]),
            &strings(&["😀", "😺"]),
            &strings(&["，", "。"]),
        );
        assert_eq!(out, "a😀，b😺。");
    }

    #[test]
    fn test_short_delimiters() {
        let out = interleave(
            &strings(&["你好", "世界"]),
            &strings(&["😀", "🌍"]),
            &strings(&["，"]),
        );
        assert_eq!(out, "你好😀，世界🌍");
    }

    #[test]
    fn test_all_empty() {
        assert_eq!(interleave(&[], &[], &[]), "");
    }
}
