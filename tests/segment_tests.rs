use hahadog::assemble::interleave;
use hahadog::segment::segment;

fn empty_fragments(count: usize) -> Vec<String> {
    vec![String::new(); count]
}

fn round_trip(input: &str) -> String {
    let segments = segment(input);
    let fragments = empty_fragments(segments.sentences.len());
    interleave(&segments.sentences, &fragments, &segments.delimiters)
}

#[test]
fn test_cjk_segmentation() {
    let segments = segment("你好，世界");
    assert_eq!(segments.sentences, vec!["你好", "世界"]);
    assert_eq!(segments.delimiters, vec!["，"]);
}

#[test]
fn test_cjk_multiple_sentence_kinds() {
    let segments = segment("早安。吃飽沒？想吃什麼！");
    assert_eq!(segments.sentences, vec!["早安", "吃飽沒", "想吃什麼"]);
    assert_eq!(segments.delimiters, vec!["。", "？", "！"]);
}

#[test]
fn test_non_cjk_trailing_punctuation_becomes_delimiter() {
    let segments = segment("Hello there. General Kenobi!");
    assert_eq!(segments.sentences.last().unwrap(), "General Kenobi");
    assert_eq!(segments.delimiters.last().unwrap(), "!");
}

#[test]
fn test_identity_round_trip() {
    // Segmenting and reassembling with empty fragments must reproduce the
    // input exactly; this is what keeps the lenient interleave honest.
    for input in [
        "你好，世界",
        "早安。吃飽沒？想吃什麼！",
        "今天 天氣很好\n出去玩吧",
        "Hello there. General Kenobi!",
        "no punctuation at all",
        "一句話",
    ] {
        assert_eq!(round_trip(input), input, "round trip failed for {input:?}");
    }
}

#[test]
fn test_url_is_stripped_before_segmentation() {
    let segments = segment("看看這個 https://example.com/x 很有趣");
    for sentence in &segments.sentences {
        assert!(!sentence.contains("example.com"), "URL leaked into {sentence:?}");
    }
}

#[test]
fn test_empty_and_whitespace_input() {
    assert!(segment("").sentences.is_empty());
    assert!(segment(" \n\t ").sentences.is_empty());
}

#[test]
fn test_assembler_keeps_all_sentences_with_unequal_lists() {
    let sentences: Vec<String> = ["甲", "乙", "丙"].iter().map(|s| (*s).to_string()).collect();
    let fragments: Vec<String> = ["😀", "😺"].iter().map(|s| (*s).to_string()).collect();
    let delimiters: Vec<String> = ["，", "。"].iter().map(|s| (*s).to_string()).collect();

    let out = interleave(&sentences, &fragments, &delimiters);

    // All original sentence text present exactly once, in order, with the
    // leftover sentence appended before leftover fragments/delimiters.
    assert_eq!(out, "甲😀，乙😺。丙");
}
