//! Post-generation cleanup of raw model text.
//!
//! Strips chat-template artefacts (end-of-turn tokens, thinking blocks)
//! before decoding. Runs on every backend response.

use std::sync::LazyLock;

use regex::Regex;

static SPECIAL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<\|(?:eot_id|end_of_text|begin_of_text|im_end|im_start|endoftext|user|assistant|observation)\|>|</?s>|\[/?INST\]",
    )
    .expect("valid regex")
});

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Strip model artefacts from raw output.
///
/// Handles:
/// 1. `<think>...</think>` reasoning blocks
/// 2. Chat-template special tokens echoed into the text
/// 3. Leading/trailing whitespace left by stripping
pub fn sanitize_model_output(raw: &str) -> String {
    let text = THINK_BLOCK_RE.replace_all(raw, "");
    let text = SPECIAL_TOKEN_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Cut the text at the first stop sequence, if a backend ignored it.
pub fn truncate_at_stop<'a>(text: &'a str, stops: &[&str]) -> &'a str {
    let cut = stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s))
        .min();
    match cut {
        Some(idx) => &text[..idx],
        None => text,
    }
}
