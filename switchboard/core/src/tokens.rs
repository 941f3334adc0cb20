//! Prompt size estimation
//!
//! A cheap heuristic, good enough for logging. It is not a tokenizer.

/// Estimate the token count of `text`
///
/// `max(floor(words * 1.3), chars / 4)`, or 0 for blank text.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }
    let words = text.split_whitespace().count();
    let by_words = words * 13 / 10;
    let by_chars = text.chars().count() / 4;
    by_words.max(by_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("  \n\t "), 0);
    }

    #[test]
    fn test_word_heuristic() {
        // 10 words -> 13, 48 chars -> 12
        assert_eq!(estimate_tokens("one two three four five six seven eight nine ten"), 13);
        assert_eq!(estimate_tokens("hi"), 1);
    }

    #[test]
    fn test_char_heuristic_wins_for_long_words() {
        let text = "a".repeat(400);
        assert_eq!(estimate_tokens(&text), 100);
    }
}
