//! Keyword matching for the intent and qualification tables. All matching
//! is on lowercased text.

/// Lowercased word tokens of `text`, split on anything that is not
/// alphanumeric or an apostrophe.
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// True when `keyword` occurs in `text`. Single words must match a whole
/// token; phrases match as a substring of the normalized text.
pub fn has_keyword(lower: &str, tokens: &[String], keyword: &str) -> bool {
    if keyword.contains(' ') {
        lower.contains(keyword)
    } else {
        tokens.iter().any(|t| t == keyword)
    }
}

/// True when any keyword from `list` occurs in `text`.
pub fn mentions(text: &str, list: &[&str]) -> bool {
    let lower = text.to_lowercase();
    let tokens = words(text);
    list.iter().any(|kw| has_keyword(&lower, &tokens, kw))
}

/// Number of keywords from `list` found in `text`.
pub fn count_matches(text: &str, list: &[&str]) -> usize {
    let lower = text.to_lowercase();
    let tokens = words(text);
    list.iter()
        .filter(|kw| has_keyword(&lower, &tokens, kw))
        .count()
}

/// The first keyword from `list` found in `text`.
pub fn first_match(text: &str, list: &[&'static str]) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let tokens = words(text);
    list.iter()
        .copied()
        .find(|kw| has_keyword(&lower, &tokens, kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_words_need_whole_tokens() {
        assert_eq!(count_matches("We want a view", &["we"]), 1);
        assert_eq!(count_matches("The weather is nice", &["we"]), 0);
    }

    #[test]
    fn mentions_any() {
        assert!(mentions("Can I CALL you?", &["call", "email"]));
        // "recall" must not trigger "call".
        assert!(!mentions("I recall the brochure", &["call"]));
    }

    #[test]
    fn phrases_match_substrings() {
        assert_eq!(first_match("How much is it?", &["price", "how much"]), Some("how much"));
    }
}
