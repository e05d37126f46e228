use regex::Regex;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Treebank-style tokens: "n't" contractions, ellipses, clitics, words, and
/// every other non-space character on its own.
static TREEBANK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\w+n't|\.\.\.|'(?:s|re|ve|ll|d|m)\b|\w+|[^\w\s]").unwrap()
});

/// Count-vectorizer token pattern: words of two or more word characters.
static COUNT_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Lowercase word tokens, in text order.
pub fn word_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Lowercase Penn Treebank style tokens. Punctuation marks are tokens,
/// "don't" splits into "do" + "n't" and "it's" into "it" + "'s".
pub fn treebank_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    for m in TREEBANK.find_iter(&lower) {
        let token = m.as_str();
        match token.strip_suffix("n't") {
            Some(stem) if !stem.is_empty() => {
                tokens.push(stem.to_string());
                tokens.push("n't".to_string());
            }
            _ => tokens.push(token.to_string()),
        }
    }
    tokens
}

/// Lowercase bag-of-words tokens as a count vectorizer would extract them.
/// Single-character words are dropped.
pub fn count_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    COUNT_TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}
