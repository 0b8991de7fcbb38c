//! Line-level boilerplate removal and the content quality gate.

/// Minimum number of words for extracted text to count as an article.
pub const MIN_WORDS: usize = 50;

const COOKIE_PATTERNS: [&str; 6] = [
    "we use cookies",
    "cookie policy",
    "accept all",
    "reject all",
    "gdpr",
    "privacy settings",
];

/// Cookie lines at or above this many words are kept: they are prose that
/// happens to mention a cookie phrase.
const COOKIE_MAX_WORDS: usize = 15;

const NAV_PHRASES: [&str; 4] = ["log in", "sign up", "menu", "what can i help with"];

const NAV_MAX_WORDS: usize = 5;

const COOKIE_PREFIXES: [&str; 2] = ["we use cookies", "cookie policy"];

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn is_cookie_banner(line: &str) -> bool {
    let lower = line.to_lowercase();
    word_count(line) < COOKIE_MAX_WORDS && COOKIE_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_navigation(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    NAV_PHRASES.iter().any(|p| lower.contains(p)) && word_count(&lower) <= NAV_MAX_WORDS
}

pub fn remove_cookie_banners(text: &str) -> String {
    text.lines()
        .filter(|line| !is_cookie_banner(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn remove_navigation(text: &str) -> String {
    text.lines()
        .filter(|line| !is_navigation(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops cookie banners, then navigation chrome, and trims the result.
pub fn clean(text: &str) -> String {
    let text = remove_cookie_banners(text);
    let text = remove_navigation(&text);
    text.trim().to_string()
}

/// True when `text` has at least `min_words` words and does not open with a
/// cookie notice.
pub fn is_valid(text: &str, min_words: usize) -> bool {
    let lower = text.to_lowercase();
    word_count(text) >= min_words && !COOKIE_PREFIXES.iter().any(|p| lower.starts_with(p))
}
