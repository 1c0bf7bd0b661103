//! Keyword-containment matching with word and phrase boundaries.
//!
//! A keyword matches only when its words appear as a consecutive run of
//! whole words in the text: `"fire"` matches `"Brush Fire"` but not
//! `"Firearm Violation"`, and the multi-word `"evacuation order"` matches
//! `"Evacuation - order issued"` (punctuation and line breaks between the
//! words are tolerated, by design of the tokenizer).

/// Lowercase alphanumeric word tokens of `s`, in order.
fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `keyword`'s word sequence occurs contiguously in `text`.
#[must_use]
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    let needle = tokens(keyword);
    if needle.is_empty() {
        return false;
    }
    let haystack = tokens(text);
    haystack
        .windows(needle.len())
        .any(|window| window == needle.as_slice())
}

/// Whether any keyword in `keywords` matches `text`.
#[must_use]
pub fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| contains_keyword(text, keyword))
}
