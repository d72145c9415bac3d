// Text helpers for index fields: URL word-splitting and size ceilings.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Largest string the search index accepts in a single field.
pub const MAX_INDEX_FIELD_CHARS: usize = 10_000;

/// Split a URL into space-separated word tokens for text indexing.
/// Percent-escapes are decoded and accents stripped first.
/// "http://a.pt/Fot%C3%B3s/praia-1.jpg" → "http a pt Fotos praia 1 jpg"
pub fn url_tokens(url: &str) -> String {
    let decoded = urlencoding::decode(url)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| url.to_string());
    strip_accents(&decoded)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decompose (NFD) and drop combining marks: "Dvořák" → "Dvorak".
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Host and scheme of an absolute URL. Scheme-less input is read as http.
pub fn host_and_protocol(raw: &str) -> Option<(String, String)> {
    let parsed = if raw.contains("://") {
        url::Url::parse(raw).ok()?
    } else {
        url::Url::parse(&format!("http://{}", raw.trim_start_matches("//"))).ok()?
    };
    let host = parsed.host_str()?.to_string();
    Some((host, parsed.scheme().to_string()))
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// True when `s` is too long to be stored in an index field.
pub fn exceeds_index_field(s: &str) -> bool {
    s.chars().count() > MAX_INDEX_FIELD_CHARS
}
