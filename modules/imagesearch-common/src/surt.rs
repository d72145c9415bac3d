// Canonical keys: Sort-friendly URI Reordering Transform.
//
// "http://www.example.com/a?b" → "com,example)/a?b". The key is the identity
// used to group occurrences and to name the endpoints of link edges.

const SCHEME_PREFIXES: [&str; 3] = ["//", "https://", "http://"];
const HOST_PREFIXES: [&str; 3] = ["www.", "ww2.", "ww3."];
const OPAQUE_PREFIXES: [&str; 2] = ["data:", "hash:"];

/// Turn a raw URL into its canonical key.
///
/// Opaque `data:`/`hash:` URLs and blank remainders come back unchanged; a
/// blank result means the URL carries no identity. Already-canonical keys are
/// returned as-is, so the function is idempotent.
pub fn canonicalize(url: &str) -> String {
    if OPAQUE_PREFIXES.iter().any(|p| url.starts_with(p)) {
        return url.to_string();
    }

    let rest = strip_first(url, &SCHEME_PREFIXES);
    let rest = strip_first(rest, &HOST_PREFIXES);

    if rest.trim().is_empty() {
        return rest.to_string();
    }

    let (scheme, rest) = match rest.split_once("://") {
        Some((scheme, tail)) if is_scheme(scheme) => (Some(scheme), tail),
        _ => (None, rest),
    };

    let key = if is_canonical(rest) {
        rest.to_string()
    } else {
        reorder(rest)
    };
    match scheme {
        Some(scheme) => format!("{}://{key}", scheme.to_ascii_lowercase()),
        None => key,
    }
}

/// The authority segment of a canonical key: everything before the first `)`.
/// "com,example)/a" → "com,example"
pub fn authority(key: &str) -> &str {
    key.split(')').next().unwrap_or(key)
}

/// False for the blank keys that degenerate URLs canonicalize to.
pub fn has_identity(key: &str) -> bool {
    !key.trim().is_empty()
}

fn strip_first<'a>(s: &'a str, prefixes: &[&str]) -> &'a str {
    prefixes
        .iter()
        .find_map(|p| s.strip_prefix(p))
        .unwrap_or(s)
}

fn is_scheme(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

fn is_canonical(s: &str) -> bool {
    let end = s.find(['/', '?', '#']).unwrap_or(s.len());
    s[..end].ends_with(')')
}

fn reorder(rest: &str) -> String {
    let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(split);
    let tail = tail.split('#').next().unwrap_or("");

    let path = if tail.is_empty() {
        "/".to_string()
    } else if tail.starts_with('?') {
        format!("/{tail}")
    } else {
        tail.to_string()
    };

    format!("{}){path}", reverse_host(authority))
}

fn reverse_host(authority: &str) -> String {
    // Drop userinfo.
    let hostport = authority.rsplit('@').next().unwrap_or(authority);

    // IPv6 literals are kept verbatim.
    if hostport.starts_with('[') {
        return hostport.to_ascii_lowercase();
    }

    let (host, port) = match hostport.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => (h, p),
        _ => (hostport, ""),
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let reversed: Vec<&str> = host.split('.').filter(|s| !s.is_empty()).rev().collect();
    let reversed = reversed.join(",");

    match port {
        "" | "80" | "443" => reversed,
        p => format!("{reversed}:{p}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_authority_and_keeps_path() {
        assert_eq!(canonicalize("http://www.example.com/x"), "com,example)/x");
        assert_eq!(
            canonicalize("https://news.example.co.uk/a/b.png?s=1"),
            "uk,co,example,news)/a/b.png?s=1"
        );
    }

    #[test]
    fn scheme_and_www_prefix_insensitive() {
        let a = canonicalize("http://www.example.com/x");
        let b = canonicalize("https://example.com/x");
        let c = canonicalize("//example.com/x");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn idempotent() {
        for url in [
            "http://www.example.com/x",
            "https://Example.COM:8080/a?b=c#frag",
            "ftp://files.example.org/pub",
            "example.com",
            "http://192.168.0.1/",
            "data:image/png;base64,AAAA",
            "",
        ] {
            let once = canonicalize(url);
            assert_eq!(canonicalize(&once), once, "not idempotent for {url}");
        }
    }

    #[test]
    fn only_one_prefix_of_each_kind_is_stripped() {
        // "www." after "ww2." is part of the host.
        assert_eq!(canonicalize("http://ww2.www.example.com/"), "com,example,www)/");
    }

    #[test]
    fn opaque_urls_untouched() {
        assert_eq!(canonicalize("data:image/gif;base64,R0lG"), "data:image/gif;base64,R0lG");
        assert_eq!(canonicalize("hash:abc"), "hash:abc");
    }

    #[test]
    fn degenerate_input_returned_unchanged() {
        assert_eq!(canonicalize("http://"), "");
        assert_eq!(canonicalize("http://www.   "), "   ");
        assert!(!has_identity(&canonicalize("https://www.")));
    }

    #[test]
    fn default_ports_and_fragments_dropped() {
        assert_eq!(canonicalize("http://example.com:80/a#top"), "com,example)/a");
        assert_eq!(canonicalize("http://example.com:8080/a"), "com,example:8080)/a");
    }

    #[test]
    fn bare_host_gets_root_path() {
        assert_eq!(canonicalize("http://example.com"), "com,example)/");
        assert_eq!(canonicalize("http://example.com?q=1"), "com,example)/?q=1");
    }

    #[test]
    fn authority_segment() {
        assert_eq!(authority("com,example)/a/b"), "com,example");
        assert_eq!(authority("no-paren"), "no-paren");
    }
}
