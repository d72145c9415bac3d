use std::sync::LazyLock;

use regex::Regex;

use imagesearch_common::text::{truncate_chars, MAX_INDEX_FIELD_CHARS};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img\b([^>]*)>").expect("valid regex"));
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid regex"));
/// One attribute: `name="v"`, `name='v'` or `name=v`.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("valid regex")
});
static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->").expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// An `<img>` tag. `src` is absolute, or empty when it could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgTag {
    pub src: String,
    pub title: String,
    pub alt: String,
}

/// An `<a href>` with its anchor text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub title: String,
    pub images: Vec<ImgTag>,
    pub anchors: Vec<Anchor>,
    /// Visible text, whitespace-collapsed and capped at the index field size.
    pub text: String,
}

/// Turns an HTML payload into the facts the indexer needs.
pub trait HtmlParser: Send + Sync {
    fn parse(&self, html: &str, base_url: &str) -> ParsedPage;
}

/// Tolerant regex-based parser. Never fails; malformed markup just yields less.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexHtmlParser;

impl HtmlParser for RegexHtmlParser {
    fn parse(&self, html: &str, base_url: &str) -> ParsedPage {
        let base = url::Url::parse(base_url).ok();

        let title = TITLE_RE
            .captures(html)
            .map(|c| collapse(&decode_entities(&c[1])))
            .unwrap_or_default();

        let images = IMG_RE
            .captures_iter(html)
            .map(|c| {
                let attrs = &c[1];
                ImgTag {
                    src: attr(attrs, "src")
                        .and_then(|raw| resolve(&raw, base.as_ref(), false))
                        .unwrap_or_default(),
                    title: attr(attrs, "title").unwrap_or_default(),
                    alt: attr(attrs, "alt").unwrap_or_default(),
                }
            })
            .collect();

        let anchors = ANCHOR_RE
            .captures_iter(html)
            .filter_map(|c| {
                let href = resolve(&attr(&c[1], "href")?, base.as_ref(), true)?;
                if !href.starts_with("http://") && !href.starts_with("https://") {
                    return None;
                }
                Some(Anchor {
                    href,
                    text: visible_text(&c[2]),
                })
            })
            .collect();

        ParsedPage {
            title,
            images,
            anchors,
            text: truncate_chars(&visible_text(html), MAX_INDEX_FIELD_CHARS),
        }
    }
}

/// Value of attribute `name` inside a tag's attribute string, entity-decoded.
fn attr(attrs: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(attrs)
        .find(|c| c[1].eq_ignore_ascii_case(name))
        .map(|c| {
            let raw = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4)).map_or("", |m| m.as_str());
            decode_entities(raw)
        })
}

/// Resolve a raw reference against the page URL.
fn resolve(raw: &str, base: Option<&url::Url>, strip_fragment: bool) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut parsed = match url::Url::parse(raw) {
        Ok(abs) => abs,
        Err(_) => base?.join(raw).ok()?,
    };
    if strip_fragment {
        parsed.set_fragment(None);
    }
    Some(parsed.to_string())
}

fn visible_text(html: &str) -> String {
    let without_code = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_code, " ");
    collapse(&decode_entities(&without_tags))
}

fn collapse(s: &str) -> String {
    SPACE_RE.replace_all(s, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    // Non-breaking spaces index as plain spaces.
    html_escape::decode_html_entities(&s.replace("&nbsp;", " ")).into_owned()
}
