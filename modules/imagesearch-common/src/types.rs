use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::digest::{capture_digest, sha256_hex};
use crate::surt::canonicalize;
use crate::temporal::Captured;
use crate::text::{exceeds_index_field, truncate_chars, url_tokens, MAX_INDEX_FIELD_CHARS};
use crate::timestamp::CaptureTime;

/// Upper bound on the image bytes carried along for dimension probing.
pub const MAX_SAMPLE_BYTES: usize = 64 * 1024;

// --- Occurrences ---

/// One sighting of a binary image in a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOccurrence {
    pub url: String,
    pub canonical_key: String,
    pub capture_time: CaptureTime,
    pub mime_detected: String,
    pub mime_reported: String,
    pub collection: String,
    /// Digest of the URL alone.
    pub url_digest: String,
    /// Digest of `captureTime/url`: identifies this capture event.
    pub content_digest: String,
    /// Digest of the full image bytes: identifies the binary.
    #[serde(default)]
    pub bytes_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, with = "base64_bytes")]
    pub sample_bytes: Vec<u8>,
}

impl ImageOccurrence {
    pub fn new(
        url: &str,
        capture_time: CaptureTime,
        mime_reported: &str,
        mime_detected: &str,
        collection: &str,
        content: &[u8],
    ) -> Self {
        let sample_len = content.len().min(MAX_SAMPLE_BYTES);
        Self {
            url: url.to_string(),
            canonical_key: canonicalize(url),
            capture_time,
            mime_detected: mime_detected.to_string(),
            mime_reported: mime_reported.to_string(),
            collection: collection.to_string(),
            url_digest: sha256_hex(&[url.as_bytes()]),
            content_digest: capture_digest(&capture_time.to_archive_string(), url),
            bytes_digest: if content.is_empty() {
                String::new()
            } else {
                sha256_hex(&[content])
            },
            width: None,
            height: None,
            sample_bytes: content[..sample_len].to_vec(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Key for the cross-URL re-merge: the binary digest when the bytes were
    /// seen, the capture digest otherwise.
    pub fn digest_key(&self) -> &str {
        if self.bytes_digest.is_empty() {
            &self.content_digest
        } else {
            &self.bytes_digest
        }
    }
}

impl Captured for ImageOccurrence {
    fn capture_time(&self) -> CaptureTime {
        self.capture_time
    }
}

/// Page-level facts shared by every `<img>` found on one page capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCapture {
    pub url: String,
    pub host: String,
    pub protocol: String,
    pub title: String,
    pub capture_time: CaptureTime,
    pub images_on_page: u32,
}

/// One `<img>` reference inside a page capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImageOccurrence {
    pub img_url: String,
    pub img_canonical_key: String,
    pub img_title: String,
    pub img_alt: String,
    pub img_url_tokens: String,
    pub page_url: String,
    pub page_host: String,
    pub page_protocol: String,
    pub page_title: String,
    pub page_capture_time: CaptureTime,
    pub images_on_page: u32,
    pub page_url_tokens: String,
}

impl PageImageOccurrence {
    /// Build the occurrence for one `<img>`. Returns `None` when the tag has no
    /// usable source or either URL is too long for the index; title and alt
    /// are truncated to the index field ceiling.
    pub fn new(page: &PageCapture, src: &str, title: &str, alt: &str) -> Option<Self> {
        if src.trim().is_empty() || exceeds_index_field(src) || exceeds_index_field(&page.url) {
            return None;
        }
        Some(Self {
            img_url: src.to_string(),
            img_canonical_key: canonicalize(src),
            img_title: truncate_chars(title, MAX_INDEX_FIELD_CHARS),
            img_alt: truncate_chars(alt, MAX_INDEX_FIELD_CHARS),
            img_url_tokens: url_tokens(src),
            page_url: page.url.clone(),
            page_host: page.host.clone(),
            page_protocol: page.protocol.clone(),
            page_title: page.title.clone(),
            page_capture_time: page.capture_time,
            images_on_page: page.images_on_page,
            page_url_tokens: url_tokens(&page.url),
        })
    }
}

impl Captured for PageImageOccurrence {
    fn capture_time(&self) -> CaptureTime {
        self.page_capture_time
    }
}

// --- Merged image records ---

/// A page context together with the image capture it was matched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedPage {
    pub page: PageImageOccurrence,
    pub image_time: CaptureTime,
    pub image_digest: String,
}

impl PairedPage {
    fn precedence(&self) -> (CaptureTime, &str) {
        (self.image_time, &self.image_digest)
    }
}

/// One image occurrence plus at most one page context, the temporally closest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedImageRecord {
    pub image: ImageOccurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PairedPage>,
    pub collections: BTreeSet<String>,
    pub image_urls: BTreeSet<String>,
    pub canonical_keys: BTreeSet<String>,
    pub page_urls: BTreeSet<String>,
}

impl MergedImageRecord {
    pub fn new(image: ImageOccurrence, page: Option<PageImageOccurrence>) -> Self {
        let mut collections = BTreeSet::new();
        insert_non_empty(&mut collections, &image.collection);
        let mut image_urls = BTreeSet::new();
        insert_non_empty(&mut image_urls, &image.url);
        let mut canonical_keys = BTreeSet::new();
        insert_non_empty(&mut canonical_keys, &image.canonical_key);
        let mut page_urls = BTreeSet::new();
        if let Some(p) = &page {
            insert_non_empty(&mut page_urls, &p.page_url);
        }

        let page = page.map(|page| PairedPage {
            page,
            image_time: image.capture_time,
            image_digest: image.content_digest.clone(),
        });

        Self {
            image,
            page,
            collections,
            image_urls,
            canonical_keys,
            page_urls,
        }
    }

    pub fn representative_time(&self) -> CaptureTime {
        self.image.capture_time
    }

    pub fn page_context(&self) -> Option<&PageImageOccurrence> {
        self.page.as_ref().map(|p| &p.page)
    }

    pub fn digest_key(&self) -> &str {
        self.image.digest_key()
    }

    /// Fold `other` into `self`. Sets are unioned; the page context kept is
    /// the one paired with the earliest image capture.
    pub(crate) fn absorb(&mut self, other: MergedImageRecord) {
        self.collections.extend(other.collections);
        self.image_urls.extend(other.image_urls);
        self.canonical_keys.extend(other.canonical_keys);
        self.page_urls.extend(other.page_urls);

        self.page = match (self.page.take(), other.page) {
            (Some(mine), Some(theirs)) => {
                if theirs.precedence() < mine.precedence() {
                    Some(theirs)
                } else {
                    Some(mine)
                }
            }
            (mine, theirs) => mine.or(theirs),
        };
    }
}

pub(crate) fn insert_non_empty(set: &mut BTreeSet<String>, value: &str) -> bool {
    if value.is_empty() || set.contains(value) {
        return false;
    }
    set.insert(value.to_string())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
