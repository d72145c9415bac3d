//! Turns one archived capture into keyed partial records for the partition stage.
//!
//! Image captures yield an `ImageOccurrence` keyed by the image's canonical
//! key. HTML captures yield one `PageImageOccurrence` per `<img>` (keyed by the
//! image), a `DocumentAggregate` for the page itself, and one inlink
//! observation per outlink (keyed by the link target).

use tracing::{debug, info, warn};

use imagesearch_common::digest::{capture_digest, sha256_hex};
use imagesearch_common::document::{ArchiveLocation, DocumentAggregate};
use imagesearch_common::surt::{canonicalize, has_identity};
use imagesearch_common::text::host_and_protocol;
use imagesearch_common::{CaptureTime, ImageOccurrence, PageCapture, PageImageOccurrence, Record};

use crate::capture::Capture;
use crate::html::{HtmlParser, RegexHtmlParser};
use crate::probe::{sniff_mime, DimensionProbe, HeaderProbe};

/// What extraction saw and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub captures: u64,
    pub images: u64,
    pub images_with_dimensions: u64,
    pub pages: u64,
    pub page_images: u64,
    pub documents: u64,
    pub inlinks: u64,
    pub skipped_empty_src: u64,
    pub skipped_oversize: u64,
    pub invalid_timestamps: u64,
    pub unparseable_urls: u64,
}

impl ExtractStats {
    pub fn add(&mut self, other: &ExtractStats) {
        self.captures += other.captures;
        self.images += other.images;
        self.images_with_dimensions += other.images_with_dimensions;
        self.pages += other.pages;
        self.page_images += other.page_images;
        self.documents += other.documents;
        self.inlinks += other.inlinks;
        self.skipped_empty_src += other.skipped_empty_src;
        self.skipped_oversize += other.skipped_oversize;
        self.invalid_timestamps += other.invalid_timestamps;
        self.unparseable_urls += other.unparseable_urls;
    }

    pub fn log(&self) {
        info!(
            captures = self.captures,
            images = self.images,
            images_with_dimensions = self.images_with_dimensions,
            pages = self.pages,
            page_images = self.page_images,
            documents = self.documents,
            inlinks = self.inlinks,
            skipped_empty_src = self.skipped_empty_src,
            skipped_oversize = self.skipped_oversize,
            invalid_timestamps = self.invalid_timestamps,
            unparseable_urls = self.unparseable_urls,
            "Extraction finished"
        );
    }
}

pub struct Extractor {
    collection: String,
    parser: Box<dyn HtmlParser>,
    probe: Box<dyn DimensionProbe>,
}

impl Extractor {
    /// Extractor with the regex HTML parser and the header dimension probe.
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_collaborators(collection, Box::new(RegexHtmlParser), Box::new(HeaderProbe))
    }

    pub fn with_collaborators(
        collection: impl Into<String>,
        parser: Box<dyn HtmlParser>,
        probe: Box<dyn DimensionProbe>,
    ) -> Self {
        Self {
            collection: collection.into(),
            parser,
            probe,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Keyed records for one capture. Captures that are neither images nor
    /// HTML produce nothing.
    pub fn extract(&self, capture: &Capture, stats: &mut ExtractStats) -> Vec<(String, Record)> {
        stats.captures += 1;
        let mut out = Vec::new();
        if !capture.is_image() && !capture.is_html() {
            return out;
        }

        let time = match CaptureTime::parse(&capture.timestamp) {
            Ok(time) => time,
            Err(e) => {
                warn!(url = %capture.url, timestamp = %capture.timestamp, error = %e, "Skipping capture without usable timestamp");
                stats.invalid_timestamps += 1;
                return out;
            }
        };

        if capture.is_image() {
            out.extend(self.image(capture, time, stats));
        }
        if capture.is_html() {
            out.extend(self.page(capture, time, stats));
        }
        out
    }

    fn image(&self, capture: &Capture, time: CaptureTime, stats: &mut ExtractStats) -> Option<(String, Record)> {
        let key = canonicalize(&capture.url);
        if !has_identity(&key) {
            debug!(url = %capture.url, "Image URL has no canonical key");
            stats.unparseable_urls += 1;
            return None;
        }

        let reported = capture.mime_reported.as_str();
        let mut detected = sniff_mime(&capture.content).unwrap_or(reported).to_string();
        if !self.probe.supports(&detected) && self.probe.supports(reported) {
            detected = reported.to_string();
        }

        let mut image = ImageOccurrence::new(&capture.url, time, reported, &detected, &self.collection, &capture.content);
        match self.probe.dimensions(&detected, &capture.content) {
            Some((width, height)) => {
                image = image.with_dimensions(width, height);
                stats.images_with_dimensions += 1;
            }
            None => debug!(url = %capture.url, mime = %detected, "No dimensions for image"),
        }

        stats.images += 1;
        Some((key, Record::Image(image)))
    }

    fn page(&self, capture: &Capture, time: CaptureTime, stats: &mut ExtractStats) -> Vec<(String, Record)> {
        let Some((host, protocol)) = host_and_protocol(&capture.url) else {
            warn!(url = %capture.url, "Skipping page with unparseable URL");
            stats.unparseable_urls += 1;
            return Vec::new();
        };

        let html = String::from_utf8_lossy(&capture.content);
        let parsed = self.parser.parse(&html, &capture.url);
        stats.pages += 1;

        let page = PageCapture {
            url: capture.url.clone(),
            host,
            protocol,
            title: parsed.title.clone(),
            capture_time: time,
            images_on_page: parsed.images.len() as u32,
        };

        let mut out = Vec::new();
        for img in &parsed.images {
            if img.src.trim().is_empty() {
                stats.skipped_empty_src += 1;
                continue;
            }
            let Some(occurrence) = PageImageOccurrence::new(&page, &img.src, &img.title, &img.alt) else {
                debug!(page = %capture.url, "Image or page URL too long for the index");
                stats.skipped_oversize += 1;
                continue;
            };
            if !has_identity(&occurrence.img_canonical_key) {
                continue;
            }
            stats.page_images += 1;
            out.push((occurrence.img_canonical_key.clone(), Record::Page(occurrence)));
        }

        if let Some(document) = self.document(capture, time, &parsed) {
            let Some(key) = document.primary_key().map(str::to_string) else {
                return out;
            };
            for edge in document.outlinks.to_edges() {
                stats.inlinks += 1;
                out.push((edge.target_key.clone(), Record::Inlink(edge)));
            }
            stats.documents += 1;
            out.push((key, Record::Document(document)));
        }
        out
    }

    fn document(
        &self,
        capture: &Capture,
        time: CaptureTime,
        parsed: &crate::html::ParsedPage,
    ) -> Option<DocumentAggregate> {
        let mut document = DocumentAggregate::new(time, &sha256_hex(&[capture.content.as_slice()]));
        document.add_url(&capture.url);
        document.primary_key()?;

        document.add_collection(&self.collection);
        document.add_title(&parsed.title);
        document.add_content(&parsed.text);
        document.mime_reported = capture.mime_reported.clone();
        document.mime_detected = sniff_mime(&capture.content)
            .unwrap_or(capture.mime_reported.as_str())
            .to_string();
        document.container_digest = capture_digest(&time.to_archive_string(), &capture.url);
        document.archive = Some(ArchiveLocation {
            name: capture.archive_name.clone(),
            offset: capture.offset,
        });
        for anchor in &parsed.anchors {
            document.add_outlink(&anchor.href, &anchor.text);
        }
        Some(document)
    }
}
