//! Merge engine.
//!
//! Every fold here is commutative and associative (below the edge caps), so
//! partial results may be combined in any grouping and order. Duplicate
//! delivery of a structurally identical record is absorbed by the `a == b`
//! guard.

use tracing::debug;

use crate::document::DocumentAggregate;
use crate::temporal::closest;
use crate::timestamp::CaptureTime;
use crate::types::{ImageOccurrence, MergedImageRecord, PageImageOccurrence};

/// A record that can be folded with others of its kind.
pub trait Mergeable: PartialEq + Sized {
    /// The smaller side hosts the merge and keeps its scalar fields.
    fn precedence(&self) -> (CaptureTime, &str, &str);

    /// Fold `other` into `self`.
    fn absorb(&mut self, other: Self);
}

impl Mergeable for DocumentAggregate {
    fn precedence(&self) -> (CaptureTime, &str, &str) {
        (self.representative_time, &self.content_digest, &self.container_digest)
    }

    fn absorb(&mut self, other: Self) {
        DocumentAggregate::absorb(self, other)
    }
}

impl Mergeable for MergedImageRecord {
    fn precedence(&self) -> (CaptureTime, &str, &str) {
        (self.image.capture_time, &self.image.content_digest, &self.image.bytes_digest)
    }

    fn absorb(&mut self, other: Self) {
        MergedImageRecord::absorb(self, other)
    }
}

/// Merge two optional records. Absent is the identity element.
pub fn merge<T: Mergeable>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) => Some(merge_pair(a, b)),
    }
}

/// Merge two records: the earlier one hosts, the later one is folded in.
pub fn merge_pair<T: Mergeable>(a: T, b: T) -> T {
    if a == b {
        return a;
    }
    let (mut host, other) = if a.precedence() <= b.precedence() {
        (a, b)
    } else {
        (b, a)
    };
    host.absorb(other);
    host
}

pub fn merge_document(a: Option<DocumentAggregate>, b: Option<DocumentAggregate>) -> Option<DocumentAggregate> {
    merge(a, b)
}

/// Left-fold a group through `merge_pair`.
pub fn fold_all<T: Mergeable>(items: impl IntoIterator<Item = T>) -> Option<T> {
    items.into_iter().fold(None, |acc, item| merge(acc, Some(item)))
}

/// Pair an image with the page capture closest in time to it. Pages not
/// chosen are discarded.
pub fn merge_image_and_page(image: ImageOccurrence, pages: &[PageImageOccurrence]) -> MergedImageRecord {
    match closest(pages, image.capture_time) {
        Ok(page) => MergedImageRecord::new(image, Some(page.clone())),
        Err(e) => {
            debug!(url = %image.url, error = %e, "Image has no page context");
            MergedImageRecord::new(image, None)
        }
    }
}
