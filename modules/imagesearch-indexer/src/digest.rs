//! Digest re-merge stage: one representative per content digest.
//!
//! The same binary (or the same page body) can reach the index through
//! several canonical keys. Everything sharing a digest is folded through the
//! merge engine into a single record. Image and document digests are grouped
//! under separate keys, so a group never mixes the two kinds.

use serde::Serialize;
use tracing::warn;

use imagesearch_common::merge::fold_all;
use imagesearch_common::{DocumentAggregate, MergedImageRecord, Record};

use crate::stats::DigestStats;

/// A folded digest group, ready for projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Representative {
    Image(MergedImageRecord),
    Document(DocumentAggregate),
}

/// Stage-2 group key of an image record.
pub fn image_group(digest: &str) -> String {
    format!("image/{digest}")
}

/// Stage-2 group key of a document.
pub fn document_group(digest: &str) -> String {
    format!("document/{digest}")
}

/// Fold one digest group into its single representative.
pub fn reduce_digest(records: Vec<Record>, stats: &mut DigestStats) -> Option<Representative> {
    stats.groups += 1;
    let mut images = Vec::new();
    let mut documents = Vec::new();
    for record in records {
        match record {
            Record::Merged(m) => images.push(m),
            Record::Document(d) => documents.push(d),
            _ => stats.unexpected_records += 1,
        }
    }
    stats.image_records_in += images.len() as u64;
    stats.documents_in += documents.len() as u64;

    let representative = if images.is_empty() {
        fold_all(documents).map(Representative::Document)
    } else {
        if !documents.is_empty() {
            warn!(documents = documents.len(), "Digest group mixes images and documents, keeping the image");
            stats.unexpected_records += documents.len() as u64;
        }
        fold_all(images).map(Representative::Image)
    };
    if representative.is_some() {
        stats.emitted += 1;
    }
    representative
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagesearch_common::merge::merge_image_and_page;
    use imagesearch_common::{CaptureTime, ImageOccurrence};

    fn t(raw: &str) -> CaptureTime {
        CaptureTime::parse(raw).unwrap()
    }

    fn merged(url: &str, ts: &str) -> Record {
        let image = ImageOccurrence::new(url, t(ts), "image/png", "image/png", "AWP", b"same bytes");
        Record::Merged(merge_image_and_page(image, &[]))
    }

    #[test]
    fn same_bytes_under_two_urls_become_one_record() {
        let mut stats = DigestStats::default();
        let out = reduce_digest(
            vec![merged("http://b.com/copy.png", "20200301000000"), merged("http://a.com/x.png", "20200101000000")],
            &mut stats,
        );

        let Some(Representative::Image(record)) = &out else {
            panic!("expected image");
        };
        assert_eq!(record.image.url, "http://a.com/x.png");
        assert_eq!(record.image_urls.len(), 2);
        assert_eq!(record.canonical_keys.len(), 2);
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.image_records_in, 2);
    }

    #[test]
    fn documents_fold_to_earliest() {
        let mut stats = DigestStats::default();
        let mut a = DocumentAggregate::new(t("20200601000000"), "d");
        a.add_url("http://a.com/");
        let mut b = DocumentAggregate::new(t("20200101000000"), "d");
        b.add_url("http://www.a.com/");
        let out = reduce_digest(vec![Record::Document(a), Record::Document(b)], &mut stats);

        let Some(Representative::Document(doc)) = &out else {
            panic!("expected one document");
        };
        assert_eq!(doc.representative_time, t("20200101000000"));
        assert_eq!(doc.urls.len(), 2);
    }

    #[test]
    fn stray_occurrences_are_counted_not_emitted() {
        let mut stats = DigestStats::default();
        let image = ImageOccurrence::new("http://a.com/x.png", t("20200101000000"), "image/png", "", "AWP", b"");
        assert!(reduce_digest(vec![Record::Image(image)], &mut stats).is_none());
        assert_eq!(stats.unexpected_records, 1);
    }

    #[test]
    fn mixed_group_still_emits_one_record() {
        let mut stats = DigestStats::default();
        let document = DocumentAggregate::new(t("20200101000000"), "d");
        let out = reduce_digest(
            vec![Record::Document(document), merged("http://a.com/x.png", "20200101000000")],
            &mut stats,
        );
        assert!(matches!(out, Some(Representative::Image(_))));
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.unexpected_records, 1);
    }

    #[test]
    fn group_keys_keep_kinds_apart() {
        assert_ne!(image_group("abc"), document_group("abc"));
        assert_eq!(document_group("abc"), "document/abc");
    }
}
