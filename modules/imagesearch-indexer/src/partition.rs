//! Partition reduce stage: everything routed to one canonical key → merged records,
//! keyed by digest group for the re-merge stage.
//!
//! Image side: the earliest image occurrence is paired with the temporally
//! closest page reference. Keys with only images or only pages are dropped.
//! Document side: all documents of the key are folded together and every
//! inlink routed to the key is applied to the result.

use tracing::debug;

use imagesearch_common::merge::{fold_all, merge_image_and_page};
use imagesearch_common::{DocumentAggregate, ImageOccurrence, LinkEdge, PageImageOccurrence, Record};

use crate::digest::{document_group, image_group};
use crate::stats::PartitionStats;

/// Records grouped under one key, split by kind.
#[derive(Debug, Default)]
struct KeyGroup {
    images: Vec<ImageOccurrence>,
    pages: Vec<PageImageOccurrence>,
    documents: Vec<DocumentAggregate>,
    inlinks: Vec<LinkEdge>,
}

impl KeyGroup {
    fn split(records: Vec<Record>, stats: &mut PartitionStats) -> Self {
        let mut group = KeyGroup::default();
        for record in records {
            match record {
                Record::Image(i) => group.images.push(i),
                Record::Page(p) => group.pages.push(p),
                Record::Document(d) => group.documents.push(d),
                Record::Inlink(e) => group.inlinks.push(e),
                Record::Merged(_) => stats.unexpected_records += 1,
            }
        }
        group
    }
}

/// Reduce one key's records. Output records are keyed for the digest stage.
pub fn reduce_key(key: &str, records: Vec<Record>, stats: &mut PartitionStats) -> Vec<(String, Record)> {
    stats.keys += 1;
    let group = KeyGroup::split(records, stats);
    let mut out = Vec::new();

    let image_count = group.images.len();
    match (earliest_image(group.images), group.pages.is_empty()) {
        (Some(image), false) => {
            stats.paired_keys += 1;
            let merged = merge_image_and_page(image, &group.pages);
            stats.merged_records += 1;
            out.push((image_group(merged.digest_key()), Record::Merged(merged)));
        }
        (Some(_), true) => {
            debug!(key, images = image_count, "Key has images but no page references");
            stats.image_only_keys += 1;
        }
        (None, false) => {
            debug!(key, pages = group.pages.len(), "Key has page references but no image");
            stats.page_only_keys += 1;
        }
        (None, true) => {}
    }

    match fold_all(group.documents) {
        Some(mut document) => {
            for edge in group.inlinks {
                if document.add_inlink_edge(edge) {
                    stats.inlinks_applied += 1;
                } else {
                    stats.capped_inlinks += 1;
                }
            }
            stats.documents += 1;
            out.push((document_group(&document.content_digest), Record::Document(document)));
        }
        None => stats.orphan_inlinks += group.inlinks.len() as u64,
    }

    out
}

/// The image standing for the key: earliest capture, ties to the smaller digest.
fn earliest_image(images: Vec<ImageOccurrence>) -> Option<ImageOccurrence> {
    images.into_iter().reduce(|best, candidate| {
        if (candidate.capture_time, &candidate.content_digest) < (best.capture_time, &best.content_digest) {
            candidate
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagesearch_common::{CaptureTime, PageCapture};

    fn t(raw: &str) -> CaptureTime {
        CaptureTime::parse(raw).unwrap()
    }

    fn image(ts: &str) -> Record {
        Record::Image(ImageOccurrence::new("http://a.com/x.png", t(ts), "image/png", "image/png", "AWP", b"PNG"))
    }

    fn page(page_url: &str, ts: &str) -> Record {
        let capture = PageCapture {
            url: page_url.to_string(),
            host: "a.com".to_string(),
            protocol: "http".to_string(),
            title: String::new(),
            capture_time: t(ts),
            images_on_page: 1,
        };
        Record::Page(PageImageOccurrence::new(&capture, "http://a.com/x.png", "", "").unwrap())
    }

    fn document(ts: &str) -> Record {
        let mut d = DocumentAggregate::new(t(ts), &format!("doc-{ts}"));
        d.add_url("http://a.com/x.png");
        Record::Document(d)
    }

    fn inlink(source: &str) -> Record {
        Record::Inlink(LinkEdge::observed(source, "http://a.com/x.png", "x", t("20200101000000")).unwrap())
    }

    #[test]
    fn paired_key_emits_one_merged_record() {
        let mut stats = PartitionStats::default();
        let records = vec![
            page("http://a.com/jun", "20200601000000"),
            image("20200601000000"),
            image("20200101000000"),
            page("http://a.com/jan", "20200101000000"),
        ];
        let out = reduce_key("com,a)/x.png", records, &mut stats);

        assert_eq!(out.len(), 1);
        let Record::Merged(merged) = &out[0].1 else {
            panic!("expected merged record");
        };
        assert_eq!(merged.representative_time(), t("20200101000000"));
        assert_eq!(merged.page_context().unwrap().page_url, "http://a.com/jan");
        assert_eq!(out[0].0, image_group(merged.digest_key()));
        assert_eq!(stats.paired_keys, 1);
    }

    #[test]
    fn unpaired_keys_emit_nothing() {
        let mut stats = PartitionStats::default();
        assert!(reduce_key("k", vec![image("20200101000000")], &mut stats).is_empty());
        assert!(reduce_key("k", vec![page("http://a.com/", "20200101000000")], &mut stats).is_empty());
        assert_eq!(stats.image_only_keys, 1);
        assert_eq!(stats.page_only_keys, 1);
    }

    #[test]
    fn documents_fold_and_collect_inlinks() {
        let mut stats = PartitionStats::default();
        let records = vec![
            inlink("com,b)/"),
            document("20200601000000"),
            inlink("com,c)/"),
            document("20200101000000"),
            inlink("com,b)/"),
        ];
        let out = reduce_key("com,a)/x.png", records, &mut stats);

        assert_eq!(out.len(), 1);
        let Record::Document(doc) = &out[0].1 else {
            panic!("expected document");
        };
        assert_eq!(out[0].0, "document/doc-20200101000000");
        assert_eq!(doc.representative_time, t("20200101000000"));
        assert_eq!(doc.inlinks.len(), 2);
        assert_eq!(stats.inlinks_applied, 3);
    }

    #[test]
    fn inlinks_without_document_are_dropped() {
        let mut stats = PartitionStats::default();
        let out = reduce_key("com,a)/x.png", vec![inlink("com,b)/"), inlink("com,c)/")], &mut stats);
        assert!(out.is_empty());
        assert_eq!(stats.orphan_inlinks, 2);
    }

    #[test]
    fn image_key_can_also_carry_a_document() {
        let mut stats = PartitionStats::default();
        let records = vec![image("20200101000000"), page("http://a.com/", "20200101000000"), document("20200101000000")];
        let kinds: Vec<&str> = reduce_key("com,a)/x.png", records, &mut stats)
            .iter()
            .map(|(_, r)| r.kind())
            .collect();
        assert_eq!(kinds, vec!["merged", "document"]);
    }
}
