//! Archive-to-records tests: write a small WARC to disk → read → extract → assert.
//!
//! No network. Files live in a temp dir.

use std::path::PathBuf;

use imagesearch_archive::{ArchiveFileReader, CaptureReader, ExtractStats, Extractor};
use imagesearch_common::Record;

fn record(kind: &str, url: &str, date: &str, block: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "WARC/1.0\r\nWARC-Type: {kind}\r\nWARC-Target-URI: {url}\r\nWARC-Date: {date}\r\nContent-Length: {}\r\n\r\n",
        block.len()
    )
    .into_bytes();
    out.extend_from_slice(block);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

fn http(mime: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 200 OK\r\nContent-Type: {mime}\r\n\r\n").into_bytes();
    out.extend_from_slice(body);
    out
}

fn gif(w: u16, h: u16) -> Vec<u8> {
    let mut b = b"GIF89a".to_vec();
    b.extend_from_slice(&w.to_le_bytes());
    b.extend_from_slice(&h.to_le_bytes());
    b
}

fn write_warc(dir: &tempfile::TempDir, records: &[Vec<u8>]) -> PathBuf {
    let path = dir.path().join("AWP-test.warc");
    std::fs::write(&path, records.concat()).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Images and pages
// ---------------------------------------------------------------------------

#[test]
fn image_and_referencing_page_share_a_key() {
    let dir = tempfile::tempdir().unwrap();
    let page = br#"<html><head><title>Praia</title></head>
        <body><img src="fotos/praia.gif" title="Praia" alt="Areia"></body></html>"#;
    let path = write_warc(
        &dir,
        &[
            record("response", "http://www.praia.pt/index.html", "2020-01-01T00:00:00Z", &http("text/html", page)),
            record("response", "http://praia.pt/fotos/praia.gif", "2020-01-01T00:00:05Z", &http("image/gif", &gif(320, 200))),
        ],
    );

    let extractor = Extractor::new("AWP");
    let mut stats = ExtractStats::default();
    let mut keyed = Vec::new();
    ArchiveFileReader
        .read_captures(&path, &mut |c| keyed.extend(extractor.extract(&c, &mut stats)))
        .unwrap();

    let image_key = keyed
        .iter()
        .find_map(|(k, r)| matches!(r, Record::Image(_)).then_some(k.clone()))
        .unwrap();
    let page_key = keyed
        .iter()
        .find_map(|(k, r)| matches!(r, Record::Page(_)).then_some(k.clone()))
        .unwrap();

    assert_eq!(image_key, "pt,praia)/fotos/praia.gif");
    assert_eq!(image_key, page_key, "page reference and image must meet at one key");
    assert_eq!(stats.images, 1);
    assert_eq!(stats.images_with_dimensions, 1);
    assert_eq!(stats.pages, 1);
}

#[test]
fn page_document_carries_archive_location() {
    let dir = tempfile::tempdir().unwrap();
    let page = br#"<title>Links</title><a href="http://b.pt/">B</a><a href="/c">C</a>"#;
    let path = write_warc(
        &dir,
        &[record("response", "http://a.pt/", "2021-03-04T05:06:07Z", &http("text/html", page))],
    );

    let extractor = Extractor::new("AWP");
    let mut stats = ExtractStats::default();
    let mut keyed = Vec::new();
    ArchiveFileReader
        .read_captures(&path, &mut |c| keyed.extend(extractor.extract(&c, &mut stats)))
        .unwrap();

    let doc = keyed
        .iter()
        .find_map(|(_, r)| match r {
            Record::Document(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(doc.representative_time.to_archive_string(), "20210304050607");
    assert_eq!(doc.outlinks.len(), 2);
    let location = doc.archive.unwrap();
    assert_eq!(location.name, "AWP-test.warc");
    assert_eq!(location.offset, 0);

    let inlink_keys: Vec<&str> = keyed
        .iter()
        .filter(|(_, r)| matches!(r, Record::Inlink(_)))
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(inlink_keys, vec!["pt,a)/c", "pt,b)/"]);
    assert_eq!(stats.inlinks, 2);
}
