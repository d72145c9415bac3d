// Captures as read from web archive files, and the reader contract.

use std::path::Path;

use crate::error::Result;

/// One archived HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub url: String,
    /// Archive timestamp as found in the record, usually 14 digits.
    pub timestamp: String,
    /// Content type reported by the server or the archive header.
    pub mime_reported: String,
    /// Response body with HTTP headers removed.
    pub content: Vec<u8>,
    pub archive_name: String,
    /// Record position in the (decompressed) archive stream.
    pub offset: u64,
}

impl Capture {
    pub fn is_image(&self) -> bool {
        self.mime_reported.to_ascii_lowercase().contains("image")
    }

    pub fn is_html(&self) -> bool {
        self.mime_reported.to_ascii_lowercase().contains("html")
    }
}

/// Reads every capture out of one archive file.
pub trait CaptureReader: Send + Sync {
    /// Hand each capture to `sink` in file order. Returns how many were read.
    fn read_captures(&self, path: &Path, sink: &mut dyn FnMut(Capture)) -> Result<u64>;
}

/// Archive file kinds the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Warc,
    Arc,
}

impl ArchiveFormat {
    /// Format and compression of `path`, judged by its name.
    pub fn of_path(path: &Path) -> Option<(ArchiveFormat, bool)> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let (stem, gzipped) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name.as_str(), false),
        };
        if stem.ends_with(".warc") {
            Some((ArchiveFormat::Warc, gzipped))
        } else if stem.ends_with(".arc") {
            Some((ArchiveFormat::Arc, gzipped))
        } else {
            None
        }
    }
}

/// True for `.warc`, `.warc.gz`, `.arc` and `.arc.gz` files.
pub fn is_archive_path(path: &Path) -> bool {
    ArchiveFormat::of_path(path).is_some()
}
