//! WARC and ARC v1 readers.
//!
//! Both formats are a sequence of text header blocks each followed by a
//! length-delimited payload. `.gz` files are read through a multi-member
//! gzip decoder since archives compress every record as its own member.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::debug;

use crate::capture::{ArchiveFormat, Capture, CaptureReader};
use crate::error::{ArchiveError, Result};

/// Payloads are read in chunks of at most this size up front.
const MAX_PREALLOC: usize = 1024 * 1024;

/// Reads `.warc`, `.arc` and their gzipped variants from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveFileReader;

impl CaptureReader for ArchiveFileReader {
    fn read_captures(&self, path: &Path, sink: &mut dyn FnMut(Capture)) -> Result<u64> {
        let (format, gzipped) = ArchiveFormat::of_path(path)
            .ok_or_else(|| ArchiveError::UnsupportedFormat(path.display().to_string()))?;

        let file = File::open(path)?;
        let input: Box<dyn BufRead> = if gzipped {
            Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file))))
        } else {
            Box::new(BufReader::new(file))
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut stream = RecordStream::new(input, name);
        let read = match format {
            ArchiveFormat::Warc => read_warc(&mut stream, sink)?,
            ArchiveFormat::Arc => read_arc(&mut stream, sink)?,
        };
        debug!(archive = %path.display(), captures = read, "Archive read");
        Ok(read)
    }
}

/// Read WARC records from any buffered source.
pub fn read_warc<R: BufRead>(stream: &mut RecordStream<R>, sink: &mut dyn FnMut(Capture)) -> Result<u64> {
    let mut count = 0;
    loop {
        let start = stream.offset;
        let Some(version) = stream.next_nonblank_line()? else {
            break;
        };
        if !version.starts_with("WARC/") {
            return Err(stream.malformed(start, format!("expected WARC version line, got {version:?}")));
        }

        let headers = stream.read_headers(start)?;
        let length = header(&headers, "content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .ok_or_else(|| stream.malformed(start, "missing Content-Length".into()))?;
        let block = stream.read_block(start, length)?;

        let kind = header(&headers, "warc-type").unwrap_or_default().to_ascii_lowercase();
        let (mime, content) = match kind.as_str() {
            "response" => {
                let (mime, body) = split_http(&block);
                (mime.unwrap_or_default(), body.to_vec())
            }
            "resource" => (header(&headers, "content-type").unwrap_or_default().to_string(), block),
            _ => continue,
        };

        let url = header(&headers, "warc-target-uri")
            .unwrap_or_default()
            .trim_matches(|c| c == '<' || c == '>')
            .to_string();
        let timestamp = header(&headers, "warc-date").map(warc_date_digits).unwrap_or_default();

        sink(Capture {
            url,
            timestamp,
            mime_reported: mime,
            content,
            archive_name: stream.archive.clone(),
            offset: start,
        });
        count += 1;
    }
    Ok(count)
}

/// Read ARC records (`url ip date mime ... length` header lines).
pub fn read_arc<R: BufRead>(stream: &mut RecordStream<R>, sink: &mut dyn FnMut(Capture)) -> Result<u64> {
    let mut count = 0;
    loop {
        let start = stream.offset;
        let Some(line) = stream.next_nonblank_line()? else {
            break;
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(stream.malformed(start, format!("short ARC header {line:?}")));
        }
        let length = fields[fields.len() - 1]
            .parse::<usize>()
            .map_err(|_| stream.malformed(start, format!("bad ARC length in {line:?}")))?;
        let block = stream.read_block(start, length)?;

        let url = fields[0];
        if url.starts_with("filedesc://") {
            continue;
        }
        let (_, body) = split_http(&block);

        sink(Capture {
            url: url.to_string(),
            timestamp: fields[2].to_string(),
            mime_reported: fields[3].to_string(),
            content: body.to_vec(),
            archive_name: stream.archive.clone(),
            offset: start,
        });
        count += 1;
    }
    Ok(count)
}

/// A buffered archive stream that tracks the byte offset of what it consumed.
pub struct RecordStream<R> {
    inner: R,
    offset: u64,
    archive: String,
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(inner: R, archive: impl Into<String>) -> Self {
        Self {
            inner,
            offset: 0,
            archive: archive.into(),
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.inner.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        Ok(Some(String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string()))
    }

    fn next_nonblank_line(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.read_line()? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn read_headers(&mut self, start: u64) -> Result<Vec<(String, String)>> {
        let mut headers = Vec::new();
        loop {
            match self.read_line()? {
                None => return Err(self.malformed(start, "header block cut short".into())),
                Some(line) if line.is_empty() => return Ok(headers),
                Some(line) => {
                    if let Some((name, value)) = line.split_once(':') {
                        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
                    }
                }
            }
        }
    }

    fn read_block(&mut self, start: u64, len: usize) -> Result<Vec<u8>> {
        let mut block = Vec::with_capacity(len.min(MAX_PREALLOC));
        (&mut self.inner).take(len as u64).read_to_end(&mut block)?;
        self.offset += block.len() as u64;
        if block.len() < len {
            return Err(self.malformed(
                start,
                format!("payload truncated: expected {len} bytes, got {}", block.len()),
            ));
        }
        Ok(block)
    }

    fn malformed(&self, offset: u64, reason: String) -> ArchiveError {
        ArchiveError::MalformedRecord {
            archive: self.archive.clone(),
            offset,
            reason,
        }
    }
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// "2020-01-01T10:20:30Z" → "20200101102030".
fn warc_date_digits(date: &str) -> String {
    date.chars().filter(char::is_ascii_digit).take(14).collect()
}

/// Split an HTTP response into its Content-Type and body. Payloads that are
/// not HTTP responses come back whole, with no type.
fn split_http(block: &[u8]) -> (Option<String>, &[u8]) {
    if !block.starts_with(b"HTTP/") {
        return (None, block);
    }
    let crlf = find(block, b"\r\n\r\n").map(|i| i + 4);
    let lf = find(block, b"\n\n").map(|i| i + 2);
    let body_start = match (crlf, lf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b).unwrap_or(block.len()),
    };

    let head = String::from_utf8_lossy(&block[..body_start]);
    let mime = head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-type")
            .then(|| value.trim().to_string())
    });
    (mime, &block[body_start..])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn warc_record(kind: &str, url: &str, date: &str, extra: &str, block: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "WARC/1.0\r\nWARC-Type: {kind}\r\nWARC-Target-URI: {url}\r\nWARC-Date: {date}\r\n{extra}Content-Length: {}\r\n\r\n",
            block.len()
        )
        .into_bytes();
        out.extend_from_slice(block);
        out.extend_from_slice(b"\r\n\r\n");
        out
    }

    fn sample_warc() -> Vec<u8> {
        let html = b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\r\n<html><title>A</title></html>";
        let mut data = warc_record("warcinfo", "", "2020-01-01T00:00:00Z", "", b"software: test");
        data.extend(warc_record("request", "http://a.com/", "2020-01-01T00:00:00Z", "", b"GET / HTTP/1.1\r\n\r\n"));
        data.extend(warc_record("response", "http://a.com/", "2020-01-01T10:20:30Z", "", html));
        data.extend(warc_record(
            "resource",
            "<http://a.com/x.png>",
            "2020-06-01T00:00:00Z",
            "Content-Type: image/png\r\n",
            b"\x89PNG",
        ));
        data
    }

    fn collect_warc(data: Vec<u8>) -> Result<Vec<Capture>> {
        let mut stream = RecordStream::new(Cursor::new(data), "t.warc");
        let mut out = Vec::new();
        read_warc(&mut stream, &mut |c| out.push(c))?;
        Ok(out)
    }

    #[test]
    fn warc_responses_and_resources_are_read() {
        let captures = collect_warc(sample_warc()).unwrap();
        assert_eq!(captures.len(), 2);

        assert_eq!(captures[0].url, "http://a.com/");
        assert_eq!(captures[0].timestamp, "20200101102030");
        assert_eq!(captures[0].mime_reported, "text/html; charset=utf-8");
        assert_eq!(captures[0].content, b"<html><title>A</title></html>");

        assert_eq!(captures[1].url, "http://a.com/x.png");
        assert_eq!(captures[1].mime_reported, "image/png");
        assert_eq!(captures[1].content, b"\x89PNG");
        assert!(captures[1].offset > captures[0].offset);
    }

    #[test]
    fn missing_content_length_is_malformed() {
        let data = b"WARC/1.0\r\nWARC-Type: response\r\n\r\nbody".to_vec();
        let err = collect_warc(data).unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedRecord { offset: 0, .. }));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let data = b"WARC/1.0\r\nWARC-Type: resource\r\nContent-Length: 100\r\n\r\nshort".to_vec();
        assert!(matches!(collect_warc(data), Err(ArchiveError::MalformedRecord { .. })));
    }

    #[test]
    fn arc_records_skip_file_description() {
        let desc = "1 0 AWP\nURL IP-address Archive-date Content-type Archive-length\n";
        let body = "HTTP/1.0 200 OK\nContent-Type: image/gif\n\nGIF89a";
        let data = format!(
            "filedesc://t.arc 0.0.0.0 20200101000000 text/plain {}\n{desc}\nhttp://a.com/x.gif 10.0.0.1 20200102030405 image/gif {}\n{body}\n",
            desc.len(),
            body.len()
        );
        let mut stream = RecordStream::new(Cursor::new(data.into_bytes()), "t.arc");
        let mut out = Vec::new();
        let n = read_arc(&mut stream, &mut |c| out.push(c)).unwrap();

        assert_eq!(n, 1);
        assert_eq!(out[0].url, "http://a.com/x.gif");
        assert_eq!(out[0].timestamp, "20200102030405");
        assert_eq!(out[0].mime_reported, "image/gif");
        assert_eq!(out[0].content, b"GIF89a");
    }

    #[test]
    fn gzipped_multi_member_warc_from_disk() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.warc.gz");
        let data = sample_warc();
        let (first, second) = data.split_at(data.len() / 2);
        let mut file = File::create(&path).unwrap();
        for chunk in [first, second] {
            let mut member = GzEncoder::new(Vec::new(), Compression::default());
            member.write_all(chunk).unwrap();
            file.write_all(&member.finish().unwrap()).unwrap();
        }
        drop(file);

        let mut urls = Vec::new();
        let n = ArchiveFileReader.read_captures(&path, &mut |c| urls.push(c.url)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(urls, vec!["http://a.com/", "http://a.com/x.png"]);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = ArchiveFileReader
            .read_captures(Path::new("/nonexistent/file.cdx"), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFormat(_)));
    }
}
