//! Inter-stage record codec.
//!
//! A frame is `[u32 BE key len][key][u32 BE blob len][blob]`. The blob is a
//! version byte followed by the JSON of a tagged `Record`. Blobs that start
//! with `{` predate the version byte and are classified by probing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::document::{DocumentAggregate, LinkEdge};
use crate::error::{IndexError, Result};
use crate::types::{ImageOccurrence, MergedImageRecord, PageImageOccurrence};

pub const WIRE_VERSION: u8 = 1;

/// Largest key or blob accepted from a frame header.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Every partial record that travels between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Image(ImageOccurrence),
    Page(PageImageOccurrence),
    Document(DocumentAggregate),
    /// An inlink observation routed to its target's key.
    Inlink(LinkEdge),
    Merged(MergedImageRecord),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Image(_) => "image",
            Record::Page(_) => "page",
            Record::Document(_) => "document",
            Record::Inlink(_) => "inlink",
            Record::Merged(_) => "merged",
        }
    }
}

/// A keyed record as read back from an intermediate file.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub key: String,
    pub record: Record,
}

pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut blob = Vec::with_capacity(256);
    blob.push(WIRE_VERSION);
    serde_json::to_writer(&mut blob, record)?;
    Ok(blob)
}

pub fn decode_record(blob: &[u8]) -> Result<Record> {
    match blob.first() {
        None => Err(IndexError::Frame("empty record blob".into())),
        Some(b'{') => decode_legacy(blob),
        Some(&WIRE_VERSION) => Ok(serde_json::from_slice(&blob[1..])?),
        Some(v) => Err(IndexError::Frame(format!("unsupported wire version {v}"))),
    }
}

/// Untagged occurrences: a `"type": "page"` object that parses as a page is a
/// page; everything else is read as an image.
fn decode_legacy(blob: &[u8]) -> Result<Record> {
    let value: serde_json::Value = serde_json::from_slice(blob)?;
    if value.get("type").and_then(|t| t.as_str()) == Some("page") {
        if let Ok(page) = serde_json::from_value::<PageImageOccurrence>(value.clone()) {
            return Ok(Record::Page(page));
        }
    }
    Ok(Record::Image(serde_json::from_value(value)?))
}

pub fn encode_frame(key: &str, record: &Record, out: &mut BytesMut) -> Result<()> {
    let blob = encode_record(record)?;
    out.reserve(8 + key.len() + blob.len());
    out.put_u32(key.len() as u32);
    out.put_slice(key.as_bytes());
    out.put_u32(blob.len() as u32);
    out.put_slice(&blob);
    Ok(())
}

/// Read the next frame. Returns `None` once `buf` is exhausted.
pub fn decode_frame(buf: &mut Bytes) -> Result<Option<Frame>> {
    if !buf.has_remaining() {
        return Ok(None);
    }
    let key = take_chunk(buf, "key")?;
    let key = String::from_utf8(key.to_vec())
        .map_err(|e| IndexError::Frame(format!("key is not UTF-8: {e}")))?;
    let blob = take_chunk(buf, "blob")?;
    let record = decode_record(&blob)?;
    Ok(Some(Frame { key, record }))
}

/// Decode every frame in `data`.
pub fn decode_all(data: Bytes) -> Result<Vec<Frame>> {
    let mut buf = data;
    let mut frames = Vec::new();
    while let Some(frame) = decode_frame(&mut buf)? {
        frames.push(frame);
    }
    Ok(frames)
}

fn take_chunk(buf: &mut Bytes, what: &str) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(IndexError::Frame(format!("truncated {what} length")));
    }
    let len = buf.get_u32() as usize;
    if len > MAX_FRAME_LEN {
        return Err(IndexError::Frame(format!("{what} length {len} exceeds limit")));
    }
    if buf.remaining() < len {
        return Err(IndexError::Frame(format!(
            "truncated {what}: expected {len} bytes, {} left",
            buf.remaining()
        )));
    }
    Ok(buf.split_to(len))
}
