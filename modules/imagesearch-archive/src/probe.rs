//! Image type sniffing and pixel dimensions from file headers.

/// Reads pixel dimensions out of image bytes.
pub trait DimensionProbe: Send + Sync {
    /// Whether a reader exists for `mime`.
    fn supports(&self, mime: &str) -> bool;

    /// `(width, height)`, or `None` when the bytes can't be read as `mime`.
    fn dimensions(&self, mime: &str, bytes: &[u8]) -> Option<(u32, u32)>;
}

/// Parses PNG, GIF, BMP and JPEG headers. Only the sample prefix is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderProbe;

impl DimensionProbe for HeaderProbe {
    fn supports(&self, mime: &str) -> bool {
        matches!(
            base_type(mime).as_str(),
            "image/png" | "image/gif" | "image/bmp" | "image/x-ms-bmp" | "image/jpeg" | "image/jpg" | "image/pjpeg"
        )
    }

    fn dimensions(&self, mime: &str, bytes: &[u8]) -> Option<(u32, u32)> {
        match base_type(mime).as_str() {
            "image/png" => png(bytes),
            "image/gif" => gif(bytes),
            "image/bmp" | "image/x-ms-bmp" => bmp(bytes),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => jpeg(bytes),
            _ => None,
        }
    }
}

/// Mime type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let head = &bytes[..bytes.len().min(64)];
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if head.starts_with(b"BM") && head.len() >= 26 {
        Some("image/bmp")
    } else if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        Some("image/webp")
    } else if head.starts_with(b"II*\0") || head.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if head.starts_with(&[0, 0, 1, 0]) {
        Some("image/x-icon")
    } else {
        let lower = String::from_utf8_lossy(head).trim_start().to_ascii_lowercase();
        if lower.starts_with("<svg") {
            Some("image/svg+xml")
        } else if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
            Some("text/html")
        } else {
            None
        }
    }
}

fn base_type(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn be_u16(b: &[u8], at: usize) -> Option<u32> {
    Some(u16::from_be_bytes([*b.get(at)?, *b.get(at + 1)?]) as u32)
}

fn le_u16(b: &[u8], at: usize) -> Option<u32> {
    Some(u16::from_le_bytes([*b.get(at)?, *b.get(at + 1)?]) as u32)
}

fn be_u32(b: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(b.get(at..at + 4)?.try_into().ok()?))
}

fn le_i32(b: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_le_bytes(b.get(at..at + 4)?.try_into().ok()?))
}

fn png(b: &[u8]) -> Option<(u32, u32)> {
    if b.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be_u32(b, 16)?, be_u32(b, 20)?))
}

fn gif(b: &[u8]) -> Option<(u32, u32)> {
    if !b.starts_with(b"GIF") {
        return None;
    }
    Some((le_u16(b, 6)?, le_u16(b, 8)?))
}

fn bmp(b: &[u8]) -> Option<(u32, u32)> {
    if !b.starts_with(b"BM") {
        return None;
    }
    // Negative height marks a top-down bitmap.
    Some((le_i32(b, 18)?.unsigned_abs(), le_i32(b, 22)?.unsigned_abs()))
}

fn jpeg(b: &[u8]) -> Option<(u32, u32)> {
    if !b.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 3 < b.len() {
        if b[i] != 0xFF {
            return None;
        }
        let marker = b[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let len = be_u16(b, i + 2)? as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = be_u16(b, i + 5)?;
            let width = be_u16(b, i + 7)?;
            return Some((width, height));
        }
        i += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut b = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        b.extend_from_slice(&w.to_be_bytes());
        b.extend_from_slice(&h.to_be_bytes());
        b.extend_from_slice(&[8, 6, 0, 0, 0]);
        b
    }

    fn jpeg_bytes(w: u16, h: u16) -> Vec<u8> {
        let mut b = vec![0xFF, 0xD8];
        // APP0 segment of length 16
        b.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        b.extend_from_slice(&[0u8; 14]);
        // SOF0: length, precision, height, width
        b.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        b.extend_from_slice(&h.to_be_bytes());
        b.extend_from_slice(&w.to_be_bytes());
        b.extend_from_slice(&[0u8; 10]);
        b
    }

    #[test]
    fn png_dimensions() {
        let b = png_bytes(640, 480);
        assert_eq!(sniff_mime(&b), Some("image/png"));
        assert_eq!(HeaderProbe.dimensions("image/png", &b), Some((640, 480)));
    }

    #[test]
    fn gif_dimensions() {
        let mut b = b"GIF89a".to_vec();
        b.extend_from_slice(&[0x20, 0x01, 0x10, 0x00]);
        assert_eq!(sniff_mime(&b), Some("image/gif"));
        assert_eq!(HeaderProbe.dimensions("image/gif", &b), Some((288, 16)));
    }

    #[test]
    fn bmp_top_down_height() {
        let mut b = vec![0u8; 26];
        b[..2].copy_from_slice(b"BM");
        b[18..22].copy_from_slice(&100i32.to_le_bytes());
        b[22..26].copy_from_slice(&(-50i32).to_le_bytes());
        assert_eq!(sniff_mime(&b), Some("image/bmp"));
        assert_eq!(HeaderProbe.dimensions("image/x-ms-bmp", &b), Some((100, 50)));
    }

    #[test]
    fn jpeg_skips_to_frame_header() {
        let b = jpeg_bytes(1024, 768);
        assert_eq!(sniff_mime(&b), Some("image/jpeg"));
        assert_eq!(HeaderProbe.dimensions("image/jpeg; charset=binary", &b), Some((1024, 768)));
    }

    #[test]
    fn wrong_or_truncated_bytes_give_none() {
        assert_eq!(HeaderProbe.dimensions("image/png", b"\x89PNG"), None);
        assert_eq!(HeaderProbe.dimensions("image/jpeg", &png_bytes(1, 1)), None);
        assert_eq!(HeaderProbe.dimensions("image/webp", b"RIFF0000WEBP"), None);
        assert!(!HeaderProbe.supports("image/webp"));
    }

    #[test]
    fn sniffs_markup() {
        assert_eq!(sniff_mime(b"  <!DOCTYPE html><html>"), Some("text/html"));
        assert_eq!(sniff_mime(b"<svg xmlns="), Some("image/svg+xml"));
        assert_eq!(sniff_mime(b"plain"), None);
    }
}
