pub mod capture;
pub mod error;
pub mod extract;
pub mod html;
pub mod probe;
pub mod warc;

pub use capture::{is_archive_path, ArchiveFormat, Capture, CaptureReader};
pub use error::{ArchiveError, Result};
pub use extract::{ExtractStats, Extractor};
pub use html::{HtmlParser, ParsedPage, RegexHtmlParser};
pub use probe::{sniff_mime, DimensionProbe, HeaderProbe};
pub use warc::ArchiveFileReader;
