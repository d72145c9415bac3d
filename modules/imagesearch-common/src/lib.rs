pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod merge;
pub mod surt;
pub mod temporal;
pub mod text;
pub mod timestamp;
pub mod types;
pub mod wire;

pub use config::{ExecutionMode, JobConfig, OutputMode, DEFAULT_MAX_ATTEMPTS};
pub use document::*;
pub use error::{IndexError, Result};
pub use merge::{fold_all, merge, merge_document, merge_image_and_page, merge_pair, Mergeable};
pub use surt::canonicalize;
pub use temporal::{closest, Captured, NoCandidateError};
pub use timestamp::CaptureTime;
pub use types::*;
pub use wire::{Frame, Record};
