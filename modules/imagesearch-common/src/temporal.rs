// Nearest-capture association between an image and its candidate pages.

use thiserror::Error;

use crate::timestamp::CaptureTime;

/// Anything observed at a single capture instant.
pub trait Captured {
    fn capture_time(&self) -> CaptureTime;
}

/// `closest` was handed nothing to choose from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No candidate captures to match against {target}")]
pub struct NoCandidateError {
    pub target: CaptureTime,
}

/// Pick the candidate captured nearest to `target`. Ties go to the earliest
/// entry in `candidates`.
pub fn closest<T: Captured>(candidates: &[T], target: CaptureTime) -> Result<&T, NoCandidateError> {
    let mut best: Option<(&T, i64)> = None;
    for candidate in candidates {
        let distance = candidate.capture_time().distance(&target);
        match best {
            Some((_, d)) if d <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best.map(|(c, _)| c).ok_or(NoCandidateError { target })
}
