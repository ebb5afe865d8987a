use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MotionError {
    /// The axis sits at or beyond a hard limit and the request points
    /// further outward. Recoverable; no state was changed.
    #[error("axis {index} at {position} is on a hard limit and the request points further out")]
    LimitViolation { index: usize, position: f64 },

    /// The aggregate was addressed with an unconfigured axis index.
    #[error("axis {index} is not configured ({count} axes present)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Travel limits must satisfy `low < high`.
    #[error("invalid travel limits: low {low} is not below high {high}")]
    InvalidLimits { low: f64, high: f64 },
}

pub type Result<T> = std::result::Result<T, MotionError>;
