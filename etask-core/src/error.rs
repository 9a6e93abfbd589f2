use thiserror::Error;

/// Failure to read one of the model's textual or numeric codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    #[error("unknown priority: {0}")]
    UnknownPriority(String),

    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("unknown week start: {0} (expected sunday or monday)")]
    UnknownWeekStart(String),

    #[error("unknown calendar view: {0} (expected day, week or month)")]
    UnknownView(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("invalid local date/time '{input}': {reason}")]
    InvalidDateTime { input: String, reason: String },

    #[error("{kind} code out of range: {code}")]
    CodeOutOfRange { kind: &'static str, code: u8 },
}
