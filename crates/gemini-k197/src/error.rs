use std::time::Duration;

/// Errors that can occur in K197 control operations.
#[derive(Debug, thiserror::Error)]
pub enum K197Error {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gemini_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] gemini_frame::FrameError),

    /// `execute` or `send_control_immediately` without a control record.
    #[error("no control record set")]
    NoControlRecord,

    /// The meter did not signal within the bring-up timeout.
    #[error("no response from meter within {0:?}")]
    Timeout(Duration),

    /// Bytes that do not form a valid record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, K197Error>;
