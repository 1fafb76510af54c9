use gemini_transport::TransportError;

/// Errors that can occur in the frame layer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The bit engine below failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame must carry at least one byte.
    #[error("empty frame")]
    EmptyFrame,

    /// The output queue cannot take the whole frame; nothing was queued.
    #[error("output queue cannot take frame ({needed} bits needed, {free} free)")]
    OutputFull { needed: usize, free: usize },

    /// Frame timing that cannot delimit frames.
    #[error("invalid frame config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
