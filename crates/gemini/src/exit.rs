use std::fmt;

use gemini_frame::FrameError;
use gemini_k197::K197Error;
use gemini_transport::TransportError;

// Exit codes shared by every subcommand.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err {
        TransportError::Timeout(_) => TIMEOUT,
        TransportError::InvalidConfig(_) => USAGE,
        TransportError::InterruptUnavailable | TransportError::Gpio(_) => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::EmptyFrame => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn k197_error(context: &str, err: K197Error) -> CliError {
    match err {
        K197Error::Transport(err) => transport_error(context, err),
        K197Error::Frame(err) => frame_error(context, err),
        K197Error::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        K197Error::InvalidRecord(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        K197Error::NoControlRecord => CliError::new(USAGE, format!("{context}: {err}")),
    }
}
