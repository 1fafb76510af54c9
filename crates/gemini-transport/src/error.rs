use std::time::Duration;

/// Errors that can occur in bit transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The output queue cannot take another bit.
    #[error("output queue full")]
    OutputFull,

    /// A byte was only partially queued before the output queue filled up.
    #[error("output queue full after {sent_bits} of 8 bits")]
    PartialByte { sent_bits: u8 },

    /// The input queue holds no bit.
    #[error("input queue empty")]
    InputEmpty,

    /// A bring-up wait did not observe the expected line activity in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The input pin cannot raise a rising-edge interrupt.
    #[error("input pin does not support edge interrupts")]
    InterruptUnavailable,

    /// A GPIO operation failed.
    #[error("gpio error: {0:?}")]
    Gpio(embedded_hal::digital::ErrorKind),

    /// The protocol timing configuration is unusable.
    #[error("invalid protocol config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
