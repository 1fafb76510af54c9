//! Clockless two-wire bit transport.
//!
//! Two peers are joined by two unidirectional lines, each driven by exactly
//! one side. Every bit is an exchange: the writer raises its line, the reader
//! samples it after a fixed delay and answers with a rising edge of its own.
//! No shared clock is needed.
//!
//! This is the lowest layer of the Gemini stack. [`ProtocolEngine`] owns the
//! bit queues and the handshake state machine; everything above it works in
//! terms of queued bits.

pub mod config;
pub mod edge;
pub mod engine;
pub mod error;
pub mod hal;
pub mod queue;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::{ProtocolConfig, DEFAULT_FRAME_TIMEOUT};
pub use edge::{EdgeFlag, EdgeSignal};
pub use engine::{ProtocolEngine, ProtocolState};
pub use error::{Result, TransportError};
pub use hal::{EdgeDetection, EdgeInterrupt, LinkTimer};
pub use queue::{BitQueue, DEFAULT_QUEUE_CAPACITY};
