//! Byte framing over the Gemini bit transport.
//!
//! Every payload byte travels as a start bit (1) followed by its 8 data bits,
//! most significant first. A 0 where a start bit is expected is idle filler.
//! There is no frame marker: a frame ends when the input has been quiet for
//! the frame timeout.
//!
//! [`FrameLayer`] owns the [`ProtocolEngine`](gemini_transport::ProtocolEngine)
//! and assembles received frames into a fixed-length buffer.

pub mod codec;
pub mod error;
pub mod layer;

pub use codec::{
    encode_frame, format_wire_bits, wire_bits, FrameConfig, START_BIT, WIRE_BITS_PER_BYTE,
};
pub use error::{FrameError, Result};
pub use layer::{FrameLayer, FrameState};
