use std::time::Duration;

use gemini_transport::{ProtocolConfig, DEFAULT_FRAME_TIMEOUT};

use crate::error::{FrameError, Result};

/// Bits on the wire per payload byte: start bit + 8 data bits.
pub const WIRE_BITS_PER_BYTE: usize = 9;

/// Start bit announcing a data byte. A 0 in the start-bit slot is filler.
pub const START_BIT: bool = true;

/// Number of wire bits needed to send `len` payload bytes.
pub const fn wire_bits(len: usize) -> usize {
    len * WIRE_BITS_PER_BYTE
}

/// Encode a payload into its wire bits.
///
/// Wire format, per byte:
/// ```text
/// ┌───────────┬──────────────────────────┐
/// │ start (1) │ data bits 7..0 (MSB first)│
/// └───────────┴──────────────────────────┘
/// ```
/// There is no header or trailer: the frame ends when the line goes quiet
/// for the frame timeout.
pub fn encode_frame(payload: &[u8], dst: &mut Vec<bool>) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::EmptyFrame);
    }
    dst.reserve(wire_bits(payload.len()));
    for &byte in payload {
        dst.push(START_BIT);
        dst.extend((0..8).rev().map(|i| (byte >> i) & 1 == 1));
    }
    Ok(())
}

/// Render wire bits as `1`/`0`, one space between byte groups.
pub fn format_wire_bits(bits: &[bool]) -> String {
    let mut out = String::with_capacity(bits.len() + bits.len() / WIRE_BITS_PER_BYTE);
    for (i, bit) in bits.iter().enumerate() {
        if i > 0 && i % WIRE_BITS_PER_BYTE == 0 {
            out.push(' ');
        }
        out.push(if *bit { '1' } else { '0' });
    }
    out
}

/// Configuration for the frame layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Timing of the underlying bit handshake.
    pub protocol: ProtocolConfig,
    /// Input inactivity that ends a frame. Default: 50 ms.
    pub frame_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }
}

impl FrameConfig {
    /// Check the handshake timing and that the frame timeout outlasts one
    /// bit exchange.
    ///
    /// A shorter timeout would declare a frame end between two bits of the
    /// same frame.
    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()?;
        let bit_period = self.protocol.read_delay + self.protocol.write_delay;
        if self.frame_timeout < bit_period {
            return Err(FrameError::InvalidConfig(format!(
                "frame_timeout {:?} shorter than one bit period {bit_period:?}",
                self.frame_timeout
            )));
        }
        Ok(())
    }
}
