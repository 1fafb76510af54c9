//! Gemini: a clockless two-wire protocol stack for the Keithley 197 internal
//! interface.
//!
//! # Crate Structure
//!
//! - [`transport`] - Bit queues and the bit-level handshake engine
//! - [`frame`] - Start-bit byte framing and frame assembly
//! - [`k197`] - Measurement and control records, and the controller

/// Re-export transport types.
pub mod transport {
    pub use gemini_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gemini_frame::*;
}

/// Re-export K197 types.
pub mod k197 {
    pub use gemini_k197::*;
}
