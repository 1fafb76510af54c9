//! Hardware boundary consumed by the engine.
//!
//! Pin configuration and timer setup belong to the embedding firmware. The
//! engine only needs a readable input line, a writable output line, a
//! microsecond time base with busy-wait, and a way to hook the rising-edge
//! interrupt of the input line.

pub use embedded_hal::delay::DelayNs;
pub use embedded_hal::digital::{InputPin, OutputPin};

use crate::edge::EdgeSignal;
use crate::error::Result;

/// Monotonic microsecond clock with busy-wait delays.
pub trait LinkTimer: DelayNs {
    /// Current time in microseconds. Wraps on overflow; callers compare with
    /// `wrapping_sub`.
    fn now_micros(&mut self) -> u32;
}

/// Rising-edge interrupt registration for the input line.
pub trait EdgeInterrupt {
    /// Arrange for `edge.raise()` to run on every rising edge of the input
    /// line.
    ///
    /// Returns [`TransportError::InterruptUnavailable`](crate::TransportError::InterruptUnavailable)
    /// when the pin cannot interrupt.
    fn attach_rising(&mut self, edge: EdgeSignal) -> Result<()>;
}

/// How rising edges on the input line reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeDetection {
    /// An interrupt handler raises the edge flag.
    #[default]
    Interrupt,
    /// `update()` samples the input line and raises the flag itself on a
    /// low-to-high transition.
    Polling,
}
