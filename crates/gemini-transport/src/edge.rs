//! Rising-edge flag shared between the interrupt handler and the polling loop.
//!
//! The flag is the only datum crossing the ISR boundary. The ISR side only
//! ever raises it; the polling side consumes it with a single atomic swap, so
//! an edge is never observed twice and never lost between test and clear.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-producer/single-consumer edge flag owned by one engine.
#[derive(Debug, Default)]
pub struct EdgeFlag {
    raised: AtomicBool,
}

impl EdgeFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Record a rising edge. This is the whole interrupt handler body.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Test and clear in one indivisible operation.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Peek without consuming.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Handle given to the interrupt registration so the ISR can raise the
/// flag of the engine it is bound to.
#[derive(Debug, Clone)]
pub struct EdgeSignal {
    flag: Arc<EdgeFlag>,
}

impl EdgeSignal {
    pub(crate) fn new(flag: Arc<EdgeFlag>) -> Self {
        Self { flag }
    }

    /// Called from the rising-edge interrupt.
    pub fn raise(&self) {
        self.flag.raise();
    }
}
