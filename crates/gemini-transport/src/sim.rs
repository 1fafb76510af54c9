//! In-memory two-wire link for tests and the `simulate` command.
//!
//! A [`SimLink`] holds two lines and one shared microsecond clock. Each end
//! reads the other end's line and drives its own; a rising edge on a line
//! raises the edge signal of whichever end attached an interrupt to it. Time
//! only moves when someone delays or calls [`SimLink::advance`], so runs are
//! fully deterministic.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use embedded_hal::digital::ErrorType;

use crate::edge::EdgeSignal;
use crate::error::{Result, TransportError};
use crate::hal::{DelayNs, EdgeInterrupt, InputPin, LinkTimer, OutputPin};

#[derive(Debug, Default)]
struct SimLine {
    level: Cell<bool>,
    listener: RefCell<Option<EdgeSignal>>,
    rising_edges: Cell<u64>,
}

impl SimLine {
    fn drive(&self, high: bool) {
        let was_high = self.level.replace(high);
        if high && !was_high {
            self.rising_edges.set(self.rising_edges.get() + 1);
            if let Some(signal) = self.listener.borrow().as_ref() {
                signal.raise();
            }
        }
    }
}

/// Two lines and a shared clock.
#[derive(Debug, Clone, Default)]
pub struct SimLink {
    clock: Rc<Cell<u32>>,
    line_a: Rc<SimLine>,
    line_b: Rc<SimLine>,
}

/// Everything one end of the link needs to build an engine.
#[derive(Debug)]
pub struct SimEnd {
    pub input: SimInputPin,
    pub output: SimOutputPin,
    pub timer: SimTimer,
    pub irq: SimInterrupt,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// End A drives line A and reads line B.
    pub fn end_a(&self) -> SimEnd {
        self.end(&self.line_b, &self.line_a)
    }

    /// End B drives line B and reads line A.
    pub fn end_b(&self) -> SimEnd {
        self.end(&self.line_a, &self.line_b)
    }

    fn end(&self, input: &Rc<SimLine>, output: &Rc<SimLine>) -> SimEnd {
        SimEnd {
            input: SimInputPin {
                line: Rc::clone(input),
            },
            output: SimOutputPin {
                line: Rc::clone(output),
            },
            timer: SimTimer {
                clock: Rc::clone(&self.clock),
            },
            irq: SimInterrupt {
                line: Rc::clone(input),
                capable: true,
            },
        }
    }

    /// Current time in microseconds.
    pub fn now(&self) -> u32 {
        self.clock.get()
    }

    /// Move the shared clock forward.
    pub fn advance(&self, micros: u32) {
        self.clock.set(self.clock.get().wrapping_add(micros));
    }

    /// Drive line A by hand, as a scripted peer standing in for end A.
    pub fn drive_a(&self, high: bool) {
        self.line_a.drive(high);
    }

    /// Drive line B by hand, as a scripted peer standing in for end B.
    pub fn drive_b(&self, high: bool) {
        self.line_b.drive(high);
    }

    pub fn level_a(&self) -> bool {
        self.line_a.level.get()
    }

    pub fn level_b(&self) -> bool {
        self.line_b.level.get()
    }

    /// Rising edges seen on line A since the link was created.
    pub fn rising_edges_a(&self) -> u64 {
        self.line_a.rising_edges.get()
    }

    /// Rising edges seen on line B since the link was created.
    pub fn rising_edges_b(&self) -> u64 {
        self.line_b.rising_edges.get()
    }
}

#[derive(Debug)]
pub struct SimInputPin {
    line: Rc<SimLine>,
}

impl ErrorType for SimInputPin {
    type Error = Infallible;
}

impl InputPin for SimInputPin {
    fn is_high(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(self.line.level.get())
    }

    fn is_low(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(!self.line.level.get())
    }
}

#[derive(Debug)]
pub struct SimOutputPin {
    line: Rc<SimLine>,
}

impl ErrorType for SimOutputPin {
    type Error = Infallible;
}

impl OutputPin for SimOutputPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        self.line.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        self.line.drive(true);
        Ok(())
    }
}

/// Clock handle. Delays advance the shared clock instead of sleeping.
#[derive(Debug, Clone)]
pub struct SimTimer {
    clock: Rc<Cell<u32>>,
}

impl SimTimer {
    fn advance(&self, micros: u32) {
        self.clock.set(self.clock.get().wrapping_add(micros));
    }

    /// Run `step` after every delay, so a peer can be driven from inside a
    /// busy-wait that never returns to the caller's loop.
    pub fn with_step<F: FnMut()>(self, step: F) -> SteppedTimer<F> {
        SteppedTimer { timer: self, step }
    }
}

impl DelayNs for SimTimer {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(ms.wrapping_mul(1_000));
    }
}

impl LinkTimer for SimTimer {
    fn now_micros(&mut self) -> u32 {
        self.clock.get()
    }
}

/// A [`SimTimer`] that calls back after each delay.
pub struct SteppedTimer<F> {
    timer: SimTimer,
    step: F,
}

impl<F: FnMut()> DelayNs for SteppedTimer<F> {
    fn delay_ns(&mut self, ns: u32) {
        self.timer.delay_ns(ns);
        (self.step)();
    }

    fn delay_us(&mut self, us: u32) {
        self.timer.delay_us(us);
        (self.step)();
    }

    fn delay_ms(&mut self, ms: u32) {
        self.timer.delay_ms(ms);
        (self.step)();
    }
}

impl<F: FnMut()> LinkTimer for SteppedTimer<F> {
    fn now_micros(&mut self) -> u32 {
        self.timer.now_micros()
    }
}

impl<F> fmt::Debug for SteppedTimer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SteppedTimer")
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

/// Interrupt registration on the input line of one end.
#[derive(Debug)]
pub struct SimInterrupt {
    line: Rc<SimLine>,
    capable: bool,
}

impl SimInterrupt {
    /// Pretend the input pin cannot raise interrupts.
    pub fn set_interrupt_capable(&mut self, capable: bool) {
        self.capable = capable;
    }
}

impl EdgeInterrupt for SimInterrupt {
    fn attach_rising(&mut self, edge: EdgeSignal) -> Result<()> {
        if !self.capable {
            return Err(TransportError::InterruptUnavailable);
        }
        *self.line.listener.borrow_mut() = Some(edge);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::edge::EdgeFlag;

    #[test]
    fn rising_edge_raises_attached_listener() {
        let link = SimLink::new();
        let mut end = link.end_a();
        let flag = Arc::new(EdgeFlag::new());
        end.irq.attach_rising(EdgeSignal::new(Arc::clone(&flag))).unwrap();

        link.drive_b(true);
        assert!(flag.take());
        link.drive_b(true);
        assert!(!flag.take(), "level held high is not an edge");
        link.drive_b(false);
        assert!(!flag.take());
        assert_eq!(link.rising_edges_b(), 1);
    }

    #[test]
    fn ends_are_cross_wired() {
        let link = SimLink::new();
        let mut a = link.end_a();
        let mut b = link.end_b();

        a.output.set_high().unwrap();
        assert!(b.input.is_high().unwrap());
        assert!(!a.input.is_high().unwrap());
        assert!(link.level_a());

        b.output.set_high().unwrap();
        assert!(a.input.is_high().unwrap());
    }

    #[test]
    fn delays_advance_shared_clock() {
        let link = SimLink::new();
        let mut a = link.end_a();
        let mut b = link.end_b();

        a.timer.delay_us(20);
        assert_eq!(b.timer.now_micros(), 20);
        b.timer.delay_ms(2);
        assert_eq!(link.now(), 2_020);
        a.timer.delay_ns(1);
        assert_eq!(link.now(), 2_021);
    }

    #[test]
    fn stepped_timer_runs_step_after_each_delay() {
        let link = SimLink::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let clock = link.clone();
        let mut timer = link.end_a().timer.with_step(move || log.borrow_mut().push(clock.now()));

        timer.delay_us(5);
        timer.delay_ms(1);
        timer.delay_ns(1_500);
        assert_eq!(timer.now_micros(), 1_007);
        assert_eq!(*seen.borrow(), vec![5, 1_005, 1_007]);
    }
}
