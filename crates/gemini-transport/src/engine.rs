use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::Error as _;
use tracing::{debug, error, trace, warn};

use crate::config::{micros_u32, ProtocolConfig, DEFAULT_FRAME_TIMEOUT};
use crate::edge::{EdgeFlag, EdgeSignal};
use crate::error::{Result, TransportError};
use crate::hal::{EdgeDetection, EdgeInterrupt, InputPin, LinkTimer, OutputPin};
use crate::queue::BitQueue;

/// Poll interval of the bring-up wait loops.
const WAIT_POLL_MICROS: u32 = 4;

/// State of the per-bit handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Both lines low, no exchange in progress.
    Idle,
    /// An edge was seen; waiting `read_delay` before sampling the input line.
    BitReadWait,
    /// A bit is on the output line; waiting for the peer's rising edge.
    BitWriteWaitAck,
    /// Acknowledged; holding the bit for `write_delay` before dropping the line.
    BitWriteEnd,
}

/// Bit-level Gemini protocol engine.
///
/// Owns both bit queues and the edge flag. Producers push bits with
/// [`send_bit`](Self::send_bit)/[`send_byte`](Self::send_byte), consumers pop
/// them with [`receive`](Self::receive)/[`receive_byte`](Self::receive_byte),
/// and [`update`](Self::update) moves bits across the wire. `update` must run
/// at least once per loop iteration and only blocks for the few microseconds
/// of an output pulse.
///
/// The engine also tracks inactivity on the input side: when no bit has been
/// sampled for the frame timeout, [`is_frame_end_detected`](Self::is_frame_end_detected)
/// turns true until the next bit arrives.
pub struct ProtocolEngine<I, O, T> {
    input: I,
    output: O,
    timer: T,
    config: ProtocolConfig,
    write_pulse_micros: u32,
    read_delay_micros: u32,
    write_delay_micros: u32,

    edge: Arc<EdgeFlag>,
    detection: EdgeDetection,
    last_input_level: bool,

    state: ProtocolState,
    can_be_initiator: bool,
    is_initiator: bool,
    input_queue: BitQueue,
    output_queue: BitQueue,
    input_overruns: u64,

    last_edge_time: u32,
    last_bit_read_time: u32,
    frame_timeout_micros: u32,
    frame_end_detected: bool,
}

impl<I, O, T> ProtocolEngine<I, O, T>
where
    I: InputPin,
    O: OutputPin,
    T: LinkTimer,
{
    /// Create an engine in `Idle` with empty queues.
    ///
    /// The engine is not usable until one of the `begin` variants succeeds.
    pub fn new(input: I, output: O, timer: T, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let write_pulse_micros = to_micros(config.write_pulse)?;
        let read_delay_micros = to_micros(config.read_delay)?;
        let write_delay_micros = to_micros(config.write_delay)?;
        let frame_timeout_micros = to_micros(DEFAULT_FRAME_TIMEOUT)?;

        Ok(Self {
            input,
            output,
            timer,
            config,
            write_pulse_micros,
            read_delay_micros,
            write_delay_micros,
            edge: Arc::new(EdgeFlag::new()),
            detection: EdgeDetection::Interrupt,
            last_input_level: false,
            state: ProtocolState::Idle,
            can_be_initiator: true,
            is_initiator: false,
            input_queue: BitQueue::new(),
            output_queue: BitQueue::new(),
            input_overruns: 0,
            last_edge_time: 0,
            last_bit_read_time: 0,
            frame_timeout_micros,
            frame_end_detected: true,
        })
    }

    /// Start the engine with interrupt-driven edge detection.
    ///
    /// Fails without touching the engine state if the input pin cannot
    /// interrupt.
    pub fn begin<A: EdgeInterrupt>(&mut self, irq: &mut A) -> Result<()> {
        irq.attach_rising(self.edge_signal())?;
        self.detection = EdgeDetection::Interrupt;
        self.reset_link()?;
        debug!("gemini engine started (interrupt edge detection)");
        Ok(())
    }

    /// Start the engine with edge detection done by sampling the input line.
    pub fn begin_polling(&mut self) -> Result<()> {
        self.last_input_level = self.read_input()?;
        self.detection = EdgeDetection::Polling;
        self.reset_link()?;
        debug!("gemini engine started (polled edge detection)");
        Ok(())
    }

    fn reset_link(&mut self) -> Result<()> {
        self.write_output(false)?;
        let now = self.timer.now_micros();
        self.state = ProtocolState::Idle;
        self.is_initiator = false;
        self.last_edge_time = now;
        self.last_bit_read_time = now;
        self.frame_end_detected = true;
        self.edge.take();
        Ok(())
    }

    /// Handle for the interrupt handler bound to this engine.
    pub fn edge_signal(&self) -> EdgeSignal {
        EdgeSignal::new(Arc::clone(&self.edge))
    }

    /// Advance the handshake state machine by one step.
    pub fn update(&mut self) -> Result<()> {
        let now = self.timer.now_micros();
        if self.detection == EdgeDetection::Polling {
            self.poll_input_edge()?;
        }

        if !self.frame_end_detected
            && now.wrapping_sub(self.last_bit_read_time) >= self.frame_timeout_micros
        {
            self.frame_end_detected = true;
            trace!("input inactivity, frame end");
        }

        match self.state {
            ProtocolState::Idle => {
                if self.edge.take() {
                    self.is_initiator = false;
                    self.last_edge_time = now;
                    self.enter(ProtocolState::BitReadWait);
                } else if self.can_be_initiator && !self.output_queue.is_empty() {
                    self.is_initiator = true;
                    self.drive_next_bit()?;
                }
            }
            ProtocolState::BitReadWait => {
                if now.wrapping_sub(self.last_edge_time) >= self.read_delay_micros {
                    let bit = self.read_input()?;
                    if self.input_queue.push(bit).is_err() {
                        self.input_overruns += 1;
                        warn!(overruns = self.input_overruns, "input queue full, bit dropped");
                    }
                    self.last_bit_read_time = now;
                    self.frame_end_detected = false;

                    if !self.output_queue.is_empty() {
                        self.drive_next_bit()?;
                    } else if self.is_initiator {
                        self.write_output(false)?;
                        self.is_initiator = false;
                        self.enter(ProtocolState::Idle);
                    } else {
                        // Acknowledge with a bare pulse, which the peer reads as 0.
                        self.pulse_micros(self.write_pulse_micros, false)?;
                        self.enter(ProtocolState::Idle);
                    }
                }
            }
            ProtocolState::BitWriteWaitAck => {
                if self.edge.take() {
                    self.last_edge_time = now;
                    self.enter(ProtocolState::BitWriteEnd);
                }
            }
            ProtocolState::BitWriteEnd => {
                if now.wrapping_sub(self.last_edge_time) >= self.write_delay_micros {
                    self.write_output(false)?;
                    self.enter(ProtocolState::BitReadWait);
                }
            }
        }
        Ok(())
    }

    /// Put the next queued bit on the output line: a rising edge, then the bit
    /// level once the write pulse has elapsed.
    fn drive_next_bit(&mut self) -> Result<()> {
        match self.output_queue.pop() {
            Some(bit) => {
                self.pulse_micros(self.write_pulse_micros, bit)?;
                self.enter(ProtocolState::BitWriteWaitAck);
            }
            None => {
                error!(state = ?self.state, "write with empty output queue, resetting to idle");
                self.write_output(false)?;
                self.is_initiator = false;
                self.enter(ProtocolState::Idle);
            }
        }
        Ok(())
    }

    fn enter(&mut self, next: ProtocolState) {
        trace!(from = ?self.state, to = ?next, "protocol state");
        self.state = next;
    }

    fn poll_input_edge(&mut self) -> Result<()> {
        let level = self.read_input()?;
        if level && !self.last_input_level {
            self.edge.raise();
        }
        self.last_input_level = level;
        Ok(())
    }

    fn read_input(&mut self) -> Result<bool> {
        self.input
            .is_high()
            .map_err(|err| TransportError::Gpio(err.kind()))
    }

    fn write_output(&mut self, high: bool) -> Result<()> {
        let result = if high {
            self.output.set_high()
        } else {
            self.output.set_low()
        };
        result.map_err(|err| TransportError::Gpio(err.kind()))
    }

    fn pulse_micros(&mut self, micros: u32, final_state: bool) -> Result<()> {
        self.write_output(true)?;
        self.timer.delay_us(micros);
        self.write_output(final_state)
    }

    /// Drive the output line high for `micros`, then leave it at `final_state`.
    ///
    /// With `final_state == true` this is a rising edge held high.
    pub fn pulse(&mut self, micros: u32, final_state: bool) -> Result<()> {
        self.pulse_micros(micros, final_state)
    }

    /// Queue one bit for transmission.
    pub fn send_bit(&mut self, bit: bool) -> Result<()> {
        self.output_queue
            .push(bit)
            .map_err(|_| TransportError::OutputFull)
    }

    /// Queue eight bits, most significant first.
    ///
    /// Stops at the first rejected bit; the bits already queued stay queued.
    pub fn send_byte(&mut self, data: u8) -> Result<()> {
        for i in (0..8u8).rev() {
            if self.send_bit((data >> i) & 1 == 1).is_err() {
                return Err(TransportError::PartialByte { sent_bits: 7 - i });
            }
        }
        Ok(())
    }

    /// True if at least `nbits` more bits fit in the output queue.
    pub fn can_send(&self, nbits: usize) -> bool {
        self.output_queue.free() >= nbits
    }

    /// Free slots in the output queue.
    pub fn output_free(&self) -> usize {
        self.output_queue.free()
    }

    pub fn is_output_pending(&self) -> bool {
        !self.output_queue.is_empty()
    }

    pub fn no_output_pending(&self) -> bool {
        self.output_queue.is_empty()
    }

    /// True if at least one received bit is queued.
    pub fn has_data(&self) -> bool {
        !self.input_queue.is_empty()
    }

    /// True if at least `n` received bits are queued.
    pub fn has_bits(&self, n: usize) -> bool {
        self.input_queue.len() >= n
    }

    /// Number of received bits waiting in the input queue.
    pub fn available(&self) -> usize {
        self.input_queue.len()
    }

    /// Pop the oldest received bit.
    pub fn receive(&mut self) -> Option<bool> {
        self.input_queue.pop()
    }

    /// Pop eight received bits as a byte, most significant first.
    ///
    /// With `block` set, keeps calling [`update`](Self::update) until eight
    /// bits are available. Without it, returns `Ok(None)` when fewer than
    /// eight bits are queued.
    pub fn receive_byte(&mut self, block: bool) -> Result<Option<u8>> {
        while !self.has_bits(8) {
            if !block {
                return Ok(None);
            }
            self.update()?;
        }

        let mut byte = 0u8;
        for _ in 0..8 {
            let bit = self.input_queue.pop().ok_or(TransportError::InputEmpty)?;
            byte = (byte << 1) | u8::from(bit);
        }
        Ok(Some(byte))
    }

    /// Abandon any exchange in progress: drop the output line, discard queued
    /// output and return to `Idle`.
    pub fn abort_exchange(&mut self) -> Result<()> {
        let discarded = self.output_queue.len();
        self.output_queue.clear();
        self.write_output(false)?;
        self.is_initiator = false;
        self.enter(ProtocolState::Idle);
        debug!(discarded, "exchange aborted");
        Ok(())
    }

    /// Busy-wait for a rising edge on the input line, consuming it.
    ///
    /// Bring-up only: must not run interleaved with [`update`](Self::update).
    pub fn wait_input_edge_timeout(&mut self, timeout: Duration) -> Result<()> {
        let timeout_micros = to_micros(timeout)?;
        let start = self.timer.now_micros();
        loop {
            let now = self.timer.now_micros();
            if self.detection == EdgeDetection::Polling {
                self.poll_input_edge()?;
            }
            self.timer.delay_us(WAIT_POLL_MICROS);
            if self.edge.take() {
                return Ok(());
            }
            if now.wrapping_sub(start) >= timeout_micros {
                return Err(TransportError::Timeout(timeout));
            }
        }
    }

    /// Busy-wait without bound for a rising edge on the input line.
    pub fn wait_input_edge(&mut self) -> Result<()> {
        loop {
            if self.detection == EdgeDetection::Polling {
                self.poll_input_edge()?;
            }
            self.timer.delay_us(WAIT_POLL_MICROS);
            if self.edge.take() {
                return Ok(());
            }
        }
    }

    /// Busy-wait until the input line is low.
    pub fn wait_input_idle(&mut self, timeout: Duration) -> Result<()> {
        let timeout_micros = to_micros(timeout)?;
        let start = self.timer.now_micros();
        while self.read_input()? {
            let now = self.timer.now_micros();
            if self.detection == EdgeDetection::Polling {
                self.poll_input_edge()?;
            }
            self.timer.delay_us(WAIT_POLL_MICROS);
            if now.wrapping_sub(start) >= timeout_micros {
                return Err(TransportError::Timeout(timeout));
            }
        }
        Ok(())
    }

    /// Whether this side may start an exchange on its own.
    pub fn initiator_mode(&self) -> bool {
        self.can_be_initiator
    }

    pub fn set_initiator_mode(&mut self, can_be_initiator: bool) {
        self.can_be_initiator = can_be_initiator;
    }

    /// True while this side drives the current exchange.
    pub fn is_initiator(&self) -> bool {
        self.is_initiator
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn edge_detection(&self) -> EdgeDetection {
        self.detection
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Received bits dropped because the input queue was full.
    pub fn input_overruns(&self) -> u64 {
        self.input_overruns
    }

    /// Set the input inactivity gap that ends a frame.
    pub fn set_frame_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.frame_timeout_micros = to_micros(timeout)?;
        Ok(())
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_micros(u64::from(self.frame_timeout_micros))
    }

    /// True once no bit has been received for the frame timeout, until the
    /// next bit arrives.
    pub fn is_frame_end_detected(&self) -> bool {
        self.frame_end_detected
    }

    /// Current time of the engine's clock.
    pub fn now_micros(&mut self) -> u32 {
        self.timer.now_micros()
    }

    /// Busy-wait on the engine's clock.
    pub fn delay_micros(&mut self, micros: u32) {
        self.timer.delay_us(micros);
    }
}

fn to_micros(value: Duration) -> Result<u32> {
    micros_u32(value).ok_or_else(|| {
        TransportError::InvalidConfig(format!("{value:?} exceeds u32 microseconds"))
    })
}

impl<I, O, T> std::fmt::Debug for ProtocolEngine<I, O, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("state", &self.state)
            .field("detection", &self.detection)
            .field("can_be_initiator", &self.can_be_initiator)
            .field("is_initiator", &self.is_initiator)
            .field("input_bits", &self.input_queue.len())
            .field("output_bits", &self.output_queue.len())
            .field("frame_end_detected", &self.frame_end_detected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEnd, SimLink};

    type SimEngine = ProtocolEngine<
        crate::sim::SimInputPin,
        crate::sim::SimOutputPin,
        crate::sim::SimTimer,
    >;

    fn engine(end: SimEnd) -> SimEngine {
        let SimEnd {
            input,
            output,
            timer,
            mut irq,
        } = end;
        let mut engine =
            ProtocolEngine::new(input, output, timer, ProtocolConfig::default()).unwrap();
        engine.begin(&mut irq).unwrap();
        engine
    }

    fn pair() -> (SimLink, SimEngine, SimEngine) {
        let link = SimLink::new();
        let a = engine(link.end_a());
        let mut b = engine(link.end_b());
        b.set_initiator_mode(false);
        (link, a, b)
    }

    fn run_until(
        link: &SimLink,
        a: &mut SimEngine,
        b: &mut SimEngine,
        mut done: impl FnMut(&SimEngine, &SimEngine) -> bool,
    ) {
        for _ in 0..200_000 {
            if done(a, b) {
                return;
            }
            a.update().unwrap();
            b.update().unwrap();
            link.advance(5);
        }
        panic!("condition not reached: a={a:?} b={b:?}");
    }

    #[test]
    fn byte_reaches_peer_msb_first() {
        let (link, mut a, mut b) = pair();
        a.send_byte(0xA5).unwrap();

        run_until(&link, &mut a, &mut b, |a, b| {
            b.has_bits(8) && a.no_output_pending() && a.state() == ProtocolState::Idle
        });

        let bits: Vec<bool> = std::iter::from_fn(|| b.receive()).collect();
        assert_eq!(
            bits,
            vec![true, false, true, false, false, true, false, true]
        );
    }

    #[test]
    fn receive_byte_assembles_value() {
        let (link, mut a, mut b) = pair();
        a.send_byte(0xA5).unwrap();
        run_until(&link, &mut a, &mut b, |_, b| b.has_bits(8));

        assert_eq!(b.receive_byte(false).unwrap(), Some(0xA5));
        assert!(!b.has_data());
    }

    #[test]
    fn initiator_receives_acknowledge_zeros() {
        let (link, mut a, mut b) = pair();
        a.send_byte(0xFF).unwrap();
        run_until(&link, &mut a, &mut b, |a, _| {
            a.has_bits(8) && a.state() == ProtocolState::Idle
        });

        assert_eq!(a.receive_byte(false).unwrap(), Some(0x00));
        assert!(!a.is_initiator());
    }

    #[test]
    fn non_initiator_answers_with_queued_data() {
        let (link, mut a, mut b) = pair();
        b.send_byte(0x3C).unwrap();
        a.send_byte(0x00).unwrap();

        run_until(&link, &mut a, &mut b, |a, _| a.has_bits(8));
        assert_eq!(a.receive_byte(false).unwrap(), Some(0x3C));
        assert_eq!(b.receive_byte(false).unwrap(), Some(0x00));
    }

    #[test]
    fn non_initiator_never_starts_an_exchange() {
        let (link, mut a, mut b) = pair();
        b.send_byte(0xFF).unwrap();

        for _ in 0..10_000 {
            a.update().unwrap();
            b.update().unwrap();
            link.advance(5);
        }

        assert_eq!(b.state(), ProtocolState::Idle);
        assert!(b.is_output_pending());
        assert!(!a.has_data());
    }

    #[test]
    fn blocking_receive_byte_returns_queued_byte() {
        let (link, mut a, mut b) = pair();
        a.send_byte(0x81).unwrap();
        run_until(&link, &mut a, &mut b, |_, b| b.has_bits(8));

        assert_eq!(b.receive_byte(true).unwrap(), Some(0x81));
        assert_eq!(b.receive_byte(false).unwrap(), None);
    }

    #[test]
    fn send_byte_reports_partial_failure() {
        let (_link, mut a, _b) = pair();
        for _ in 0..60 {
            a.send_bit(true).unwrap();
        }
        assert!(a.can_send(4));
        assert!(!a.can_send(5));

        let err = a.send_byte(0xFF).unwrap_err();
        assert!(matches!(err, TransportError::PartialByte { sent_bits: 4 }));
        assert!(matches!(a.send_bit(true), Err(TransportError::OutputFull)));
    }

    #[test]
    fn can_send_is_true_iff_enough_free_slots() {
        let (_link, mut a, _b) = pair();
        assert!(a.can_send(64));
        assert!(!a.can_send(65));
        a.send_byte(0).unwrap();
        assert!(a.can_send(56));
        assert!(!a.can_send(57));
    }

    #[test]
    fn receive_on_empty_is_none() {
        let (_link, mut a, _b) = pair();
        assert_eq!(a.receive(), None);
        assert_eq!(a.receive_byte(false).unwrap(), None);
    }

    #[test]
    fn full_input_queue_drops_and_counts_extra_bit() {
        let (link, mut a, mut b) = pair();
        let payload = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        for byte in payload {
            a.send_byte(byte).unwrap();
        }
        run_until(&link, &mut a, &mut b, |a, b| {
            b.has_bits(64) && a.no_output_pending() && a.state() == ProtocolState::Idle
        });
        while a.receive().is_some() {}
        assert_eq!(b.input_overruns(), 0);

        a.send_bit(true).unwrap();
        run_until(&link, &mut a, &mut b, |a, b| {
            b.input_overruns() == 1
                && a.no_output_pending()
                && a.state() == ProtocolState::Idle
                && b.state() == ProtocolState::Idle
        });

        // The exchange still completes: the initiator gets its acknowledge.
        assert_eq!(a.receive(), Some(false));
        assert_eq!(a.input_overruns(), 0);
        for byte in payload {
            assert_eq!(b.receive_byte(false).unwrap(), Some(byte));
        }
        assert!(!b.has_data());
    }

    #[test]
    fn frame_end_follows_input_inactivity() {
        let (link, mut a, mut b) = pair();
        assert!(b.is_frame_end_detected());

        a.send_byte(0x01).unwrap();
        run_until(&link, &mut a, &mut b, |_, b| b.has_data());
        assert!(!b.is_frame_end_detected());

        link.advance(49_000);
        b.update().unwrap();
        assert!(!b.is_frame_end_detected());

        link.advance(2_000);
        b.update().unwrap();
        assert!(b.is_frame_end_detected());
    }

    #[test]
    fn empty_write_resets_to_idle() {
        let (_link, mut a, _b) = pair();
        a.is_initiator = true;
        a.drive_next_bit().unwrap();
        assert_eq!(a.state(), ProtocolState::Idle);
        assert!(!a.is_initiator());
    }

    #[test]
    fn begin_fails_without_interrupt_and_keeps_state() {
        let link = SimLink::new();
        let SimEnd {
            input,
            output,
            timer,
            mut irq,
        } = link.end_a();
        irq.set_interrupt_capable(false);
        let mut engine =
            ProtocolEngine::new(input, output, timer, ProtocolConfig::default()).unwrap();
        engine.set_initiator_mode(false);

        let err = engine.begin(&mut irq).unwrap_err();
        assert!(matches!(err, TransportError::InterruptUnavailable));
        assert!(!engine.initiator_mode());
        assert_eq!(engine.state(), ProtocolState::Idle);
    }

    #[test]
    fn polling_detection_samples_scripted_peer() {
        let link = SimLink::new();
        let SimEnd {
            input,
            output,
            timer,
            ..
        } = link.end_a();
        let mut a = ProtocolEngine::new(input, output, timer, ProtocolConfig::default()).unwrap();
        a.begin_polling().unwrap();
        a.set_initiator_mode(false);
        assert_eq!(a.edge_detection(), EdgeDetection::Polling);

        // A one: rising edge held high through the sample point.
        link.drive_b(true);
        a.update().unwrap();
        assert_eq!(a.state(), ProtocolState::BitReadWait);
        link.advance(200);
        a.update().unwrap();
        assert_eq!(a.state(), ProtocolState::Idle);
        assert_eq!(a.receive(), Some(true));
        let acks = link.rising_edges_a();

        // A zero: rising edge, line back low before the sample point.
        link.drive_b(false);
        a.update().unwrap();
        link.drive_b(true);
        a.update().unwrap();
        link.drive_b(false);
        link.advance(200);
        a.update().unwrap();
        assert_eq!(a.receive(), Some(false));
        assert_eq!(link.rising_edges_a(), acks + 1);
    }

    #[test]
    fn wait_input_edge_times_out() {
        let link = SimLink::new();
        let mut a = engine(link.end_a());
        let start = link.now();

        let err = a
            .wait_input_edge_timeout(Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(link.now().wrapping_sub(start) >= 5_000);
    }

    #[test]
    fn wait_input_edge_consumes_edge() {
        let link = SimLink::new();
        let mut a = engine(link.end_a());
        link.drive_b(true);
        link.drive_b(false);

        a.wait_input_edge_timeout(Duration::from_millis(5)).unwrap();
        assert!(a
            .wait_input_edge_timeout(Duration::from_millis(1))
            .is_err());
    }

    #[test]
    fn unbounded_wait_returns_on_pending_edge() {
        let link = SimLink::new();
        let mut a = engine(link.end_a());
        link.drive_b(true);
        link.drive_b(false);
        let start = link.now();

        a.wait_input_edge().unwrap();
        assert!(link.now().wrapping_sub(start) >= WAIT_POLL_MICROS);
    }

    #[test]
    fn wait_input_idle_reports_stuck_line() {
        let link = SimLink::new();
        let mut a = engine(link.end_a());
        a.wait_input_idle(Duration::from_millis(1)).unwrap();

        link.drive_b(true);
        let err = a.wait_input_idle(Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[test]
    fn abort_exchange_discards_output() {
        let (link, mut a, _b) = pair();
        a.send_byte(0xF0).unwrap();
        a.update().unwrap();
        assert_eq!(a.state(), ProtocolState::BitWriteWaitAck);

        a.abort_exchange().unwrap();
        assert_eq!(a.state(), ProtocolState::Idle);
        assert!(a.no_output_pending());
        assert!(!link.level_a());
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let link = SimLink::new();
        let SimEnd {
            input,
            output,
            timer,
            ..
        } = link.end_a();
        let cfg = ProtocolConfig {
            read_delay: Duration::from_micros(10),
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            ProtocolEngine::new(input, output, timer, cfg),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
