//! Bring-up handshake with the meter.

use std::time::Duration;

use gemini_transport::hal::{InputPin, OutputPin};
use gemini_transport::{LinkTimer, TransportError};
use tracing::{debug, info, warn};

use crate::controller::K197Controller;
use crate::error::{K197Error, Result};

/// Poll interval of the startup exchange loop.
const EXCHANGE_POLL_MICROS: u32 = 2;

/// Bits in the startup exchange: the startup byte plus a trailing 0.
const EXCHANGE_BITS: usize = 9;

/// Timing of the bring-up sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Long wake pulse answering the meter's first edge.
    pub wake_pulse: Duration,
    /// Gap between the wake pulse and the tail pulse.
    pub wake_gap: Duration,
    pub wake_tail_pulse: Duration,
    /// How long to wait for the meter to release its line.
    pub idle_timeout: Duration,
    /// Quiet time before the startup exchange.
    pub settle: Duration,
    pub startup_byte: u8,
    /// Bound on the startup exchange.
    pub exchange_timeout: Duration,
    pub closing_pulse: Duration,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            wake_pulse: Duration::from_micros(1684),
            wake_gap: Duration::from_micros(60),
            wake_tail_pulse: Duration::from_micros(20),
            idle_timeout: Duration::from_millis(50),
            settle: Duration::from_millis(35),
            startup_byte: 0x80,
            exchange_timeout: Duration::from_millis(100),
            closing_pulse: Duration::from_micros(30),
        }
    }
}

fn micros(value: Duration) -> Result<u32> {
    u32::try_from(value.as_micros()).map_err(|_| {
        TransportError::InvalidConfig(format!("{value:?} exceeds u32 microseconds")).into()
    })
}

impl<I, O, T> K197Controller<I, O, T>
where
    I: InputPin,
    O: OutputPin,
    T: LinkTimer,
{
    /// Run the bring-up handshake as the interface card would.
    ///
    /// Waits for the meter's first edge (forever when `timeout` is `None`),
    /// answers with the wake pulses, exchanges the startup byte and leaves
    /// this side as non-initiator. Call after `begin` and before the first
    /// [`update`](Self::update).
    ///
    /// Only a missing first edge is an error. A line that does not go idle or
    /// a startup exchange the meter does not complete are logged and skipped.
    pub fn server_startup(&mut self, timeout: Option<Duration>) -> Result<()> {
        let cfg = self.config().startup.clone();
        let wake_pulse = micros(cfg.wake_pulse)?;
        let wake_gap = micros(cfg.wake_gap)?;
        let wake_tail_pulse = micros(cfg.wake_tail_pulse)?;
        let settle = micros(cfg.settle)?;
        let exchange_timeout = micros(cfg.exchange_timeout)?;
        let closing_pulse = micros(cfg.closing_pulse)?;

        let engine = self.engine_mut();
        match timeout {
            Some(limit) => match engine.wait_input_edge_timeout(limit) {
                Ok(()) => {}
                Err(TransportError::Timeout(_)) => return Err(K197Error::Timeout(limit)),
                Err(err) => return Err(err.into()),
            },
            None => engine.wait_input_edge()?,
        }
        debug!("meter edge seen, sending wake pulses");

        engine.pulse(wake_pulse, false)?;
        engine.delay_micros(wake_gap);
        engine.pulse(wake_tail_pulse, false)?;

        match engine.wait_input_idle(cfg.idle_timeout) {
            Ok(()) => {}
            Err(TransportError::Timeout(elapsed)) => {
                warn!(code = "W01", ?elapsed, "meter line not idle, continuing");
            }
            Err(err) => return Err(err.into()),
        }
        engine.delay_micros(settle);

        engine.set_initiator_mode(true);
        engine.send_byte(cfg.startup_byte)?;
        engine.send_bit(false)?;

        let start = engine.now_micros();
        while !engine.has_bits(EXCHANGE_BITS) {
            if engine.now_micros().wrapping_sub(start) >= exchange_timeout {
                warn!(
                    received = engine.available(),
                    timeout = ?cfg.exchange_timeout,
                    "startup exchange incomplete, aborting"
                );
                engine.abort_exchange()?;
                break;
            }
            engine.update()?;
            engine.delay_micros(EXCHANGE_POLL_MICROS);
        }

        let mut reply = 0u16;
        let mut reply_bits = 0usize;
        while let Some(bit) = engine.receive() {
            reply = (reply << 1) | u16::from(bit);
            reply_bits += 1;
        }

        engine.pulse(closing_pulse, false)?;
        engine.set_initiator_mode(false);
        self.frame_mut().reset_frame();
        info!(reply_bits, reply, "meter startup complete");
        Ok(())
    }
}
