//! Simulated meter and bench for tests and host-side tooling.
//!
//! [`SimMeter`] plays the meter: it initiates every exchange, sends one
//! measurement frame followed by enough filler slots for the controller to
//! answer with a full control frame, and decodes what comes back.
//! [`SimBench`] wires a meter and a [`K197Controller`] over a
//! [`SimLink`] and steps both.

use std::time::Duration;

use gemini_frame::{wire_bits, FrameLayer};
use gemini_transport::sim::{SimEnd, SimInputPin, SimLink, SimOutputPin, SimTimer};
use gemini_transport::ProtocolState;
use tracing::debug;

use crate::control::{ControlRecord, CONTROL_LEN};
use crate::controller::{K197Config, K197Controller};
use crate::error::{K197Error, Result};
use crate::measurement::{MeasurementRecord, MEASUREMENT_LEN};

pub type SimController = K197Controller<SimInputPin, SimOutputPin, SimTimer>;
type SimFrameLayer = FrameLayer<SimInputPin, SimOutputPin, SimTimer>;

/// Simulated time per bench step.
pub const STEP_MICROS: u32 = 5;

/// Quiet time after an exchange beyond the frame timeout.
const GAP_MARGIN: Duration = Duration::from_millis(10);

/// Upper bound on one exchange.
const EXCHANGE_LIMIT: Duration = Duration::from_secs(1);

/// Meter side of the link.
pub struct SimMeter {
    frame: SimFrameLayer,
    readings_sent: u64,
}

impl SimMeter {
    /// Build the meter on one end of a link.
    pub fn new(end: SimEnd, config: &K197Config) -> Result<Self> {
        let SimEnd {
            input,
            output,
            timer,
            mut irq,
        } = end;
        let mut frame = FrameLayer::new(input, output, timer, config.frame.clone())?;
        frame.begin(&mut irq)?;
        frame.bind_input(CONTROL_LEN)?;
        Ok(Self {
            frame,
            readings_sent: 0,
        })
    }

    /// Queue a measurement frame plus the filler slots a control reply needs.
    pub fn queue_reading(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.frame.send_frame(record.as_bytes())?;
        let filler = wire_bits(CONTROL_LEN).saturating_sub(wire_bits(MEASUREMENT_LEN));
        for _ in 0..filler {
            self.frame.engine_mut().send_bit(false)?;
        }
        self.readings_sent += 1;
        debug!(reading = %record, "meter queued reading");
        Ok(())
    }

    pub fn update(&mut self) -> Result<()> {
        self.frame.update()?;
        Ok(())
    }

    /// True when nothing is queued and no exchange is in progress.
    pub fn is_idle(&self) -> bool {
        self.frame.no_output_pending() && self.frame.engine().state() == ProtocolState::Idle
    }

    /// Take a control frame received from the controller.
    pub fn take_control(&mut self) -> Option<ControlRecord> {
        let frame = self.frame.take_frame()?;
        ControlRecord::try_from(&frame[..]).ok()
    }

    pub fn readings_sent(&self) -> u64 {
        self.readings_sent
    }
}

/// A meter and a controller on one simulated link.
pub struct SimBench {
    link: SimLink,
    meter: SimMeter,
    controller: SimController,
    frame_gap: Duration,
}

impl SimBench {
    /// Build both sides. The controller starts as non-initiator, the state a
    /// completed bring-up leaves it in.
    pub fn new(config: K197Config) -> Result<Self> {
        let link = SimLink::new();
        let meter = SimMeter::new(link.end_a(), &config)?;
        let frame_gap = config.frame.frame_timeout + GAP_MARGIN;

        let SimEnd {
            input,
            output,
            timer,
            mut irq,
        } = link.end_b();
        let mut controller = K197Controller::new(input, output, timer, config)?;
        controller.begin(&mut irq)?;
        controller.engine_mut().set_initiator_mode(false);

        Ok(Self {
            link,
            meter,
            controller,
            frame_gap,
        })
    }

    /// Update both sides once and advance the clock by [`STEP_MICROS`].
    pub fn step(&mut self) -> Result<()> {
        self.meter.update()?;
        self.controller.update()?;
        self.link.advance(STEP_MICROS);
        Ok(())
    }

    /// Step for at least `duration` of simulated time.
    pub fn run_for(&mut self, duration: Duration) -> Result<()> {
        let end = u64::from(self.link.now()) + duration.as_micros() as u64;
        while u64::from(self.link.now()) < end {
            self.step()?;
        }
        Ok(())
    }

    /// Quiet time [`settle`](Self::settle) waits after each exchange.
    ///
    /// Defaults to the frame timeout plus 10 ms. A gap shorter than the frame
    /// timeout merges consecutive readings into one frame.
    pub fn set_frame_gap(&mut self, gap: Duration) {
        self.frame_gap = gap;
    }

    pub fn frame_gap(&self) -> Duration {
        self.frame_gap
    }

    /// Step until the meter is idle, then through a quiet frame gap.
    pub fn settle(&mut self) -> Result<()> {
        let start = self.link.now();
        let limit = EXCHANGE_LIMIT.as_micros() as u32;
        while !self.meter.is_idle() {
            if self.link.now().wrapping_sub(start) >= limit {
                return Err(K197Error::Timeout(EXCHANGE_LIMIT));
            }
            self.step()?;
        }
        self.run_for(self.frame_gap)
    }

    /// Have the meter send one reading and let the exchange finish.
    pub fn deliver(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.meter.queue_reading(record)?;
        self.settle()
    }

    pub fn controller(&self) -> &SimController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SimController {
        &mut self.controller
    }

    pub fn meter(&self) -> &SimMeter {
        &self.meter
    }

    pub fn meter_mut(&mut self) -> &mut SimMeter {
        &mut self.meter
    }

    pub fn link(&self) -> &SimLink {
        &self.link
    }
}
