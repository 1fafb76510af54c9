use gemini_frame::{FrameConfig, FrameLayer};
use gemini_transport::hal::{InputPin, OutputPin};
use gemini_transport::{EdgeInterrupt, LinkTimer, ProtocolEngine};
use tracing::debug;

use crate::control::ControlRecord;
use crate::error::{K197Error, Result};
use crate::measurement::{MeasurementRecord, MEASUREMENT_LEN};
use crate::startup::StartupConfig;

/// Configuration for a K197 controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct K197Config {
    pub frame: FrameConfig,
    pub startup: StartupConfig,
}

/// Controller side of the meter's internal interface.
///
/// Receives measurement frames into a [`MeasurementRecord`] and sends
/// [`ControlRecord`]s. Control frames queued with [`execute`](Self::execute)
/// go out only at a frame boundary and only when no earlier output is still
/// pending, so at most one is ever in flight.
///
/// [`update`](Self::update) must be called at least once per loop iteration.
pub struct K197Controller<I, O, T> {
    frame: FrameLayer<I, O, T>,
    config: K197Config,
    control: Option<ControlRecord>,
    output_queued: bool,
    controls_sent: u64,
}

impl<I, O, T> K197Controller<I, O, T>
where
    I: InputPin,
    O: OutputPin,
    T: LinkTimer,
{
    /// Create a controller with an empty control record.
    pub fn new(input: I, output: O, timer: T, config: K197Config) -> Result<Self> {
        let mut frame = FrameLayer::new(input, output, timer, config.frame.clone())?;
        frame.bind_input(MEASUREMENT_LEN)?;
        Ok(Self {
            frame,
            config,
            control: Some(ControlRecord::new()),
            output_queued: false,
            controls_sent: 0,
        })
    }

    /// Start with interrupt-driven edge detection.
    pub fn begin<A: EdgeInterrupt>(&mut self, irq: &mut A) -> Result<()> {
        self.frame.begin(irq)?;
        self.output_queued = false;
        Ok(())
    }

    /// Start with polled edge detection.
    pub fn begin_polling(&mut self) -> Result<()> {
        self.frame.begin_polling()?;
        self.output_queued = false;
        Ok(())
    }

    /// Run the stack: launch a queued control frame if the link allows it,
    /// then update the frame layer.
    pub fn update(&mut self) -> Result<()> {
        if self.output_queued && self.frame.is_frame_end_detected() && self.frame.no_output_pending()
        {
            self.send_control_immediately(true)?;
            self.output_queued = false;
        }
        self.frame.update()?;
        Ok(())
    }

    /// Replace the control record used by [`execute`](Self::execute).
    ///
    /// Cancels a queued but unsent request.
    pub fn set_control_record(&mut self, mut record: ControlRecord, reset: bool) {
        if reset {
            record.clear();
        }
        self.control = Some(record);
        self.output_queued = false;
    }

    /// Remove the control record, cancelling a queued request.
    pub fn take_control_record(&mut self) -> Option<ControlRecord> {
        self.output_queued = false;
        self.control.take()
    }

    pub fn control_record(&self) -> Option<&ControlRecord> {
        self.control.as_ref()
    }

    /// Edit the control record. Changes made before the queued request goes
    /// out are sent with it.
    pub fn control_record_mut(&mut self) -> Option<&mut ControlRecord> {
        self.control.as_mut()
    }

    /// Queue the control record for sending at the next frame boundary.
    pub fn execute(&mut self) -> Result<()> {
        if self.control.is_none() {
            return Err(K197Error::NoControlRecord);
        }
        self.output_queued = true;
        debug!("control frame queued");
        Ok(())
    }

    /// True once the last [`execute`](Self::execute) request was handed to the
    /// frame layer. The bits may still be on their way.
    pub fn execute_complete(&self) -> bool {
        !self.output_queued
    }

    /// Hand the control record to the frame layer now.
    ///
    /// Only safe at a frame boundary with no output pending; nothing checks
    /// that here.
    pub fn send_control_immediately(&mut self, reset_after_sending: bool) -> Result<()> {
        let record = self.control.as_mut().ok_or(K197Error::NoControlRecord)?;
        self.frame.send_frame(record.as_bytes())?;
        debug!(control = %record, "control frame sent");
        if reset_after_sending {
            record.clear();
        }
        self.controls_sent += 1;
        Ok(())
    }

    /// Hand an arbitrary control record to the frame layer now, bypassing the
    /// queue. Same caveats as [`send_control_immediately`](Self::send_control_immediately).
    ///
    /// With `reset_after_sending` the caller's record is cleared once queued;
    /// on error it is left as it was.
    pub fn send_immediately(
        &mut self,
        record: &mut ControlRecord,
        reset_after_sending: bool,
    ) -> Result<()> {
        self.frame.send_frame(record.as_bytes())?;
        debug!(control = %record, "control frame sent");
        if reset_after_sending {
            record.clear();
        }
        self.controls_sent += 1;
        Ok(())
    }

    /// True when a new measurement is waiting.
    pub fn measurement_complete(&self) -> bool {
        self.frame.frame_complete()
    }

    /// Take the waiting measurement, freeing the buffer for the next one.
    pub fn take_measurement(&mut self) -> Option<MeasurementRecord> {
        let frame = self.frame.take_frame()?;
        MeasurementRecord::try_from(&frame[..]).ok()
    }

    /// Control frames handed to the frame layer so far.
    pub fn controls_sent(&self) -> u64 {
        self.controls_sent
    }

    pub fn is_frame_end_detected(&self) -> bool {
        self.frame.is_frame_end_detected()
    }

    pub fn no_output_pending(&self) -> bool {
        self.frame.no_output_pending()
    }

    pub fn config(&self) -> &K197Config {
        &self.config
    }

    pub fn frame(&self) -> &FrameLayer<I, O, T> {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameLayer<I, O, T> {
        &mut self.frame
    }

    pub fn engine(&self) -> &ProtocolEngine<I, O, T> {
        self.frame.engine()
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine<I, O, T> {
        self.frame.engine_mut()
    }
}

impl<I, O, T> std::fmt::Debug for K197Controller<I, O, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K197Controller")
            .field("frame", &self.frame)
            .field("control", &self.control)
            .field("output_queued", &self.output_queued)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sim::SimBench;
    use crate::units::{Range, TriggerMode, Unit};

    fn reading(count: u32) -> MeasurementRecord {
        MeasurementRecord::default()
            .with_unit(Unit::Volt)
            .with_range(Range::R2)
            .with_count(count)
    }

    #[test]
    fn receives_measurements() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();

        bench.deliver(&reading(0x10_0000)).unwrap();
        assert!(bench.controller().measurement_complete());
        let record = bench.controller_mut().take_measurement().unwrap();
        assert_eq!(record, reading(0x10_0000));
        assert_eq!(record.result_string(Default::default()), "NDCV+2.00000E+0");
        assert!(!bench.controller().measurement_complete());

        bench.deliver(&reading(0x08_0000)).unwrap();
        assert_eq!(bench.controller_mut().take_measurement(), Some(reading(0x08_0000)));
    }

    #[test]
    fn executed_control_reaches_meter_on_next_exchange() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        bench.deliver(&reading(1)).unwrap();

        let controller = bench.controller_mut();
        controller
            .control_record_mut()
            .unwrap()
            .set_range(Range::R3)
            .set_trigger_mode(TriggerMode::T4);
        controller.execute().unwrap();
        assert!(!controller.execute_complete());

        // Boundary already reached during the quiet gap: the frame is handed
        // down on the next update and rides on the meter's next exchange.
        bench.step().unwrap();
        assert!(bench.controller().execute_complete());
        assert!(bench.controller().control_record().unwrap().is_empty());
        bench.deliver(&reading(2)).unwrap();

        let control = bench.meter_mut().take_control().unwrap();
        assert_eq!(control.range(), Some(Range::R3));
        assert_eq!(control.trigger_mode(), Some(TriggerMode::T4));
        assert_eq!(bench.controller_mut().take_measurement(), Some(reading(2)));
        assert_eq!(bench.controller().controls_sent(), 1);
    }

    #[test]
    fn control_waits_for_frame_boundary() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        bench.meter_mut().queue_reading(&reading(7)).unwrap();

        // Let the meter get a few bits out, then ask for a control frame.
        bench.run_for(Duration::from_millis(2)).unwrap();
        assert!(!bench.controller().is_frame_end_detected());
        bench.controller_mut().execute().unwrap();
        bench.run_for(Duration::from_millis(2)).unwrap();
        assert!(!bench.controller().execute_complete());
        assert!(bench.controller().no_output_pending());

        bench.settle().unwrap();
        assert!(bench.controller().execute_complete());
        assert_eq!(bench.controller_mut().take_measurement(), Some(reading(7)));
    }

    #[test]
    fn only_one_control_in_flight() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        bench
            .controller_mut()
            .send_immediately(&mut ControlRecord::new(), true)
            .unwrap();
        bench.controller_mut().execute().unwrap();

        // Output still pending from the direct send: execute must wait.
        for _ in 0..100 {
            bench.step().unwrap();
        }
        assert!(!bench.controller().execute_complete());

        bench.deliver(&reading(3)).unwrap();
        assert!(bench.controller().execute_complete());
        assert_eq!(bench.controller().controls_sent(), 2);
    }

    #[test]
    fn send_immediately_clears_caller_record_on_request() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        let mut record = ControlRecord::new();
        record.set_range(Range::R5).set_remote_mode(true);
        let sent = record;

        bench.controller_mut().send_immediately(&mut record, false).unwrap();
        assert_eq!(record, sent);
        bench.deliver(&reading(1)).unwrap();
        assert_eq!(bench.meter_mut().take_control(), Some(sent));

        bench.controller_mut().send_immediately(&mut record, true).unwrap();
        assert!(record.is_empty());
        bench.deliver(&reading(2)).unwrap();
        let control = bench.meter_mut().take_control().unwrap();
        assert_eq!(control.range(), Some(Range::R5));
        assert_eq!(control.remote_mode(), Some(true));
        assert_eq!(bench.controller().controls_sent(), 2);
    }

    #[test]
    fn execute_without_record_fails() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        let record = bench.controller_mut().take_control_record();
        assert!(record.is_some());

        assert!(matches!(
            bench.controller_mut().execute(),
            Err(K197Error::NoControlRecord)
        ));
        assert!(matches!(
            bench.controller_mut().send_control_immediately(true),
            Err(K197Error::NoControlRecord)
        ));
    }

    #[test]
    fn set_control_record_cancels_pending_request() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        let controller = bench.controller_mut();
        controller.execute().unwrap();

        let mut record = ControlRecord::new();
        record.set_remote_mode(true);
        controller.set_control_record(record, false);
        assert!(controller.execute_complete());
        assert_eq!(controller.control_record(), Some(&record));

        controller.set_control_record(record, true);
        assert!(controller.control_record().unwrap().is_empty());
    }

    #[test]
    fn send_control_immediately_can_keep_record() {
        let mut bench = SimBench::new(K197Config::default()).unwrap();
        let controller = bench.controller_mut();
        controller.control_record_mut().unwrap().set_db_mode(true);

        controller.send_control_immediately(false).unwrap();
        assert_eq!(controller.control_record().unwrap().db_mode(), Some(true));
        assert!(!controller.no_output_pending());
    }
}
