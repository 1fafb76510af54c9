use bytes::{Bytes, BytesMut};
use gemini_transport::hal::{InputPin, OutputPin};
use gemini_transport::{EdgeInterrupt, LinkTimer, ProtocolEngine};
use tracing::{debug, trace, warn};

use crate::codec::{encode_frame, wire_bits, FrameConfig};
use crate::error::{FrameError, Result};

/// Receive-side framing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Line quiet; waiting for the first bit of the next frame.
    WaitFrameStart,
    /// Assembling start bits and data bytes into the bound buffer.
    WaitFrameData,
    /// Inactivity seen; discarding leftovers before the next frame.
    FrameEnd,
}

/// Frame layer on top of a [`ProtocolEngine`].
///
/// Incoming bits are assembled into a buffer of fixed length bound with
/// [`bind_input`](Self::bind_input). Each byte is preceded by a start bit;
/// frames are separated by an input inactivity gap of at least the frame
/// timeout.
///
/// Once [`frame_complete`](Self::frame_complete) is true the buffer is frozen:
/// bits of later frames are received and dropped until the caller consumes
/// the frame with [`get_frame`](Self::get_frame), [`take_frame`](Self::take_frame)
/// or [`reset_frame`](Self::reset_frame). A frame that started arriving while
/// the buffer was frozen is dropped whole, even if the buffer is released
/// before its last bit; the buffer takes the frame after it.
///
/// Without a bound buffer the layer leaves received bits in the engine's
/// input queue for the caller to read raw.
pub struct FrameLayer<I, O, T> {
    engine: ProtocolEngine<I, O, T>,
    config: FrameConfig,
    state: FrameState,
    buffer: BytesMut,
    byte_count: usize,
    start_bit: bool,
    timeout_counter: u64,
    frames_received: u64,
    skip_frame: bool,
}

impl<I, O, T> FrameLayer<I, O, T>
where
    I: InputPin,
    O: OutputPin,
    T: LinkTimer,
{
    /// Create a frame layer with no input buffer bound.
    ///
    /// Fails with [`FrameError::InvalidConfig`] when the frame timeout is
    /// shorter than one bit exchange.
    pub fn new(input: I, output: O, timer: T, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = ProtocolEngine::new(input, output, timer, config.protocol.clone())?;
        engine.set_frame_timeout(config.frame_timeout)?;
        Ok(Self {
            engine,
            config,
            state: FrameState::WaitFrameStart,
            buffer: BytesMut::new(),
            byte_count: 0,
            start_bit: false,
            timeout_counter: 0,
            frames_received: 0,
            skip_frame: false,
        })
    }

    /// Start with interrupt-driven edge detection.
    pub fn begin<A: EdgeInterrupt>(&mut self, irq: &mut A) -> Result<()> {
        self.engine.begin(irq)?;
        self.restart();
        Ok(())
    }

    /// Start with polled edge detection.
    pub fn begin_polling(&mut self) -> Result<()> {
        self.engine.begin_polling()?;
        self.restart();
        Ok(())
    }

    fn restart(&mut self) {
        self.state = FrameState::WaitFrameStart;
        self.skip_frame = false;
        self.reset_frame();
    }

    /// Bind a zeroed input buffer of `len` bytes, one frame's worth.
    pub fn bind_input(&mut self, len: usize) -> Result<()> {
        if len == 0 {
            return Err(FrameError::EmptyFrame);
        }
        self.buffer = BytesMut::zeroed(len);
        self.reset_frame();
        debug!(len, "frame input buffer bound");
        Ok(())
    }

    /// Drop the input buffer; received bits stay in the engine queue.
    pub fn unbind_input(&mut self) {
        self.buffer = BytesMut::new();
        self.reset_frame();
    }

    fn is_bound(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Run the engine, then advance the framing state machine.
    pub fn update(&mut self) -> Result<()> {
        self.engine.update()?;
        let bound = self.is_bound();

        match self.state {
            FrameState::WaitFrameStart => {
                if bound {
                    while self.engine.has_data() && self.engine.is_frame_end_detected() {
                        self.engine.receive();
                    }
                }
                if !self.engine.is_frame_end_detected() {
                    // A frame nobody consumed yet keeps the buffer.
                    if self.frame_complete() {
                        self.skip_frame = true;
                    } else {
                        self.reset_frame();
                    }
                    self.enter(FrameState::WaitFrameData);
                }
            }
            FrameState::WaitFrameData => {
                if bound && self.engine.has_data() {
                    self.handle_frame_data()?;
                }
                if self.engine.is_frame_end_detected() {
                    if self.skip_frame {
                        self.skip_frame = false;
                        trace!("skipped frame ended");
                    } else if bound && self.frame_started() && !self.frame_complete() {
                        self.timeout_counter += 1;
                        warn!(
                            received = self.byte_count,
                            expected = self.buffer.len(),
                            timeouts = self.timeout_counter,
                            "frame timeout before frame complete"
                        );
                        self.reset_frame();
                    }
                    self.enter(FrameState::FrameEnd);
                }
            }
            FrameState::FrameEnd => {
                if bound {
                    while self.engine.receive().is_some() {}
                }
                if self.engine.is_frame_end_detected() {
                    self.enter(FrameState::WaitFrameStart);
                }
            }
        }
        Ok(())
    }

    fn handle_frame_data(&mut self) -> Result<()> {
        if self.skip_frame || self.frame_complete() {
            let mut dropped = 0usize;
            while self.engine.receive().is_some() {
                dropped += 1;
            }
            trace!(dropped, "frame pending, bits dropped");
            return Ok(());
        }

        if self.start_bit {
            if let Some(byte) = self.engine.receive_byte(false)? {
                self.buffer[self.byte_count] = byte;
                self.byte_count += 1;
                self.start_bit = false;
                if self.frame_complete() {
                    self.frames_received += 1;
                    debug!(len = self.byte_count, "frame complete");
                }
            }
        } else if let Some(bit) = self.engine.receive() {
            self.start_bit = bit;
        }
        Ok(())
    }

    fn enter(&mut self, next: FrameState) {
        trace!(from = ?self.state, to = ?next, "frame state");
        self.state = next;
    }

    /// Queue `payload` as one frame: a start bit before every byte.
    ///
    /// Either the whole frame is queued or nothing is. Never blocks; the
    /// engine sends it when it next gets to write.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let needed = wire_bits(payload.len());
        if !self.engine.can_send(needed) {
            return Err(FrameError::OutputFull {
                needed,
                free: self.engine.output_free(),
            });
        }

        let mut bits = Vec::new();
        encode_frame(payload, &mut bits)?;
        for bit in bits {
            self.engine.send_bit(bit)?;
        }
        debug!(len = payload.len(), "frame queued");
        Ok(())
    }

    /// True once a full frame sits in the bound buffer.
    pub fn frame_complete(&self) -> bool {
        self.is_bound() && self.byte_count >= self.buffer.len()
    }

    /// True while a frame is partially received.
    pub fn frame_started(&self) -> bool {
        self.byte_count > 0 || self.start_bit
    }

    /// Release the frame and return the buffer.
    ///
    /// The contents stay as they are until the next frame overwrites them.
    /// A frame already arriving is not assembled; the next one is.
    /// `None` when no buffer is bound.
    pub fn get_frame(&mut self) -> Option<&[u8]> {
        if !self.is_bound() {
            return None;
        }
        self.reset_frame();
        Some(&self.buffer[..])
    }

    /// Copy out a completed frame and release it.
    pub fn take_frame(&mut self) -> Option<Bytes> {
        if !self.frame_complete() {
            return None;
        }
        let frame = Bytes::copy_from_slice(&self.buffer);
        self.reset_frame();
        Some(frame)
    }

    /// Allow the bound buffer to receive the next frame.
    ///
    /// As with [`get_frame`](Self::get_frame), a frame whose first bits
    /// arrived before this call is dropped.
    pub fn reset_frame(&mut self) {
        self.byte_count = 0;
        self.start_bit = false;
    }

    /// The bound buffer as it is now, complete or not.
    pub fn input_buffer(&self) -> Option<&[u8]> {
        self.is_bound().then_some(&self.buffer[..])
    }

    /// Length of the bound buffer; 0 when unbound.
    pub fn frame_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes received so far in the current frame.
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// True if any frame ended early since the counter was last reset.
    pub fn frame_timeout_detected(&self) -> bool {
        self.timeout_counter > 0
    }

    pub fn frame_timeout_counter(&self) -> u64 {
        self.timeout_counter
    }

    pub fn reset_frame_timeout_counter(&mut self) {
        self.timeout_counter = 0;
    }

    /// Complete frames received since construction.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn is_frame_end_detected(&self) -> bool {
        self.engine.is_frame_end_detected()
    }

    pub fn no_output_pending(&self) -> bool {
        self.engine.no_output_pending()
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn engine(&self) -> &ProtocolEngine<I, O, T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ProtocolEngine<I, O, T> {
        &mut self.engine
    }
}

impl<I, O, T> std::fmt::Debug for FrameLayer<I, O, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLayer")
            .field("engine", &self.engine)
            .field("state", &self.state)
            .field("frame_len", &self.buffer.len())
            .field("byte_count", &self.byte_count)
            .field("start_bit", &self.start_bit)
            .field("timeout_counter", &self.timeout_counter)
            .field("skip_frame", &self.skip_frame)
            .finish()
    }
}
