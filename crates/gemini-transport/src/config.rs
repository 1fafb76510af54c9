use std::time::Duration;

use crate::error::{Result, TransportError};

/// Default inactivity gap after which a frame is considered ended.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(50);

/// Timing of the bit-level handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Width of the high pulse that starts every written bit.
    pub write_pulse: Duration,
    /// Reserved. Accepted for compatibility, never consulted.
    pub handshake_timeout: Duration,
    /// Delay from a detected rising edge to sampling the input line.
    pub read_delay: Duration,
    /// Time the written bit is held after the peer's acknowledge edge.
    pub write_delay: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            write_pulse: Duration::from_micros(20),
            handshake_timeout: Duration::from_micros(80),
            read_delay: Duration::from_micros(170),
            write_delay: Duration::from_micros(90),
        }
    }
}

impl ProtocolConfig {
    /// Check that the timings describe a working handshake.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("write_pulse", self.write_pulse),
            ("handshake_timeout", self.handshake_timeout),
            ("read_delay", self.read_delay),
            ("write_delay", self.write_delay),
        ] {
            micros_u32(value).ok_or_else(|| {
                TransportError::InvalidConfig(format!("{name} {value:?} exceeds u32 microseconds"))
            })?;
        }

        // A zero bit is a bare pulse; sampling inside it would read a one.
        if self.read_delay <= self.write_pulse {
            return Err(TransportError::InvalidConfig(format!(
                "read_delay {:?} must exceed write_pulse {:?}",
                self.read_delay, self.write_pulse
            )));
        }
        Ok(())
    }
}

/// Convert a duration to whole microseconds if it fits the wrapping clock.
pub(crate) fn micros_u32(value: Duration) -> Option<u32> {
    u32::try_from(value.as_micros()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ProtocolConfig::default().validate().unwrap();
    }

    #[test]
    fn read_delay_inside_pulse_rejected() {
        let cfg = ProtocolConfig {
            read_delay: Duration::from_micros(20),
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn oversized_timing_rejected() {
        let cfg = ProtocolConfig {
            write_delay: Duration::from_secs(10_000),
            ..ProtocolConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
