use std::fmt;

use crate::error::{K197Error, Result};
use crate::units::{Range, TriggerMode};

/// Bytes in a control frame.
pub const CONTROL_LEN: usize = 5;

// byte 0
const RANGE_MASK: u8 = 0b0000_0111;
const SET_RANGE: u8 = 1 << 3;
const RELATIVE: u8 = 1 << 4;
const SET_RELATIVE: u8 = 1 << 5;
const DB: u8 = 1 << 6;
const SET_DB: u8 = 1 << 7;
// byte 1
const TRIGGER_MASK: u8 = 0b0000_0111;
const SET_TRIGGER: u8 = 1 << 3;
const REMOTE: u8 = 1 << 5;
const SET_REMOTE: u8 = 1 << 7;
// byte 2
const SEND_STORED: u8 = 1 << 5;
const SET_SEND_STORED: u8 = 1 << 7;

/// A command frame for the meter.
///
/// Each setting comes with a `set_` flag; a setting whose flag is clear is
/// left unchanged by the meter. An all-zero record changes nothing but still
/// triggers a reading in trigger modes T4/T5.
///
/// ```text
/// byte 0: range[0:2] set_range[3] relative[4] set_relative[5] db[6] set_db[7]
/// byte 1: trigger[0:2] set_trigger[3] reserved[4] remote[5] reserved[6] set_remote[7]
/// byte 2: reserved[0:4] send_stored[5] reserved[6] set_send_stored[7]
/// byte 3, byte 4: reserved, zero
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ControlRecord([u8; CONTROL_LEN]);

impl ControlRecord {
    /// An empty request.
    pub const fn new() -> Self {
        Self([0; CONTROL_LEN])
    }

    pub const fn from_bytes(bytes: [u8; CONTROL_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; CONTROL_LEN] {
        &self.0
    }

    /// Reset to an empty request.
    pub fn clear(&mut self) {
        self.0 = [0; CONTROL_LEN];
    }

    /// True if no setting is requested.
    pub fn is_empty(&self) -> bool {
        self.0 == [0; CONTROL_LEN]
    }

    pub fn set_range(&mut self, range: Range) -> &mut Self {
        self.0[0] = (self.0[0] & !RANGE_MASK) | range.code() | SET_RANGE;
        self
    }

    pub fn set_relative(&mut self, relative: bool) -> &mut Self {
        put(&mut self.0[0], RELATIVE, relative);
        self.0[0] |= SET_RELATIVE;
        self
    }

    pub fn set_absolute(&mut self, absolute: bool) -> &mut Self {
        self.set_relative(!absolute)
    }

    /// dB mode on, or back to volt.
    pub fn set_db_mode(&mut self, db: bool) -> &mut Self {
        put(&mut self.0[0], DB, db);
        self.0[0] |= SET_DB;
        self
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> &mut Self {
        self.0[1] = (self.0[1] & !TRIGGER_MASK) | mode.code() | SET_TRIGGER;
        self
    }

    pub fn set_remote_mode(&mut self, remote: bool) -> &mut Self {
        put(&mut self.0[1], REMOTE, remote);
        self.0[1] |= SET_REMOTE;
        self
    }

    pub fn set_local_mode(&mut self, local: bool) -> &mut Self {
        self.set_remote_mode(!local)
    }

    /// Report stored readings instead of the display.
    pub fn set_send_stored_readings(&mut self, stored: bool) -> &mut Self {
        put(&mut self.0[2], SEND_STORED, stored);
        self.0[2] |= SET_SEND_STORED;
        self
    }

    pub fn set_send_display_readings(&mut self, display: bool) -> &mut Self {
        self.set_send_stored_readings(!display)
    }

    /// Requested range, `None` if the range is left unchanged.
    pub fn range(&self) -> Option<Range> {
        (self.0[0] & SET_RANGE != 0).then(|| Range::from_code(self.0[0] & RANGE_MASK))
    }

    pub fn relative(&self) -> Option<bool> {
        (self.0[0] & SET_RELATIVE != 0).then_some(self.0[0] & RELATIVE != 0)
    }

    pub fn db_mode(&self) -> Option<bool> {
        (self.0[0] & SET_DB != 0).then_some(self.0[0] & DB != 0)
    }

    /// Requested trigger mode; `None` if unchanged or the code is unused.
    pub fn trigger_mode(&self) -> Option<TriggerMode> {
        if self.0[1] & SET_TRIGGER == 0 {
            return None;
        }
        TriggerMode::from_code(self.0[1] & TRIGGER_MASK)
    }

    pub fn remote_mode(&self) -> Option<bool> {
        (self.0[1] & SET_REMOTE != 0).then_some(self.0[1] & REMOTE != 0)
    }

    pub fn send_stored_readings(&self) -> Option<bool> {
        (self.0[2] & SET_SEND_STORED != 0).then_some(self.0[2] & SEND_STORED != 0)
    }
}

fn put(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

impl From<[u8; CONTROL_LEN]> for ControlRecord {
    fn from(bytes: [u8; CONTROL_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ControlRecord {
    type Error = K197Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; CONTROL_LEN] = bytes.try_into().map_err(|_| {
            K197Error::InvalidRecord(format!(
                "control record needs {CONTROL_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ControlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
