use serde::{Deserialize, Serialize};

use crate::error::{K197Error, Result};

/// Measurement unit, as encoded in bits 6-7 of the first measurement byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Volt,
    Ohm,
    Amp,
    Db,
}

impl Unit {
    /// Decode from the two-bit wire code. Higher bits are ignored.
    pub const fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Self::Volt,
            0b01 => Self::Ohm,
            0b10 => Self::Amp,
            _ => Self::Db,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Volt => 0b00,
            Self::Ohm => 0b01,
            Self::Amp => 0b10,
            Self::Db => 0b11,
        }
    }

    /// Offset of this unit's first range into the decade table.
    pub(crate) const fn range_baseline(self) -> usize {
        match self {
            Self::Volt => 3,
            Self::Ohm => 6,
            Self::Amp | Self::Db => 0,
        }
    }
}

/// Range code shared by measurement and control records.
///
/// Measurements always report the actual range, never `R0`. On the control
/// side `R0` selects autorange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Range {
    /// Autorange.
    R0,
    /// 200 mV, 200 Ohm, 200 uA.
    R1,
    /// 2 V, 2 kOhm, 2 mA.
    R2,
    /// 20 V, 20 kOhm, 20 mA.
    R3,
    /// 200 V, 200 kOhm, 200 mA.
    R4,
    /// 1000 V, 2 MOhm, 2 A (10 A on the current input).
    R5,
    /// 20 MOhm, 10 A.
    R6,
    /// 200 MOhm.
    R7,
}

impl Range {
    const ALL: [Range; 8] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
    ];

    /// Decode from the three-bit wire code. Higher bits are ignored.
    pub const fn from_code(code: u8) -> Self {
        Self::ALL[(code & 0b111) as usize]
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Range {
    type Error = K197Error;

    fn try_from(value: u8) -> Result<Self> {
        if value > 7 {
            return Err(K197Error::InvalidRecord(format!(
                "range {value} out of 0..=7"
            )));
        }
        Ok(Self::from_code(value))
    }
}

/// Trigger mode of the control record.
///
/// `T2` and `T3` (trigger on GET) are identical to `T0` and `T1` on the
/// internal interface. [`Talk`](TriggerMode::Talk) is not a mode but the
/// trigger itself for `T0`..`T3`; in `T4`/`T5` any control frame triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Continuous, triggered on TALK.
    T0,
    /// One-shot, triggered on TALK.
    T1,
    /// Continuous, triggered by any control frame.
    T4,
    /// One-shot, triggered by any control frame.
    T5,
    /// Trigger now.
    Talk,
}

impl TriggerMode {
    pub const T2: Self = Self::T0;
    pub const T3: Self = Self::T1;
    pub const GET: Self = Self::Talk;

    /// Decode from the three-bit wire code; `None` for unused codes.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code & 0b111 {
            0b010 => Some(Self::T0),
            0b011 => Some(Self::T1),
            0b100 => Some(Self::Talk),
            0b110 => Some(Self::T4),
            0b111 => Some(Self::T5),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::T0 => 0b010,
            Self::T1 => 0b011,
            Self::Talk => 0b100,
            Self::T4 => 0b110,
            Self::T5 => 0b111,
        }
    }

    /// True for the one-shot modes.
    pub const fn is_one_shot(self) -> bool {
        matches!(self, Self::T1 | Self::T5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_codes_match_wire_layout() {
        for unit in [Unit::Volt, Unit::Ohm, Unit::Amp, Unit::Db] {
            assert_eq!(Unit::from_code(unit.code()), unit);
        }
        assert_eq!(Unit::from_code(0b01), Unit::Ohm);
        assert_eq!(Unit::from_code(0b10), Unit::Amp);
    }

    #[test]
    fn range_rejects_out_of_band() {
        assert_eq!(Range::try_from(3).unwrap(), Range::R3);
        assert_eq!(Range::from_code(0b1111_1101), Range::R5);
        assert!(matches!(Range::try_from(8), Err(K197Error::InvalidRecord(_))));
    }

    #[test]
    fn trigger_aliases_share_codes() {
        assert_eq!(TriggerMode::T2.code(), 0b010);
        assert_eq!(TriggerMode::T3.code(), 0b011);
        assert_eq!(TriggerMode::GET, TriggerMode::Talk);
        assert_eq!(TriggerMode::from_code(0b101), None);
        assert_eq!(TriggerMode::from_code(0), None);
        assert_eq!(TriggerMode::from_code(0b110), Some(TriggerMode::T4));
        assert!(TriggerMode::T5.is_one_shot());
        assert!(!TriggerMode::T0.is_one_shot());
    }
}
