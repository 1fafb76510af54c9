use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{K197Error, Result};
use crate::units::{Range, Unit};

/// Bytes in a measurement frame.
pub const MEASUREMENT_LEN: usize = 4;

/// Largest raw count: 21 bits.
pub const MAX_COUNT: u32 = 0x1F_FFFF;

// byte 0
const RANGE_MASK: u8 = 0b0000_0111;
const RELATIVE: u8 = 1 << 3;
const AC: u8 = 1 << 5;
const UNIT_SHIFT: u8 = 6;
// byte 1
const MSB_MASK: u8 = 0b0001_1111;
const OVERRANGE: u8 = 1 << 5;
const NEGATIVE: u8 = 1 << 7;

/// Power-of-ten exponent of the displayed value, per decade index.
const RANGE_EXPONENT: [i8; 14] = [-5, -4, -3, -2, -1, 0, 1, 2, 3, 4, 5, 6, 7, 8];

/// Scaling applied to the raw count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// The 5½ digits the meter displays.
    #[default]
    Standard,
    /// Two extra digits resolved from the raw count.
    Extended,
}

impl Precision {
    /// Display units per raw count, as (numerator, denominator).
    const fn scale(self) -> (u64, u64) {
        match self {
            Self::Standard => (3_125, 16_384),
            Self::Extended => (78_125, 4_096),
        }
    }

    /// Fractional digits after the single leading digit.
    const fn fraction_digits(self) -> usize {
        match self {
            Self::Standard => 5,
            Self::Extended => 7,
        }
    }

    const fn divisor(self) -> u32 {
        match self {
            Self::Standard => 100_000,
            Self::Extended => 10_000_000,
        }
    }
}

/// A reading as sent by the meter.
///
/// ```text
/// byte 0: range[0:2] relative[3] reserved[4] ac[5] unit[6:7]
/// byte 1: count[16:20] overrange[5] reserved[6] negative[7]
/// byte 2: count[8:15]
/// byte 3: count[0:7]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeasurementRecord([u8; MEASUREMENT_LEN]);

impl MeasurementRecord {
    pub const fn from_bytes(bytes: [u8; MEASUREMENT_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; MEASUREMENT_LEN] {
        &self.0
    }

    pub fn range(&self) -> Range {
        Range::from_code(self.0[0] & RANGE_MASK)
    }

    pub fn unit(&self) -> Unit {
        Unit::from_code(self.0[0] >> UNIT_SHIFT)
    }

    pub fn is_relative(&self) -> bool {
        self.0[0] & RELATIVE != 0
    }

    pub fn is_absolute(&self) -> bool {
        !self.is_relative()
    }

    pub fn is_ac(&self) -> bool {
        self.0[0] & AC != 0
    }

    pub fn is_dc(&self) -> bool {
        !self.is_ac()
    }

    pub fn is_volt(&self) -> bool {
        self.unit() == Unit::Volt
    }

    pub fn is_ohm(&self) -> bool {
        self.unit() == Unit::Ohm
    }

    pub fn is_amp(&self) -> bool {
        self.unit() == Unit::Amp
    }

    pub fn is_db(&self) -> bool {
        self.unit() == Unit::Db
    }

    pub fn is_negative(&self) -> bool {
        self.0[1] & NEGATIVE != 0
    }

    pub fn is_overrange(&self) -> bool {
        self.0[1] & OVERRANGE != 0
    }

    /// True when all count bits are zero, whatever the sign.
    pub fn is_zero(&self) -> bool {
        self.count() == 0
    }

    /// Raw 21-bit count.
    pub fn count(&self) -> u32 {
        (u32::from(self.0[1] & MSB_MASK) << 16) | (u32::from(self.0[2]) << 8) | u32::from(self.0[3])
    }

    /// Three-letter unit mnemonic: DCV, ACV, OHM, DCA, ACA, DCD or ACD.
    pub fn unit_str(&self) -> &'static str {
        match (self.unit(), self.is_ac()) {
            (Unit::Volt, true) => "ACV",
            (Unit::Volt, false) => "DCV",
            (Unit::Ohm, _) => "OHM",
            (Unit::Amp, true) => "ACA",
            (Unit::Amp, false) => "DCA",
            (Unit::Db, true) => "ACD",
            (Unit::Db, false) => "DCD",
        }
    }

    fn decade_index(&self) -> usize {
        self.unit().range_baseline() + usize::from(self.range().code())
    }

    /// Exponent applied to the displayed mantissa (`d.ddddd`).
    pub fn value_exponent(&self) -> i8 {
        RANGE_EXPONENT[self.decade_index()]
    }

    /// Displayed magnitude as an integer, without sign.
    pub fn abs_value(&self, precision: Precision) -> u32 {
        let (num, den) = precision.scale();
        // max count * 78125 / 4096 < 2^26
        (u64::from(self.count()) * num / den) as u32
    }

    /// Displayed value as a signed integer.
    pub fn value(&self, precision: Precision) -> i32 {
        let magnitude = self.abs_value(precision) as i32;
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Value in base units (volt, ohm, ampere, dB).
    pub fn as_f64(&self, precision: Precision) -> f64 {
        let power = 10f64.powi(self.decade_index() as i32 - 10);
        let value = f64::from(self.value(precision)) * power;
        match precision {
            Precision::Standard => value,
            Precision::Extended => value * 0.01,
        }
    }

    /// Signed mantissa with one leading digit, e.g. `+2.00000`.
    pub fn value_string(&self, precision: Precision) -> String {
        let value = self.abs_value(precision);
        let divisor = precision.divisor();
        format!(
            "{}{}.{:0width$}",
            if self.is_negative() { '-' } else { '+' },
            value / divisor,
            value % divisor,
            width = precision.fraction_digits(),
        )
    }

    /// Full result, e.g. `NDCV+2.00000E-1`.
    ///
    /// The first letter is `O` for overrange, `Z` for zero and `N` otherwise.
    pub fn result_string(&self, precision: Precision) -> String {
        let status = if self.is_overrange() {
            'O'
        } else if self.is_zero() {
            'Z'
        } else {
            'N'
        };
        let exponent = self.value_exponent();
        format!(
            "{status}{}{}E{}{}",
            self.unit_str(),
            self.value_string(precision),
            if exponent >= 0 { '+' } else { '-' },
            exponent.unsigned_abs(),
        )
    }

    /// Decoded snapshot for logging and serialization.
    pub fn reading(&self, precision: Precision) -> Reading {
        Reading {
            result: self.result_string(precision),
            unit: self.unit_str().to_string(),
            value: self.value(precision),
            exponent: self.value_exponent(),
            si_value: self.as_f64(precision),
            range: self.range().code(),
            count: self.count(),
            precision,
            relative: self.is_relative(),
            overrange: self.is_overrange(),
            zero: self.is_zero(),
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.0[0] = (self.0[0] & !RANGE_MASK) | range.code();
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.0[0] = (self.0[0] & !(0b11 << UNIT_SHIFT)) | (unit.code() << UNIT_SHIFT);
        self
    }

    pub fn with_ac(mut self, ac: bool) -> Self {
        set_flag(&mut self.0[0], AC, ac);
        self
    }

    pub fn with_relative(mut self, relative: bool) -> Self {
        set_flag(&mut self.0[0], RELATIVE, relative);
        self
    }

    pub fn with_negative(mut self, negative: bool) -> Self {
        set_flag(&mut self.0[1], NEGATIVE, negative);
        self
    }

    pub fn with_overrange(mut self, overrange: bool) -> Self {
        set_flag(&mut self.0[1], OVERRANGE, overrange);
        self
    }

    /// Set the raw count, truncated to 21 bits.
    pub fn with_count(mut self, count: u32) -> Self {
        let count = count & MAX_COUNT;
        self.0[1] = (self.0[1] & !MSB_MASK) | (count >> 16) as u8;
        self.0[2] = (count >> 8) as u8;
        self.0[3] = count as u8;
        self
    }
}

fn set_flag(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
}

impl From<[u8; MEASUREMENT_LEN]> for MeasurementRecord {
    fn from(bytes: [u8; MEASUREMENT_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for MeasurementRecord {
    type Error = K197Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; MEASUREMENT_LEN] = bytes.try_into().map_err(|_| {
            K197Error::InvalidRecord(format!(
                "measurement needs {MEASUREMENT_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.result_string(Precision::Standard))
    }
}

/// Decoded measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Result string as the meter would print it.
    pub result: String,
    pub unit: String,
    /// Signed displayed integer.
    pub value: i32,
    pub exponent: i8,
    /// Value in base units.
    pub si_value: f64,
    pub range: u8,
    /// Raw 21-bit count.
    pub count: u32,
    pub precision: Precision,
    pub relative: bool,
    pub overrange: bool,
    pub zero: bool,
}
