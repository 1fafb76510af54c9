//! Keithley 197 application layer.
//!
//! The meter's internal interface sends 4-byte measurement frames and accepts
//! 5-byte control frames. [`MeasurementRecord`] and [`ControlRecord`] encode
//! and decode those bytes; [`K197Controller`] runs the frame layer, keeps the
//! latest measurement and makes sure only one control frame is in flight.

pub mod control;
pub mod controller;
pub mod error;
pub mod measurement;
pub mod startup;
pub mod units;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use control::{ControlRecord, CONTROL_LEN};
pub use controller::{K197Config, K197Controller};
pub use error::{K197Error, Result};
pub use measurement::{MeasurementRecord, Precision, Reading, MAX_COUNT, MEASUREMENT_LEN};
pub use startup::StartupConfig;
pub use units::{Range, TriggerMode, Unit};
