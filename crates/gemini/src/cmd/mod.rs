use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use gemini_k197::TriggerMode;

use crate::exit::{CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod decode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a 4-byte measurement record.
    Decode(DecodeArgs),
    /// Build a 5-byte control record.
    Control(ControlArgs),
    /// Run a simulated meter against the controller and print what crosses the wire.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Control(args) => control::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Record bytes in hex, e.g. 02100000 or "02 10 00 00".
    pub hex: String,
    /// Decode with two extra digits of resolution.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    T0,
    T1,
    T4,
    T5,
    Talk,
}

impl From<TriggerArg> for TriggerMode {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::T0 => TriggerMode::T0,
            TriggerArg::T1 => TriggerMode::T1,
            TriggerArg::T4 => TriggerMode::T4,
            TriggerArg::T5 => TriggerMode::T5,
            TriggerArg::Talk => TriggerMode::Talk,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct ControlArgs {
    /// Range code, 0 for autorange.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=7))]
    pub range: Option<u8>,
    /// Switch to relative (REL) mode.
    #[arg(long, conflicts_with = "absolute")]
    pub relative: bool,
    /// Leave relative mode.
    #[arg(long)]
    pub absolute: bool,
    /// dB mode.
    #[arg(long, value_name = "on|off")]
    pub db: Option<Toggle>,
    #[arg(long)]
    pub trigger: Option<TriggerArg>,
    /// Put the meter in remote mode.
    #[arg(long, conflicts_with = "local")]
    pub remote: bool,
    #[arg(long)]
    pub local: bool,
    /// Report stored readings.
    #[arg(long, conflicts_with = "display")]
    pub stored: bool,
    /// Report displayed readings.
    #[arg(long)]
    pub display: bool,
    /// Also print the bits as they go on the wire.
    #[arg(long)]
    pub wire: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Reading the meter sends, in hex.
    #[arg(long, default_value = "02100000")]
    pub reading: String,
    /// Number of readings to send.
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub frames: u32,
    /// Ask the meter for this range before the first reading.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=7))]
    pub range: Option<u8>,
    /// Quiet time between readings (e.g. 60ms, 1s).
    #[arg(long, default_value = "60ms")]
    pub frame_gap: String,
    /// Decode with two extra digits of resolution.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build provenance and the default link timing.
    #[arg(long)]
    pub extended: bool,
}

/// Parse hex bytes. Spaces, `:` and `_` separators and a `0x` prefix are accepted.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<char> = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '_'))
        .collect();

    if digits.is_empty() {
        return Err(CliError::new(DATA_INVALID, "hex input must not be empty"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("odd number of hex digits in {input:?}"),
        ));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = pair[0].to_digit(16);
            let lo = pair[1].to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(CliError::new(
                    DATA_INVALID,
                    format!("invalid hex digit in {input:?}"),
                )),
            }
        })
        .collect()
}

/// Parse a duration such as `60ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("us") {
        (num, "us")
    } else if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "us" => Ok(Duration::from_micros(value)),
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
