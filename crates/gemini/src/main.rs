mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gemini", version, about = "Keithley 197 Gemini protocol tools")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "GEMINI_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_subcommand() {
        let cli = Cli::try_parse_from([
            "gemini",
            "control",
            "--range",
            "3",
            "--trigger",
            "t4",
            "--db",
            "off",
        ])
        .expect("control args should parse");

        match cli.command {
            Command::Control(args) => {
                assert_eq!(args.range, Some(3));
                assert_eq!(args.db, Some(cmd::Toggle::Off));
                assert_eq!(args.trigger, Some(cmd::TriggerArg::T4));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_mode_flags() {
        let err = Cli::try_parse_from(["gemini", "control", "--relative", "--absolute"])
            .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_range_out_of_band() {
        let err = Cli::try_parse_from(["gemini", "control", "--range", "8"])
            .expect_err("range 8 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn simulate_defaults() {
        let cli = Cli::try_parse_from(["gemini", "simulate"]).expect("simulate should parse");
        match cli.command {
            Command::Simulate(args) => {
                assert_eq!(args.frames, 3);
                assert_eq!(args.frame_gap, "60ms");
                assert_eq!(args.reading, "02100000");
                assert_eq!(args.range, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
