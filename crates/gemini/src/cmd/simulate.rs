use gemini_k197::sim::SimBench;
use gemini_k197::{K197Config, MeasurementRecord, Precision, Range, Reading};
use serde::Serialize;
use tracing::{debug, info};

use crate::cmd::{parse_duration, parse_hex, SimulateArgs};
use crate::exit::{k197_error, CliResult, SUCCESS};
use crate::output::{hex_bytes, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct ExchangeOutput {
    kind: &'static str,
    frame: u32,
    reading: Option<Reading>,
    control: Option<String>,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.reading)?;
    let record = MeasurementRecord::try_from(bytes.as_slice())
        .map_err(|err| k197_error("invalid reading", err))?;
    let gap = parse_duration(&args.frame_gap)?;
    let precision = if args.extended {
        Precision::Extended
    } else {
        Precision::Standard
    };

    let config = K197Config::default();
    if gap < config.frame.frame_timeout {
        info!(
            gap = ?gap,
            frame_timeout = ?config.frame.frame_timeout,
            "frame gap below frame timeout, readings will run together"
        );
    }

    let mut bench = SimBench::new(config).map_err(|err| k197_error("bench setup failed", err))?;
    bench.set_frame_gap(gap);

    if let Some(range) = args.range {
        let range = Range::try_from(range).map_err(|err| k197_error("invalid range", err))?;
        let controller = bench.controller_mut();
        if let Some(control) = controller.control_record_mut() {
            control.set_range(range);
        }
        controller
            .execute()
            .map_err(|err| k197_error("queue control failed", err))?;
    }

    let mut rows = Vec::with_capacity(args.frames as usize);
    for frame in 1..=args.frames {
        bench
            .deliver(&record)
            .map_err(|err| k197_error("exchange failed", err))?;

        let reading = bench
            .controller_mut()
            .take_measurement()
            .map(|m| m.reading(precision));
        let control = bench
            .meter_mut()
            .take_control()
            .map(|c| hex_bytes(c.as_bytes()));
        debug!(frame, received = reading.is_some(), "exchange done");

        let out = ExchangeOutput {
            kind: "exchange",
            frame,
            reading,
            control,
        };
        if matches!(format, OutputFormat::Json) {
            print_json(&out);
        } else {
            rows.push(out);
        }
    }

    let controller = bench.controller();
    info!(
        readings = bench.meter().readings_sent(),
        controls = controller.controls_sent(),
        timeouts = controller.frame().frame_timeout_counter(),
        "simulation finished"
    );

    match format {
        OutputFormat::Json => {}
        OutputFormat::Table => print_table(
            vec!["FRAME", "RESULT", "SI VALUE", "CONTROL"],
            rows.iter()
                .map(|row| {
                    vec![
                        row.frame.to_string(),
                        row.reading
                            .as_ref()
                            .map_or_else(|| "-".to_string(), |r| r.result.clone()),
                        row.reading
                            .as_ref()
                            .map_or_else(|| "-".to_string(), |r| r.si_value.to_string()),
                        row.control.clone().unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "frame={} reading={} control={}",
                    row.frame,
                    row.reading.as_ref().map_or("none", |r| r.result.as_str()),
                    row.control.as_deref().unwrap_or("none"),
                );
            }
        }
    }

    Ok(SUCCESS)
}
