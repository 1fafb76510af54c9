use gemini_frame::{encode_frame, format_wire_bits};
use gemini_k197::{ControlRecord, Range};
use serde::Serialize;

use crate::cmd::{ControlArgs, Toggle};
use crate::exit::{frame_error, k197_error, CliResult, SUCCESS};
use crate::output::{hex_bytes, on_off, print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct ControlOutput {
    kind: &'static str,
    bytes: String,
    range: Option<u8>,
    relative: Option<bool>,
    db: Option<bool>,
    trigger: Option<String>,
    remote: Option<bool>,
    stored: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wire: Option<String>,
}

pub fn run(args: ControlArgs, format: OutputFormat) -> CliResult<i32> {
    let record = build_record(&args).map_err(|err| k197_error("invalid control", err))?;

    let wire = if args.wire {
        let mut bits = Vec::new();
        encode_frame(record.as_bytes(), &mut bits)
            .map_err(|err| frame_error("encode failed", err))?;
        Some(format_wire_bits(&bits))
    } else {
        None
    };

    let out = ControlOutput {
        kind: "control",
        bytes: hex_bytes(record.as_bytes()),
        range: record.range().map(Range::code),
        relative: record.relative(),
        db: record.db_mode(),
        trigger: record.trigger_mode().map(|mode| format!("{mode:?}")),
        remote: record.remote_mode(),
        stored: record.send_stored_readings(),
        wire,
    };
    print_control(&out, format);
    Ok(SUCCESS)
}

fn build_record(args: &ControlArgs) -> gemini_k197::Result<ControlRecord> {
    let mut record = ControlRecord::new();
    if let Some(range) = args.range {
        record.set_range(Range::try_from(range)?);
    }
    if args.relative {
        record.set_relative(true);
    }
    if args.absolute {
        record.set_absolute(true);
    }
    if let Some(db) = args.db {
        record.set_db_mode(db == Toggle::On);
    }
    if let Some(trigger) = args.trigger {
        record.set_trigger_mode(trigger.into());
    }
    if args.remote {
        record.set_remote_mode(true);
    }
    if args.local {
        record.set_local_mode(true);
    }
    if args.stored {
        record.set_send_stored_readings(true);
    }
    if args.display {
        record.set_send_display_readings(true);
    }
    Ok(record)
}

fn print_control(out: &ControlOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut fields = vec![
                ("BYTES", out.bytes.clone()),
                (
                    "RANGE",
                    out.range.map_or_else(|| "-".to_string(), |r| r.to_string()),
                ),
                ("RELATIVE", on_off(out.relative)),
                ("DB", on_off(out.db)),
                ("TRIGGER", out.trigger.clone().unwrap_or_else(|| "-".into())),
                ("REMOTE", on_off(out.remote)),
                ("STORED", on_off(out.stored)),
            ];
            if let Some(wire) = &out.wire {
                fields.push(("WIRE", wire.clone()));
            }
            print_fields(&fields);
        }
        OutputFormat::Pretty => {
            println!("{}", out.bytes);
            if let Some(wire) = &out.wire {
                println!("{wire}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use gemini_k197::TriggerMode;

    use super::*;
    use crate::cmd::TriggerArg;

    #[test]
    fn no_flags_builds_empty_record() {
        let record = build_record(&ControlArgs::default()).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn flags_map_onto_record_fields() {
        let args = ControlArgs {
            range: Some(3),
            absolute: true,
            db: Some(Toggle::Off),
            trigger: Some(TriggerArg::T5),
            local: true,
            display: true,
            ..ControlArgs::default()
        };
        let record = build_record(&args).unwrap();

        assert_eq!(record.range(), Some(Range::R3));
        assert_eq!(record.relative(), Some(false));
        assert_eq!(record.db_mode(), Some(false));
        assert_eq!(record.trigger_mode(), Some(TriggerMode::T5));
        assert_eq!(record.remote_mode(), Some(false));
        assert_eq!(record.send_stored_readings(), Some(false));
    }
}
