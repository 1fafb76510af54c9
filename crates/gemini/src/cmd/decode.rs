use gemini_k197::{MeasurementRecord, Precision, Reading};
use serde::Serialize;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{k197_error, CliResult, SUCCESS};
use crate::output::{hex_bytes, print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct DecodeOutput {
    kind: &'static str,
    bytes: String,
    #[serde(flatten)]
    reading: Reading,
    ac: bool,
    negative: bool,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let record = MeasurementRecord::try_from(bytes.as_slice())
        .map_err(|err| k197_error("decode failed", err))?;
    let precision = if args.extended {
        Precision::Extended
    } else {
        Precision::Standard
    };

    let out = DecodeOutput {
        kind: "reading",
        bytes: hex_bytes(record.as_bytes()),
        reading: record.reading(precision),
        ac: record.is_ac(),
        negative: record.is_negative(),
    };
    print_decoded(&out, format);
    Ok(SUCCESS)
}

fn print_decoded(out: &DecodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let r = &out.reading;
            print_fields(&[
                ("BYTES", out.bytes.clone()),
                ("RESULT", r.result.clone()),
                ("UNIT", r.unit.clone()),
                ("VALUE", format!("{}E{}", r.value, r.exponent)),
                ("SI VALUE", format!("{}", r.si_value)),
                ("RANGE", r.range.to_string()),
                ("COUNT", format!("{:#08X}", r.count)),
                ("RELATIVE", r.relative.to_string()),
                ("OVERRANGE", r.overrange.to_string()),
            ]);
        }
        OutputFormat::Pretty => {
            println!(
                "{} si={} range={} count={:#X}{}{}",
                out.reading.result,
                out.reading.si_value,
                out.reading.range,
                out.reading.count,
                if out.reading.relative { " rel" } else { "" },
                if out.reading.overrange { " overrange" } else { "" },
            );
        }
    }
}
