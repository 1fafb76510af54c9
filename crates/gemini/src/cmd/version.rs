use gemini_k197::{CONTROL_LEN, MEASUREMENT_LEN};
use gemini_transport::{ProtocolConfig, DEFAULT_FRAME_TIMEOUT, DEFAULT_QUEUE_CAPACITY};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("gemini {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: gemini");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("GEMINI_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("features: sim={}, cli=true", cfg!(feature = "sim"));

    let protocol = ProtocolConfig::default();
    println!("write_pulse: {:?}", protocol.write_pulse);
    println!("handshake_timeout: {:?}", protocol.handshake_timeout);
    println!("read_delay: {:?}", protocol.read_delay);
    println!("write_delay: {:?}", protocol.write_delay);
    println!("frame_timeout: {DEFAULT_FRAME_TIMEOUT:?}");
    println!("queue_bits: {DEFAULT_QUEUE_CAPACITY}");
    println!("measurement_bytes: {MEASUREMENT_LEN}");
    println!("control_bytes: {CONTROL_LEN}");

    Ok(SUCCESS)
}
