use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Overrides `--log-level` with a full filter, e.g. `gemini_transport=trace`.
pub const LOG_FILTER_ENV: &str = "GEMINI_LOG";

/// Crates whose events `--log-level` controls; everything else stays at warn.
const STACK_TARGETS: [&str; 4] = ["gemini", "gemini_transport", "gemini_frame", "gemini_k197"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives: the stack crates at `level`, other crates no louder
/// than warn.
fn stack_directives(level: LogLevel) -> String {
    let base = level.min(LogLevel::Warn).as_str();
    let mut directives = base.to_string();
    for target in STACK_TARGETS {
        directives.push_str(&format!(",{target}={}", level.as_str()));
    }
    directives
}

/// Route stack logs to stderr so stdout stays machine-readable.
///
/// Per-bit engine traces only show at `trace`.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(stack_directives(level)));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_level_applies_to_stack_crates_only() {
        assert_eq!(
            stack_directives(LogLevel::Trace),
            "warn,gemini=trace,gemini_transport=trace,gemini_frame=trace,gemini_k197=trace"
        );
    }

    #[test]
    fn quiet_level_quiets_everything() {
        let directives = stack_directives(LogLevel::Error);
        assert!(directives.starts_with("error,"));
        assert!(directives.ends_with("gemini_k197=error"));
        EnvFilter::try_new(&directives).unwrap();
    }
}
