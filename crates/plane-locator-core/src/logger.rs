//! Process-wide log sinks.
//!
//! Libraries in this workspace only emit through the `log` macros (and
//! `tracing` spans when that feature is on). Binaries pick one sink at
//! startup: [`init_with_level`] for plain stderr lines, or `init_tracing`
//! for a `tracing-subscriber` pipeline that also captures `log` records.

use std::fmt::Arguments;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Writes `+secs LEVEL module: message` lines to stderr.
struct StderrSink {
    max: LevelFilter,
    epoch: Instant,
}

impl StderrSink {
    fn line(&self, level: Level, target: &str, args: &Arguments<'_>) -> String {
        let module = target
            .strip_prefix("plane_locator_")
            .or_else(|| target.strip_prefix("plane_locator::"))
            .unwrap_or(target);
        format!(
            "+{:.3}s {:<5} {module}: {args}",
            self.epoch.elapsed().as_secs_f64(),
            level
        )
    }
}

impl Log for StderrSink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level().to_level_filter() <= self.max
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let text = self.line(record.level(), record.target(), record.args());
            let _ = writeln!(std::io::stderr().lock(), "{text}");
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static SINK: OnceLock<StderrSink> = OnceLock::new();

/// Route `log` records at or above `level` to stderr.
///
/// Repeated calls keep the first sink and succeed. Fails only if another
/// logger was registered by someone else.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if SINK.get().is_some() {
        return Ok(());
    }
    let sink = SINK.get_or_init(|| StderrSink {
        max: level,
        epoch: Instant::now(),
    });
    log::set_logger(sink).map(|()| log::set_max_level(level))
}

/// Output layout for [`init_tracing`].
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceFormat {
    /// Human-readable lines with uptime stamps.
    #[default]
    Text,
    /// One flattened JSON object per event.
    Json,
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG`
/// (falling back to `info`). Span closings are reported with their busy
/// and idle times. A subscriber installed earlier is left in place.
#[cfg(feature = "tracing")]
pub fn init_tracing(format: TraceFormat) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let installed = match format {
        TraceFormat::Json => builder.json().flatten_event(true).finish().try_init(),
        TraceFormat::Text => builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init(),
    };
    if installed.is_err() {
        log::debug!("tracing subscriber already installed");
    }
}
