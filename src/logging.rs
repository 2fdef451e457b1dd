use colored::*;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Short tag printed in front of each log line
pub fn level_tag(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERR :",
        Level::WARN => "WARN:",
        Level::INFO => "INFO:",
        Level::DEBUG => "DBG :",
        Level::TRACE => "TRC :",
    }
}

/// Tracing event formatter for the report's console output.
///
/// Each line is the level tag followed by the message, e.g.
/// `INFO: test duration	:10.00 seconds`. With `colorize` set, the whole
/// line is colored by level; the file log uses the same layout without color.
pub struct LevelTagFormatter {
    colorize: bool,
}

impl LevelTagFormatter {
    pub fn colored() -> Self {
        Self { colorize: true }
    }

    pub fn plain() -> Self {
        Self { colorize: false }
    }
}

impl<S, N> FormatEvent<S, N> for LevelTagFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let level = event.metadata().level();
        let line = format!("{} {}", level_tag(level), buffer);

        if !self.colorize {
            return writeln!(writer, "{}", line);
        }

        let colored_line = match *level {
            Level::INFO => line.normal(),
            Level::WARN => line.yellow(),
            Level::ERROR => line.red(),
            Level::DEBUG => line.blue(),
            Level::TRACE => line.purple(),
        };
        writeln!(writer, "{}", colored_line)
    }
}
