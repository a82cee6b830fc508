// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use autotest_runner::reporter::ReporterStderr;
use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt,
    io::{self, Write},
    sync::Once,
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Events logged with this target are printed as is, without a level heading.
pub(crate) const NO_HEADING_TARGET: &str = "run_remote_tests::no_heading";

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output: debug logs and executor command lines
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let context = OutputContext {
            verbose: self.verbose,
            color: self.color,
        };
        context.init_logger();
        context
    }
}

/// Output settings shared by every command.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

static INIT_LOGGER: Once = Once::new();

impl OutputContext {
    /// Returns styles for error messages printed to stderr.
    pub fn stderr_styles(&self) -> StderrStyles {
        if self.color.should_colorize(supports_color::Stream::Stderr) {
            StderrStyles {
                bold: style().bold(),
                warning_text: style().yellow(),
            }
        } else {
            StderrStyles::default()
        }
    }

    fn init_logger(self) {
        let headings = if self.color.should_colorize(supports_color::Stream::Stderr) {
            Headings::colorized()
        } else {
            Headings::default()
        };
        let level = if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        INIT_LOGGER.call_once(|| {
            // Other crates only get to say something when it's a warning.
            let targets = Targets::new()
                .with_default(LevelFilter::WARN)
                .with_target("autotest_runner", level)
                .with_target("run_remote_tests", level);
            let layer = tracing_subscriber::fmt::layer()
                .event_format(HeadingFormatter { headings })
                .with_writer(io::stderr)
                .with_filter(targets);
            tracing_subscriber::registry().with(layer).init();
        });
    }
}

/// When to produce color output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    /// Color output if the stream supports it.
    #[default]
    Auto,

    /// Always color output.
    Always,

    /// Never color output.
    Never,
}

impl Color {
    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Self::Auto => supports_color::on_cached(stream).is_some(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Prints log events as `<level>: <message>` lines.
struct HeadingFormatter {
    headings: Headings,
}

impl<S, N> FormatEvent<S, N> for HeadingFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            let (name, style) = self.headings.for_level(*metadata.level());
            write!(writer, "{}: ", name.style(style))?;
        }

        let mut message = MessageWriter {
            writer: &mut writer,
            res: Ok(()),
        };
        event.record(&mut message);
        message.res?;

        writeln!(writer)
    }
}

/// Writes the `message` field of an event, ignoring any other fields.
struct MessageWriter<'w, 'a> {
    writer: &'a mut Writer<'w>,
    res: fmt::Result,
}

impl Visit for MessageWriter<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" && self.res.is_ok() {
            self.res = write!(self.writer, "{value:?}");
        }
    }
}

#[derive(Debug, Default)]
struct Headings {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
}

impl Headings {
    fn colorized() -> Self {
        Self {
            error: style().red().bold(),
            warning: style().yellow().bold(),
            info: style().bold(),
            debug: style().dimmed(),
        }
    }

    fn for_level(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.info),
            Level::DEBUG => ("debug", self.debug),
            Level::TRACE => ("trace", self.debug),
        }
    }
}

/// Styles for error messages on stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) warning_text: Style,
}

/// Where command output goes: the terminal, or buffers in tests.
#[derive(Default)]
pub enum OutputWriter {
    /// Write to stdout and stderr.
    #[default]
    Terminal,

    /// Capture output.
    #[cfg(test)]
    Captured {
        /// Captured stdout.
        stdout: Vec<u8>,

        /// Captured reporter output.
        stderr: Vec<u8>,
    },
}

impl OutputWriter {
    /// Returns a writer for command output on stdout.
    pub(crate) fn stdout(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Terminal => Box::new(io::BufWriter::new(io::stdout().lock())),
            #[cfg(test)]
            Self::Captured { stdout, .. } => Box::new(stdout),
        }
    }

    /// Returns the destination for run progress.
    pub(crate) fn reporter_output(&mut self) -> ReporterStderr<'_> {
        match self {
            Self::Terminal => ReporterStderr::Terminal,
            #[cfg(test)]
            Self::Captured { stderr, .. } => ReporterStderr::Buffer(stderr),
        }
    }
}
