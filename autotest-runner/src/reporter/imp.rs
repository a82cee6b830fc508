// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{aggregator::EventAggregator, displayer::DisplayReporter};
use crate::{errors::WriteEventError, runner::RunEvent};
use std::io;

/// Standard error destination for the reporter.
///
/// This is usually the terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    should_colorize: bool,
    verbose: bool,
    write_summary: bool,
}

impl ReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output. Executor command lines are printed as units start.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Set to true to write `results.json` and `junit.xml` to the results root once the run
    /// finishes.
    pub fn set_write_summary(&mut self, write_summary: bool) -> &mut Self {
        self.write_summary = write_summary;
        self
    }

    /// Creates a new reporter for a run against `remote`.
    pub fn build<'a>(&self, remote: &str, output: ReporterStderr<'a>) -> Reporter<'a> {
        Reporter {
            display_reporter: DisplayReporter::new(self.should_colorize, self.verbose),
            aggregator: self.write_summary.then(|| EventAggregator::new(remote)),
            output,
        }
    }
}

/// Displays run progress on standard error and records outcomes in the results root.
pub struct Reporter<'a> {
    display_reporter: DisplayReporter,
    aggregator: Option<EventAggregator>,
    output: ReporterStderr<'a>,
}

impl Reporter<'_> {
    /// Reports a run event.
    pub fn report_event(&mut self, event: RunEvent<'_>) -> Result<(), WriteEventError> {
        let res = match &mut self.output {
            ReporterStderr::Terminal => {
                self.display_reporter
                    .write_event(&event, io::stderr().lock())
            }
            ReporterStderr::Buffer(buf) => self.display_reporter.write_event(&event, &mut **buf),
        };
        res.map_err(WriteEventError::Io)?;

        if let Some(aggregator) = &mut self.aggregator {
            aggregator.write_event(&event)?;
        }
        Ok(())
    }
}
