// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::runner::{RunEvent, RunStats, UnitOutcome};
use owo_colors::{OwoColorize, Style};
use std::{
    fmt,
    io::{self, Write},
    time::{Duration, Instant},
};

#[derive(Debug)]
pub(super) struct DisplayReporter {
    styles: Styles,
    verbose: bool,
    total: usize,
    completed: usize,
    stopwatch: Option<Instant>,
}

impl DisplayReporter {
    pub(super) fn new(should_colorize: bool, verbose: bool) -> Self {
        let mut styles = Styles::default();
        if should_colorize {
            styles.colorize();
        }
        Self {
            styles,
            verbose,
            total: 0,
            completed: 0,
            stopwatch: None,
        }
    }

    pub(super) fn write_event(
        &mut self,
        event: &RunEvent<'_>,
        mut writer: impl Write,
    ) -> io::Result<()> {
        match event {
            RunEvent::RunStarted {
                unit_count,
                iterations,
                results_root,
            } => {
                self.total = unit_count * (*iterations as usize);
                self.stopwatch = Some(Instant::now());

                write!(writer, "{:>12} ", "Starting".style(self.styles.pass))?;
                write!(
                    writer,
                    "{} {}",
                    unit_count.style(self.styles.count),
                    plural(*unit_count, "unit", "units"),
                )?;
                if *iterations > 1 {
                    write!(
                        writer,
                        " x {} iterations",
                        iterations.style(self.styles.count)
                    )?;
                }
                writeln!(writer, ", results in {results_root}")?;
            }
            RunEvent::UnitStarted {
                suite,
                unit,
                iteration: _,
                results_dir,
                command,
            } => {
                write!(writer, "{:>12} ", "START".style(self.styles.pass))?;
                self.write_counter(&mut writer, self.completed + 1)?;
                write!(
                    writer,
                    "{}",
                    results_dir
                        .file_name()
                        .unwrap_or_else(|| unit.path().as_str())
                        .style(self.styles.unit_name)
                )?;
                if let Some(suite) = suite {
                    write!(writer, " (suite {suite})")?;
                }
                writeln!(writer)?;
                if self.verbose {
                    writeln!(writer, "{:>12} {command}", "COMMAND".style(self.styles.count))?;
                }
            }
            RunEvent::UnitFinished { outcome, .. } => {
                self.completed += 1;
                self.write_outcome(&mut writer, outcome)?;
            }
            RunEvent::RunCancelled { event } => {
                writeln!(
                    writer,
                    "{:>12} due to {}",
                    "Cancelling".style(self.styles.fail),
                    event.description()
                )?;
            }
            RunEvent::RunFinished { stats } => {
                self.write_summary(&mut writer, stats)?;
            }
        }

        writer.flush()
    }

    fn write_counter(&self, mut writer: impl Write, current: usize) -> io::Result<()> {
        let width = self.total.to_string().len();
        write!(
            writer,
            "[{:>width$}/{}] ",
            current.style(self.styles.count),
            self.total.style(self.styles.count),
        )
    }

    fn write_outcome(&self, mut writer: impl Write, outcome: &UnitOutcome) -> io::Result<()> {
        if outcome.passed {
            write!(writer, "{:>12} ", "PASS".style(self.styles.pass))?;
        } else {
            write!(writer, "{:>12} ", "FAIL".style(self.styles.fail))?;
        }
        write!(
            writer,
            "{}{}",
            DisplayBracketedDuration(outcome.time_taken),
            outcome.name.style(self.styles.unit_name)
        )?;
        if !outcome.passed {
            match outcome.exit_code {
                Some(code) => write!(writer, " (exit code {code})")?,
                None => write!(writer, " (terminated by signal)")?,
            }
        }
        writeln!(writer)
    }

    fn write_summary(&self, mut writer: impl Write, stats: &RunStats) -> io::Result<()> {
        let elapsed = self
            .stopwatch
            .map(|stopwatch| stopwatch.elapsed())
            .unwrap_or_default();

        writeln!(writer, "------------")?;
        let summary_style = if stats.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        write!(
            writer,
            "{:>12} {}",
            "Summary".style(summary_style),
            DisplayBracketedDuration(elapsed),
        )?;

        let run = stats.passed + stats.failed;
        write!(
            writer,
            "{} {} run: {} {}",
            run.style(self.styles.count),
            plural(run, "unit", "units"),
            stats.passed.style(self.styles.count),
            "passed".style(self.styles.pass),
        )?;
        if stats.failed > 0 {
            write!(
                writer,
                ", {} {}",
                stats.failed.style(self.styles.count),
                "failed".style(self.styles.fail),
            )?;
        }
        if run < self.total {
            write!(
                writer,
                ", {} {}",
                (self.total - run).style(self.styles.count),
                "not run".style(self.styles.skip),
            )?;
        }
        writeln!(writer)?;

        for outcome in stats.failures() {
            self.write_outcome(&mut writer, outcome)?;
        }
        Ok(())
    }
}

fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 { singular } else { plural }
}

struct DisplayBracketedDuration(Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(f, "[{:>8.3?}s] ", self.0.as_secs_f64())
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    unit_name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.unit_name = Style::new().blue().bold();
    }
}
