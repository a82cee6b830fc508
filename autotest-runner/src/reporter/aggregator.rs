// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collects outcomes into `results.json` and `junit.xml`.

use crate::{
    errors::WriteSummaryError,
    runner::{RunEvent, UnitOutcome},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset, Local};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{
    io::{BufWriter, Write},
    time::Instant,
};
use tracing::debug;

/// The name of the JSON run summary written to the results root.
pub const SUMMARY_FILE_NAME: &str = "results.json";

/// The name of the JUnit report written to the results root.
pub const JUNIT_FILE_NAME: &str = "junit.xml";

/// The JUnit test suite name for tests named by pattern.
const PATTERN_SUITE_NAME: &str = "tests";

#[derive(Debug)]
pub(super) struct EventAggregator {
    remote: String,
    iterations: u32,
    results_root: Option<Utf8PathBuf>,
    start_time: Option<DateTime<FixedOffset>>,
    stopwatch: Option<Instant>,
    test_suites: DebugIgnore<IndexMap<String, TestSuite>>,
}

impl EventAggregator {
    pub(super) fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            iterations: 1,
            results_root: None,
            start_time: None,
            stopwatch: None,
            test_suites: DebugIgnore(IndexMap::new()),
        }
    }

    pub(super) fn write_event(&mut self, event: &RunEvent<'_>) -> Result<(), WriteSummaryError> {
        match event {
            RunEvent::RunStarted {
                iterations,
                results_root,
                ..
            } => {
                self.iterations = *iterations;
                self.results_root = Some(results_root.clone());
                self.start_time = Some(Local::now().fixed_offset());
                self.stopwatch = Some(Instant::now());
            }
            RunEvent::UnitStarted { .. } | RunEvent::RunCancelled { .. } => {}
            RunEvent::UnitFinished {
                suite, outcome, ..
            } => {
                let name = suite.unwrap_or(PATTERN_SUITE_NAME);
                let test_suite = self
                    .test_suites
                    .entry(name.to_owned())
                    .or_insert_with(|| TestSuite::new(name));
                test_suite.add_test_case(test_case(name, outcome));
            }
            RunEvent::RunFinished { stats } => {
                let Some(results_root) = &self.results_root else {
                    return Ok(());
                };

                let summary = stats.to_summary(&self.remote, self.iterations);
                let summary_path = results_root.join(SUMMARY_FILE_NAME);
                let mut writer = BufWriter::new(create_file(&summary_path)?);
                serde_json::to_writer_pretty(&mut writer, &summary).map_err(|err| {
                    WriteSummaryError::Json {
                        path: summary_path.clone(),
                        err,
                    }
                })?;
                writer.flush().map_err(|err| WriteSummaryError::Io {
                    path: summary_path.clone(),
                    err,
                })?;
                debug!("wrote run summary to {summary_path}");

                let mut report = Report::new("run-remote-tests");
                if let Some(start_time) = self.start_time {
                    report.set_timestamp(start_time);
                }
                if let Some(stopwatch) = self.stopwatch {
                    report.set_time(stopwatch.elapsed());
                }
                report.add_test_suites(self.test_suites.drain(..).map(|(_, suite)| suite));

                let junit_path = results_root.join(JUNIT_FILE_NAME);
                let mut writer = BufWriter::new(create_file(&junit_path)?);
                report
                    .serialize(&mut writer)
                    .map_err(|err| WriteSummaryError::Junit {
                        path: junit_path.clone(),
                        err,
                    })?;
                writer.flush().map_err(|err| WriteSummaryError::Io {
                    path: junit_path.clone(),
                    err,
                })?;
                debug!("wrote JUnit report to {junit_path}");
            }
        }

        Ok(())
    }
}

fn test_case(suite_name: &str, outcome: &UnitOutcome) -> TestCase {
    let status = if outcome.passed {
        TestCaseStatus::success()
    } else {
        let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
        match outcome.exit_code {
            Some(code) => status.set_message(format!("executor exited with code {code}")),
            None => status.set_message("executor was terminated by a signal"),
        };
        status.set_type("test failure");
        status
    };

    let mut test_case = TestCase::new(outcome.name.as_str(), status);
    test_case
        .set_classname(format!("{suite_name}.{}", outcome.test_type))
        .set_timestamp(outcome.start_time)
        .set_time(outcome.time_taken);
    test_case
}

fn create_file(path: &Utf8Path) -> Result<fs_err::File, WriteSummaryError> {
    fs_err::File::create(path).map_err(|err| WriteSummaryError::Io {
        path: path.to_owned(),
        err,
    })
}
