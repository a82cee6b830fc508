// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestTypeSummary;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Summary of a completed (or cancelled) run, written to `results.json` in the results
/// directory.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct RunSummary {
    /// The host the run targeted.
    pub remote: String,

    /// The number of passes over the plan that were requested.
    pub iterations: u32,

    /// The number of units that passed.
    pub passed: usize,

    /// The number of units that failed.
    pub failed: usize,

    /// Whether the run was interrupted before the plan completed.
    pub cancelled: bool,

    /// Per-unit outcomes, in execution order.
    pub units: Vec<UnitOutcomeSummary>,
}

impl RunSummary {
    /// Creates a new summary, counting passed and failed units from `units`.
    pub fn new(
        remote: impl Into<String>,
        iterations: u32,
        cancelled: bool,
        units: Vec<UnitOutcomeSummary>,
    ) -> Self {
        let passed = units.iter().filter(|unit| unit.passed).count();
        Self {
            remote: remote.into(),
            iterations,
            passed,
            failed: units.len() - passed,
            cancelled,
            units,
        }
    }

    /// Returns true if every executed unit passed and the run was not cancelled.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// Parses a run summary from a JSON string.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// The outcome of executing one unit once.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct UnitOutcomeSummary {
    /// The name of the unit's results subdirectory.
    pub name: String,

    /// The control file that was executed.
    pub control_file: Utf8PathBuf,

    /// The unit's test type.
    pub test_type: TestTypeSummary,

    /// The 1-based iteration this outcome belongs to.
    pub iteration: u32,

    /// The executor's exit code, if it exited normally.
    pub exit_code: Option<i32>,

    /// Whether the unit passed.
    pub passed: bool,

    /// Wall-clock time spent executing the unit, in seconds.
    pub time_taken_secs: f64,
}

impl UnitOutcomeSummary {
    /// Creates a new outcome summary. `passed` is derived from the exit code.
    pub fn new(
        name: impl Into<String>,
        control_file: impl Into<Utf8PathBuf>,
        test_type: TestTypeSummary,
        iteration: u32,
        exit_code: Option<i32>,
        time_taken_secs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            control_file: control_file.into(),
            test_type,
            iteration,
            exit_code,
            passed: exit_code == Some(0),
            time_taken_secs,
        }
    }
}
