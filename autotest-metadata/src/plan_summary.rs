// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an autotest control file: whether it runs on the device under test or on the
/// server driving it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestTypeSummary {
    /// The test runs on the device under test.
    Client,

    /// The test runs on the server.
    Server,
}

impl fmt::Display for TestTypeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

/// Serializable form of an execution plan, as produced by `run-remote-tests list`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct PlanSummary {
    /// The autotest directory control files were resolved against.
    pub autotest_dir: Utf8PathBuf,

    /// Segments in execution order: regular tests first, then suites in request order.
    pub segments: Vec<PlanSegmentSummary>,
}

impl PlanSummary {
    /// Creates a new plan summary.
    pub fn new(autotest_dir: Utf8PathBuf, segments: Vec<PlanSegmentSummary>) -> Self {
        Self {
            autotest_dir,
            segments,
        }
    }

    /// Returns the total number of units across all segments.
    pub fn unit_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.units.len()).sum()
    }

    /// Parses a plan summary from a JSON string.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// One segment of a plan: the tests resolved from patterns, or the tests of one suite.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct PlanSegmentSummary {
    /// The suite name, or `None` for tests resolved from patterns.
    pub suite: Option<String>,

    /// Units in execution order.
    pub units: Vec<PlanUnitSummary>,
}

impl PlanSegmentSummary {
    /// Creates a new segment summary.
    pub fn new(suite: Option<String>, units: Vec<PlanUnitSummary>) -> Self {
        Self { suite, units }
    }
}

/// A single executable unit.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PlanUnitSummary {
    /// A control file run on its own.
    #[serde(rename_all = "kebab-case")]
    Standalone {
        /// The control file.
        path: Utf8PathBuf,

        /// The control file's test type.
        test_type: TestTypeSummary,

        /// The number of retries the executor is asked to perform.
        retries: u32,
    },

    /// A synthesized control file that runs several control files as one job.
    #[serde(rename_all = "kebab-case")]
    Combined {
        /// The synthesized control file.
        path: Utf8PathBuf,

        /// The test type shared by every constituent.
        test_type: TestTypeSummary,

        /// The constituent control files, in step order.
        constituents: Vec<Utf8PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_plan_summary() {
        let json = indoc! {r#"
            {
              "autotest-dir": "/autotest",
              "segments": [
                {
                  "suite": null,
                  "units": [
                    {
                      "kind": "standalone",
                      "path": "/autotest/server/site_tests/platform_BootPerfServer/control",
                      "test-type": "server",
                      "retries": 0
                    }
                  ]
                },
                {
                  "suite": "bvt",
                  "units": [
                    {
                      "kind": "combined",
                      "path": "/tmp/run_remote_tests.abc/combined_client_1/control",
                      "test-type": "client",
                      "constituents": [
                        "/autotest/client/site_tests/a/control",
                        "/autotest/client/site_tests/b/control"
                      ]
                    }
                  ]
                }
              ]
            }
        "#};

        let summary = PlanSummary::parse_json(json).expect("valid plan summary");
        assert_eq!(summary.unit_count(), 2);
        assert_eq!(summary.segments[1].suite.as_deref(), Some("bvt"));
        assert_eq!(
            summary.segments[0].units[0],
            PlanUnitSummary::Standalone {
                path: "/autotest/server/site_tests/platform_BootPerfServer/control".into(),
                test_type: TestTypeSummary::Server,
                retries: 0,
            }
        );
    }
}
