// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use autotest_metadata::RemoteTestsExitCode;
use autotest_runner::errors::*;
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are meant to be printed with
// display_to_stderr, which colorizes them.

/// An error that occurred in a program that run-remote-tests ran, or in the inputs given to it.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("autotest directory not found")]
    AutotestDirNotFound { path: Utf8PathBuf },
    #[error("failed to get current directory")]
    CurrentDirError {
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid test request")]
    InvalidRequest { token: String },
    #[error("resolve error")]
    ResolveError {
        #[from]
        err: ResolveError,
    },
    #[error("plan build error")]
    PlanBuildError {
        #[from]
        err: PlanBuildError,
    },
    #[error("results directory create error")]
    ResultsDirCreate {
        #[source]
        err: std::io::Error,
    },
    #[error("runner error")]
    RunnerError {
        #[from]
        err: RunnerError,
    },
    #[error("fan-out error")]
    FanoutError {
        #[from]
        err: FanoutError,
    },
    #[error("error writing event")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing plan")]
    PlanSerializeError {
        #[source]
        err: serde_json::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
    #[error("test run cancelled")]
    TestRunCancelled { reason: &'static str },
    #[error("fan-out failed")]
    FanoutFailed { failed: Vec<String> },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    pub(crate) fn execute_error(err: TestRunnerExecuteError<WriteEventError>) -> Self {
        match err {
            TestRunnerExecuteError::Runner(err) => Self::RunnerError { err },
            TestRunnerExecuteError::Report(err) => Self::WriteEventError { err },
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::AutotestDirNotFound { .. }
            | Self::CurrentDirError { .. }
            | Self::ConfigParseError { .. }
            | Self::InvalidRequest { .. }
            | Self::PlanBuildError { .. }
            | Self::ResultsDirCreate { .. } => RemoteTestsExitCode::SETUP_ERROR,
            Self::ResolveError { .. } => RemoteTestsExitCode::RESOLUTION_FAILED,
            Self::RunnerError { err } => match err {
                RunnerError::ExecutorSpawn { .. } | RunnerError::ExecutorWait { .. } => {
                    RemoteTestsExitCode::EXECUTOR_FAILED
                }
                RunnerError::ResultsDirCreate { .. } => RemoteTestsExitCode::WRITE_OUTPUT_ERROR,
                _ => RemoteTestsExitCode::SETUP_ERROR,
            },
            Self::FanoutError { err } => match err {
                FanoutError::Spawn { .. } | FanoutError::Wait { .. } => {
                    RemoteTestsExitCode::EXECUTOR_FAILED
                }
                FanoutError::OutputCreate { .. } | FanoutError::Replay { .. } => {
                    RemoteTestsExitCode::WRITE_OUTPUT_ERROR
                }
                _ => RemoteTestsExitCode::SETUP_ERROR,
            },
            Self::WriteEventError { .. }
            | Self::WriteOutputError { .. }
            | Self::PlanSerializeError { .. } => RemoteTestsExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed | Self::FanoutFailed { .. } => {
                RemoteTestsExitCode::TEST_RUN_FAILED
            }
            Self::TestRunCancelled { .. } => RemoteTestsExitCode::TEST_RUN_CANCELLED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::AutotestDirNotFound { path } => {
                error!(
                    "autotest directory `{}` does not exist\n\
                     (hint: pass --autotest-dir or set AUTOTEST_DIR)",
                    path.style(styles.bold)
                );
                None
            }
            Self::CurrentDirError { err } => {
                error!("failed to get the current directory");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::InvalidRequest { token } => {
                error!(
                    "`{}` does not name a suite\n(hint: use `suite:<name>`)",
                    token.style(styles.bold)
                );
                None
            }
            Self::ResolveError { err } => {
                // Most resolution errors are self-describing.
                error!("{err}");
                err.source()
            }
            Self::PlanBuildError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ResultsDirCreate { err } => {
                error!("failed to create a results directory");
                Some(err as &dyn Error)
            }
            Self::RunnerError { err } => {
                error!("{err}");
                err.source()
            }
            Self::FanoutError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
            Self::PlanSerializeError { err } => {
                error!("failed to serialize the plan");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
            Self::TestRunCancelled { reason } => {
                error!(
                    "test run cancelled due to {}",
                    reason.style(styles.warning_text)
                );
                None
            }
            Self::FanoutFailed { failed } => {
                error!(
                    "{} {} failed: {}",
                    failed.len().style(styles.bold),
                    if failed.len() == 1 { "test" } else { "tests" },
                    failed.join(", ")
                );
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(
        ExpectedError::TestRunCancelled { reason: "interrupt" },
        RemoteTestsExitCode::TEST_RUN_CANCELLED
        ; "cancelled"
    )]
    #[test_case(ExpectedError::TestRunFailed, RemoteTestsExitCode::TEST_RUN_FAILED ; "failed")]
    #[test_case(
        ExpectedError::CurrentDirError { err: std::io::ErrorKind::NotFound.into() },
        RemoteTestsExitCode::SETUP_ERROR
        ; "current dir"
    )]
    #[test_case(
        ExpectedError::write_output(std::io::ErrorKind::BrokenPipe.into()),
        RemoteTestsExitCode::WRITE_OUTPUT_ERROR
        ; "write output"
    )]
    fn exit_codes(err: ExpectedError, expected: i32) {
        assert_eq!(err.process_exit_code(), expected);
    }
}
