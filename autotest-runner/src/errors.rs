// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the autotest runner.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::fmt;
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse remote-tests config{}", display_config_file(.config_file.as_ref()))]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// Returns the config file that failed to parse, if one was read.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}

fn display_config_file(config_file: Option<&Utf8PathBuf>) -> String {
    match config_file {
        Some(file) => format!(" at `{file}`"),
        None => String::new(),
    }
}

/// An error that occurred while classifying a control file.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The control file could not be read.
    #[error("failed to read control file `{path}`")]
    Read {
        /// The control file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The control file does not declare `TEST_TYPE`.
    #[error("control file `{path}` does not declare TEST_TYPE")]
    MissingTestType {
        /// The control file.
        path: Utf8PathBuf,
    },

    /// The control file declares a `TEST_TYPE` other than client or server.
    #[error("control file `{path}` has unknown TEST_TYPE `{value}` (expected client or server)")]
    UnknownTestType {
        /// The control file.
        path: Utf8PathBuf,

        /// The declared value.
        value: String,
    },
}

impl ClassifyError {
    /// Returns the control file this error is about.
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Read { path, .. }
            | Self::MissingTestType { path }
            | Self::UnknownTestType { path, .. } => path,
        }
    }
}

/// An error that occurred while enumerating a suite.
#[derive(Debug, Error)]
#[error("failed to enumerate suite `{suite}`{}", display_exit_code(.exit_code.as_ref()))]
#[non_exhaustive]
pub struct SuiteEnumerationError {
    /// The suite name.
    pub suite: String,

    /// The command line that was run, if an external enumerator was used.
    pub command: Option<String>,

    /// The exit code of the enumerator, if it exited with one.
    pub exit_code: Option<i32>,

    /// The underlying error, if the enumerator could not be run at all.
    #[source]
    pub err: Option<std::io::Error>,
}

impl SuiteEnumerationError {
    /// Creates a new error for a suite unknown to the enumerator.
    pub fn unknown_suite(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            command: None,
            exit_code: None,
            err: None,
        }
    }

    pub(crate) fn exec_failed(
        suite: impl Into<String>,
        command: impl IntoIterator<Item = impl AsRef<str>>,
        err: std::io::Error,
    ) -> Self {
        Self {
            suite: suite.into(),
            command: Some(shell_words::join(command)),
            exit_code: None,
            err: Some(err),
        }
    }

    pub(crate) fn command_failed(
        suite: impl Into<String>,
        command: impl IntoIterator<Item = impl AsRef<str>>,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            suite: suite.into(),
            command: Some(shell_words::join(command)),
            exit_code,
            err: None,
        }
    }
}

fn display_exit_code(exit_code: Option<&i32>) -> String {
    match exit_code {
        Some(code) => format!(" (enumerator exited with code {code})"),
        None => String::new(),
    }
}

/// An error that occurred while resolving test requests into control files.
///
/// Every variant is fatal: no test is executed unless every request resolves.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No requests were provided.
    #[error("no tests or suites were requested")]
    NoRequests,

    /// A pattern is not a valid regular expression.
    #[error("test pattern `{pattern}` is not a valid regular expression")]
    InvalidPattern {
        /// The pattern.
        pattern: String,

        /// The underlying error.
        #[source]
        err: regex::Error,
    },

    /// A pattern matched no control files.
    #[error("cannot find a control file matching `{pattern}`")]
    NoMatch {
        /// The pattern.
        pattern: String,
    },

    /// A pattern matched more than one control file.
    #[error("{}", display_ambiguous(.pattern, .matches))]
    AmbiguousPattern {
        /// The pattern.
        pattern: String,

        /// Every matching control file, in discovery order.
        matches: Vec<Utf8PathBuf>,
    },

    /// A search root could not be scanned.
    #[error("failed to scan search root `{root}`")]
    ScanRoot {
        /// The search root.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A suite could not be enumerated.
    #[error(transparent)]
    SuiteEnumeration(#[from] SuiteEnumerationError),

    /// A control file could not be classified.
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

fn display_ambiguous<'a>(
    pattern: &'a str,
    matches: &'a [Utf8PathBuf],
) -> AmbiguousPatternDisplay<'a> {
    AmbiguousPatternDisplay { pattern, matches }
}

struct AmbiguousPatternDisplay<'a> {
    pattern: &'a str,
    matches: &'a [Utf8PathBuf],
}

impl fmt::Display for AmbiguousPatternDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "test pattern `{}` is ambiguous, it matches {} control files:",
            self.pattern,
            self.matches.len()
        )?;
        for path in self.matches {
            write!(f, "\n  {path}")?;
        }
        write!(
            f,
            "\n(hint: specify a single file with a full pattern, e.g. `^{}$`)",
            self.matches
                .first()
                .map_or_else(String::new, |path| regex::escape(path.as_str())),
        )
    }
}

/// An error that occurred while writing a combined control file.
#[derive(Debug, Error)]
pub enum CombineError {
    /// A constituent control file could not be read.
    #[error("failed to read control file `{path}`")]
    ReadConstituent {
        /// The constituent control file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The combined control file could not be written.
    #[error("failed to write combined control file `{path}`")]
    Write {
        /// The combined control file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

/// An error that occurred while creating the invocation's work directory.
#[derive(Debug, Error)]
#[error("failed to create work directory for combined control files")]
pub struct WorkDirCreateError {
    #[source]
    err: std::io::Error,
}

impl WorkDirCreateError {
    pub(crate) fn new(err: std::io::Error) -> Self {
        Self { err }
    }
}

/// An error that occurred while building an execution plan.
#[derive(Debug, Error)]
pub enum PlanBuildError {
    /// The work directory could not be created.
    #[error(transparent)]
    WorkDirCreate(#[from] WorkDirCreateError),

    /// A combined control file could not be written.
    #[error(transparent)]
    Combine(#[from] CombineError),
}

/// An error which indicates that the signal handler could not be set up.
#[derive(Debug, Error)]
#[error("failed to set up signal handler")]
pub struct SignalHandlerSetupError(#[from] std::io::Error);

/// An infrastructure failure while executing a plan.
///
/// Test failures are not errors: they are recorded in
/// [`RunStats`](crate::runner::RunStats) and the run continues. These errors abort the run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The tokio runtime could not be created.
    #[error("failed to create tokio runtime")]
    RuntimeCreate(#[source] std::io::Error),

    /// The signal handler could not be set up.
    #[error(transparent)]
    SignalHandlerSetup(#[from] SignalHandlerSetupError),

    /// A results directory could not be created.
    #[error("failed to create results directory `{path}`")]
    ResultsDirCreate {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The executor could not be started.
    #[error("failed to execute `{command}`")]
    ExecutorSpawn {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Waiting for the executor failed.
    #[error("failed to wait for `{command}`")]
    ExecutorWait {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

/// An error returned by [`TestRunner::try_execute`](crate::runner::TestRunner::try_execute).
#[derive(Debug, Error)]
pub enum TestRunnerExecuteError<E> {
    /// The runner failed.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The event callback returned an error.
    #[error("error reporting run events")]
    Report(#[source] E),
}

/// An error that occurred while reporting a run event.
#[derive(Debug, Error)]
pub enum WriteEventError {
    /// Writing to the output stream failed.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// Writing the run summary failed.
    #[error(transparent)]
    Summary(#[from] WriteSummaryError),
}

/// An error that occurred while writing the run summary to the results directory.
#[derive(Debug, Error)]
pub enum WriteSummaryError {
    /// The summary file could not be created.
    #[error("failed to write `{path}`")]
    Io {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The JSON summary could not be serialized.
    #[error("failed to serialize run summary to `{path}`")]
    Json {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },

    /// The JUnit report could not be serialized.
    #[error("failed to serialize JUnit report to `{path}`")]
    Junit {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: quick_junit::SerializeError,
    },
}

/// An error that occurred while setting up a parallel fan-out.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// No tests were provided.
    #[error("no tests provided")]
    NoTests,

    /// Quiet mode requires a results directory root.
    #[error("--quiet requires --results-dir-root")]
    QuietWithoutResultsDir,

    /// Allocating SSH ports overflowed the port range.
    #[error("cannot allocate {count} SSH ports starting at {base}")]
    PortRange {
        /// The base port.
        base: u16,

        /// The number of ports needed.
        count: usize,
    },

    /// The tokio runtime could not be created.
    #[error("failed to create tokio runtime")]
    RuntimeCreate(#[source] std::io::Error),

    /// A per-job output file could not be created.
    #[error("failed to create output file for `{test}`")]
    OutputCreate {
        /// The test.
        test: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A job's runner could not be started.
    #[error("failed to execute `{command}`")]
    Spawn {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// Waiting for a job's runner failed.
    #[error("failed to wait for the runner of `{test}`")]
    Wait {
        /// The test.
        test: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A job's buffered output could not be replayed.
    #[error("failed to replay output for `{test}`")]
    Replay {
        /// The test.
        test: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}
