// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Autotest control files and their classification.
//!
//! A control file is a Python script read by autoserv. The runner only cares about two
//! declarations in it: the required `TEST_TYPE`, and the optional `RETRIES`.

use crate::errors::ClassifyError;
use autotest_metadata::TestTypeSummary;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::{collections::HashMap, fmt, sync::LazyLock};
use tracing::debug;

static TEST_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^\s*TEST_TYPE\s*=\s*["']?(\w+)["']?"#).expect("TEST_TYPE regex is valid")
});

static RETRIES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*RETRIES\s*=\s*(\d+)").expect("RETRIES regex is valid")
});

/// Where a control file runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TestType {
    /// The test runs on the device under test.
    Client,

    /// The test runs on the server and drives the device remotely.
    Server,
}

impl TestType {
    /// Returns the executor flag selecting this test type.
    pub fn executor_flag(self) -> &'static str {
        match self {
            Self::Client => "-c",
            Self::Server => "-s",
        }
    }

    /// Returns the lowercase name used in control files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }

    /// Converts this into its serializable form.
    pub fn to_summary(self) -> TestTypeSummary {
        match self {
            Self::Client => TestTypeSummary::Client,
            Self::Server => TestTypeSummary::Server,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified control file.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ControlFile {
    path: Utf8PathBuf,
    test_type: TestType,
    retry_count: u32,
}

impl ControlFile {
    /// Creates a new control file with already-known metadata.
    pub fn new(path: impl Into<Utf8PathBuf>, test_type: TestType, retry_count: u32) -> Self {
        Self {
            path: path.into(),
            test_type,
            retry_count,
        }
    }

    /// Classifies a control file from its contents.
    ///
    /// The first `TEST_TYPE` assignment wins. `RETRIES` defaults to 0 if it is absent or isn't a
    /// number that fits in a `u32`.
    pub fn from_contents(
        path: impl Into<Utf8PathBuf>,
        contents: &str,
    ) -> Result<Self, ClassifyError> {
        let path = path.into();

        let test_type = match TEST_TYPE_REGEX.captures(contents) {
            Some(captures) => {
                let value = &captures[1];
                match value.to_ascii_lowercase().as_str() {
                    "client" => TestType::Client,
                    "server" => TestType::Server,
                    _ => {
                        return Err(ClassifyError::UnknownTestType {
                            path,
                            value: value.to_owned(),
                        });
                    }
                }
            }
            None => return Err(ClassifyError::MissingTestType { path }),
        };

        let retry_count = RETRIES_REGEX
            .captures(contents)
            .and_then(|captures| captures[1].parse::<u32>().ok())
            .unwrap_or(0);

        Ok(Self {
            path,
            test_type,
            retry_count,
        })
    }

    /// Returns the path to this control file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the test type.
    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    /// Returns the number of times the executor should retry this test on failure.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the name of this control file's results directory.
    ///
    /// This is the name of the directory containing the control file, followed by the control
    /// file's suffix if it has one: `login_Cryptohome/control.regression` produces
    /// `login_Cryptohome.regression`.
    pub fn results_name(&self) -> String {
        results_name_for(&self.path)
    }
}

pub(crate) fn results_name_for(path: &Utf8Path) -> String {
    let test_name = path
        .parent()
        .and_then(|parent| parent.file_name())
        .unwrap_or("control");
    match path
        .file_name()
        .and_then(|name| name.strip_prefix("control."))
    {
        Some(suffix) => format!("{test_name}.{suffix}"),
        None => test_name.to_owned(),
    }
}

/// Classifies control files, reading each file at most once per invocation.
#[derive(Debug, Default)]
pub struct Classifier {
    cache: HashMap<Utf8PathBuf, ControlFile>,
}

impl Classifier {
    /// Creates a new classifier with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies the control file at `path`.
    pub fn classify(&mut self, path: &Utf8Path) -> Result<ControlFile, ClassifyError> {
        if let Some(control_file) = self.cache.get(path) {
            return Ok(control_file.clone());
        }

        let contents = fs_err::read_to_string(path).map_err(|err| ClassifyError::Read {
            path: path.to_owned(),
            err,
        })?;
        let control_file = ControlFile::from_contents(path, &contents)?;
        debug!(
            "classified {path} as {} with {} retries",
            control_file.test_type, control_file.retry_count
        );
        self.cache.insert(path.to_owned(), control_file.clone());
        Ok(control_file)
    }

    /// Returns the number of distinct control files classified so far.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
