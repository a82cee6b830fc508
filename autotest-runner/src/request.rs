// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-supplied test requests.
//!
//! Every positional argument to `run-remote-tests` is a [`TestRequest`]: either a pattern matched
//! against the control file tree, or a reference to a suite.

use std::fmt;

/// A single user-supplied token naming tests to run.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum TestRequest {
    /// An unanchored regular expression matched against control file paths.
    Pattern(String),

    /// A suite to enumerate, without the `suite:` prefix.
    Suite(String),
}

impl TestRequest {
    /// Tokens starting with this prefix name a suite.
    pub const SUITE_PREFIX: &'static str = "suite:";

    /// Classifies a token as a pattern or a suite reference.
    ///
    /// Returns `None` for a bare `suite:` with no suite name.
    pub fn parse(token: &str) -> Option<Self> {
        match token.strip_prefix(Self::SUITE_PREFIX) {
            Some("") => None,
            Some(suite) => Some(Self::Suite(suite.to_owned())),
            None => Some(Self::Pattern(token.to_owned())),
        }
    }
}

impl fmt::Display for TestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(pattern) => write!(f, "{pattern}"),
            Self::Suite(suite) => write!(f, "{}{suite}", Self::SUITE_PREFIX),
        }
    }
}

/// Test requests split by kind, each kind in the order it was written.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestRequests {
    patterns: Vec<String>,
    suites: Vec<String>,
}

impl TestRequests {
    /// Creates a new set of requests.
    pub fn new(requests: impl IntoIterator<Item = TestRequest>) -> Self {
        let mut patterns = Vec::new();
        let mut suites = Vec::new();
        for request in requests {
            match request {
                TestRequest::Pattern(pattern) => patterns.push(pattern),
                TestRequest::Suite(suite) => suites.push(suite),
            }
        }
        Self { patterns, suites }
    }

    /// Parses tokens into requests. Returns the first token that isn't a valid request on
    /// failure.
    pub fn parse<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self, &'a str> {
        let requests = tokens
            .into_iter()
            .map(|token| TestRequest::parse(token).ok_or(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(requests))
    }

    /// Returns the patterns, in the order they were written.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the suite names, in the order they were written.
    pub fn suites(&self) -> &[String] {
        &self.suites
    }

    /// Returns true if there are no requests.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.suites.is_empty()
    }
}
