// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning test requests into an execution plan.
//!
//! Resolution happens in full before anything runs: every pattern must match exactly one control
//! file, every suite must enumerate, and every control file must classify. Only then is the plan
//! built.
//!
//! The plan is made of segments. Tests resolved from patterns make up the first segment, and
//! each suite gets its own segment after that, in the order the suites were requested.

use crate::{
    combine::{self, PlanUnit},
    control::{Classifier, ControlFile},
    errors::{PlanBuildError, ResolveError, WorkDirCreateError},
    pattern::{PatternMatcher, SearchRoots},
    request::TestRequests,
    suite::SuiteEnumerator,
};
use autotest_metadata::{PlanSegmentSummary, PlanSummary};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use indexmap::IndexMap;
use owo_colors::{OwoColorize, Style};
use std::{collections::HashSet, io};
use tracing::{debug, info, warn};

/// Owns everything needed to resolve requests during one invocation.
pub struct ResolutionContext<'a> {
    autotest_dir: Utf8PathBuf,
    roots: SearchRoots,
    enumerator: &'a dyn SuiteEnumerator,
    classifier: Classifier,
}

impl<'a> ResolutionContext<'a> {
    /// Creates a new resolution context.
    pub fn new(
        autotest_dir: impl Into<Utf8PathBuf>,
        roots: SearchRoots,
        enumerator: &'a dyn SuiteEnumerator,
    ) -> Self {
        Self {
            autotest_dir: autotest_dir.into(),
            roots,
            enumerator,
            classifier: Classifier::new(),
        }
    }

    /// Returns the autotest directory.
    pub fn autotest_dir(&self) -> &Utf8Path {
        &self.autotest_dir
    }

    /// Resolves and classifies every request.
    ///
    /// Patterns are resolved in the order they were written, then suites are enumerated in the
    /// order they were written. Control files are deduplicated within the pattern-resolved set
    /// and within each suite, keeping the first occurrence. A suite named more than once is
    /// enumerated once.
    pub fn resolve(&mut self, requests: &TestRequests) -> Result<ResolvedRequests, ResolveError> {
        if requests.is_empty() {
            return Err(ResolveError::NoRequests);
        }

        let mut regular = UniqueControlFiles::default();
        if !requests.patterns().is_empty() {
            let matcher = PatternMatcher::new(&self.roots)?;
            for pattern in requests.patterns() {
                let path = matcher.resolve(pattern)?;
                debug!("pattern `{pattern}` resolved to {path}");
                regular.push(self.classifier.classify(&path)?);
            }
        }

        let mut suites = IndexMap::new();
        for suite in requests.suites() {
            if suites.contains_key(suite) {
                debug!("suite {suite} requested more than once, enumerating once");
                continue;
            }

            let paths = self.enumerator.enumerate(suite, &self.autotest_dir)?;
            info!("suite {suite} has {} control files", paths.len());
            let mut files = UniqueControlFiles::default();
            for path in paths {
                files.push(self.classifier.classify(&path)?);
            }
            suites.insert(suite.clone(), files.into_vec());
        }

        Ok(ResolvedRequests {
            regular: regular.into_vec(),
            suites,
        })
    }

    /// Builds an execution plan from resolved requests.
    ///
    /// Combined control files are written to a fresh temporary work directory owned by the
    /// returned plan. If `combine` is false, every control file runs on its own.
    pub fn build_plan(
        &self,
        resolved: ResolvedRequests,
        combine: bool,
    ) -> Result<ExecutionPlan, PlanBuildError> {
        let work_dir = camino_tempfile::Builder::new()
            .prefix("run_remote_tests.")
            .tempdir()
            .map_err(WorkDirCreateError::new)?;
        debug!("using work directory {}", work_dir.path());

        let ResolvedRequests { regular, suites } = resolved;
        let sources = std::iter::once((None, regular))
            .chain(suites.into_iter().map(|(suite, files)| (Some(suite), files)));

        let mut segments = Vec::new();
        for (index, (suite, files)) in sources.enumerate() {
            if files.is_empty() {
                continue;
            }
            let units = if combine {
                combine::combine(&files, work_dir.path(), index + 1)?
            } else {
                combine::uncombined(&files)
            };
            segments.push(PlanSegment { suite, units });
        }

        Ok(ExecutionPlan {
            autotest_dir: self.autotest_dir.clone(),
            work_dir,
            segments,
        })
    }
}

#[derive(Default)]
struct UniqueControlFiles {
    seen: HashSet<Utf8PathBuf>,
    files: Vec<ControlFile>,
}

impl UniqueControlFiles {
    fn push(&mut self, control_file: ControlFile) {
        if self.seen.insert(control_file.path().to_owned()) {
            self.files.push(control_file);
        } else {
            debug!("skipping duplicate control file {}", control_file.path());
        }
    }

    fn into_vec(self) -> Vec<ControlFile> {
        self.files
    }
}

/// Classified control files for every request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedRequests {
    /// Control files resolved from patterns, in request order.
    pub regular: Vec<ControlFile>,

    /// Control files for each suite, keyed by suite name in request order.
    pub suites: IndexMap<String, Vec<ControlFile>>,
}

impl ResolvedRequests {
    /// Returns the total number of control files, counting a file once per segment it's in.
    pub fn len(&self) -> usize {
        self.regular.len() + self.suites.values().map(Vec::len).sum::<usize>()
    }

    /// Returns true if no control files were resolved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A segment of the plan: the pattern-resolved tests, or the tests of one suite.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlanSegment {
    suite: Option<String>,
    units: Vec<PlanUnit>,
}

impl PlanSegment {
    /// Returns the suite this segment runs, or `None` for pattern-resolved tests.
    pub fn suite(&self) -> Option<&str> {
        self.suite.as_deref()
    }

    /// Returns the units in execution order.
    pub fn units(&self) -> &[PlanUnit] {
        &self.units
    }

    fn to_summary(&self) -> PlanSegmentSummary {
        PlanSegmentSummary::new(
            self.suite.clone(),
            self.units.iter().map(PlanUnit::to_summary).collect(),
        )
    }
}

/// An ordered, deduplicated plan of executor invocations.
///
/// The plan owns the temporary work directory holding combined control files. The directory is
/// removed when the plan is dropped, or explicitly with [`cleanup`](Self::cleanup).
#[derive(Debug)]
pub struct ExecutionPlan {
    autotest_dir: Utf8PathBuf,
    work_dir: Utf8TempDir,
    segments: Vec<PlanSegment>,
}

impl ExecutionPlan {
    /// Returns the autotest directory the plan was resolved against.
    pub fn autotest_dir(&self) -> &Utf8Path {
        &self.autotest_dir
    }

    /// Returns the directory holding combined control files.
    pub fn work_dir(&self) -> &Utf8Path {
        self.work_dir.path()
    }

    /// Returns the segments in execution order.
    pub fn segments(&self) -> &[PlanSegment] {
        &self.segments
    }

    /// Returns every unit in execution order.
    pub fn units(&self) -> impl Iterator<Item = &PlanUnit> {
        self.segments.iter().flat_map(|segment| segment.units.iter())
    }

    /// Returns the number of units in one pass over the plan.
    pub fn unit_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.units.len()).sum()
    }

    /// Converts this plan into its serializable form.
    pub fn to_summary(&self) -> PlanSummary {
        PlanSummary::new(
            self.autotest_dir.clone(),
            self.segments.iter().map(PlanSegment::to_summary).collect(),
        )
    }

    /// Writes a human-readable description of the plan.
    pub fn write_human(&self, mut writer: impl io::Write, styles: &PlanStyles) -> io::Result<()> {
        for segment in &self.segments {
            match &segment.suite {
                Some(suite) => writeln!(writer, "suite {}:", suite.style(styles.heading))?,
                None => writeln!(writer, "{}:", "tests".style(styles.heading))?,
            }
            for unit in &segment.units {
                match unit {
                    PlanUnit::Standalone(control_file) => {
                        write!(
                            writer,
                            "    {} {}",
                            control_file.test_type().style(styles.test_type),
                            control_file.path()
                        )?;
                        if control_file.retry_count() > 0 {
                            write!(
                                writer,
                                " {}",
                                format!("(retries: {})", control_file.retry_count())
                                    .style(styles.retries)
                            )?;
                        }
                        writeln!(writer)?;
                    }
                    PlanUnit::Combined(combined) => {
                        writeln!(
                            writer,
                            "    {} {} {}",
                            combined.test_type().style(styles.test_type),
                            combined.path(),
                            format!("(combines {})", combined.constituents().len())
                                .style(styles.combined),
                        )?;
                        for control_file in combined.constituents() {
                            writeln!(writer, "        {}", control_file.path())?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes the work directory, logging a warning on failure.
    pub fn cleanup(self) {
        let path = self.work_dir.path().to_owned();
        if let Err(err) = self.work_dir.close() {
            warn!("failed to remove work directory {path}: {err}");
        }
    }
}

/// Styles for [`ExecutionPlan::write_human`].
#[derive(Clone, Debug, Default)]
pub struct PlanStyles {
    heading: Style,
    test_type: Style,
    retries: Style,
    combined: Style,
}

impl PlanStyles {
    /// Enables colors.
    pub fn colorize(&mut self) {
        self.heading = Style::new().bold();
        self.test_type = Style::new().cyan();
        self.retries = Style::new().yellow();
        self.combined = Style::new().green();
    }
}
