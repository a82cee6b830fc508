// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combining compatible control files into a single job.
//!
//! Every executor invocation packages and ships autotest to the device under test, so running
//! many small control files one at a time is slow. Control files of the same type with no
//! retries are instead wrapped into one synthesized control file, with each original body
//! becoming a numbered step.
//!
//! Combining follows these rules:
//!
//! * A candidate set mixing client and server control files is never combined.
//! * Control files with a nonzero retry count always run on their own, so a retried test never
//!   shares fate with a combined job.
//! * At least two zero-retry control files are needed to produce a combined file.

use crate::{
    control::{ControlFile, TestType, results_name_for},
    errors::CombineError,
};
use autotest_metadata::PlanUnitSummary;
use camino::{Utf8Path, Utf8PathBuf};
use swrite::{SWrite, swriteln};
use tracing::debug;

/// Indentation applied to each line of an embedded control file body.
const BODY_INDENT: &str = "  ";

/// A synthesized control file running several control files as one job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CombinedControlFile {
    path: Utf8PathBuf,
    test_type: TestType,
    constituents: Vec<ControlFile>,
}

impl CombinedControlFile {
    pub(crate) fn new(
        path: impl Into<Utf8PathBuf>,
        test_type: TestType,
        constituents: Vec<ControlFile>,
    ) -> Self {
        Self {
            path: path.into(),
            test_type,
            constituents,
        }
    }

    /// Returns the path to the synthesized control file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the test type shared by every constituent.
    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    /// Returns the constituent control files, in step order.
    pub fn constituents(&self) -> &[ControlFile] {
        &self.constituents
    }
}

/// A unit of execution: one executor invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlanUnit {
    /// A control file run on its own.
    Standalone(ControlFile),

    /// A combined control file.
    Combined(CombinedControlFile),
}

impl PlanUnit {
    /// Returns the control file passed to the executor.
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Standalone(control_file) => control_file.path(),
            Self::Combined(combined) => combined.path(),
        }
    }

    /// Returns the test type.
    pub fn test_type(&self) -> TestType {
        match self {
            Self::Standalone(control_file) => control_file.test_type(),
            Self::Combined(combined) => combined.test_type(),
        }
    }

    /// Returns the retry count passed to the executor. Combined units are never retried.
    pub fn retry_count(&self) -> u32 {
        match self {
            Self::Standalone(control_file) => control_file.retry_count(),
            Self::Combined(_) => 0,
        }
    }

    /// Returns the name of this unit's results directory.
    pub fn results_name(&self) -> String {
        results_name_for(self.path())
    }

    /// Converts this unit into its serializable form.
    pub fn to_summary(&self) -> PlanUnitSummary {
        match self {
            Self::Standalone(control_file) => PlanUnitSummary::Standalone {
                path: control_file.path().to_owned(),
                test_type: control_file.test_type().to_summary(),
                retries: control_file.retry_count(),
            },
            Self::Combined(combined) => PlanUnitSummary::Combined {
                path: combined.path.clone(),
                test_type: combined.test_type.to_summary(),
                constituents: combined
                    .constituents
                    .iter()
                    .map(|control_file| control_file.path().to_owned())
                    .collect(),
            },
        }
    }
}

/// How a candidate set of control files is split between a combined job and standalone runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CombinePartition<'a> {
    /// The files to combine, if there are at least two of them.
    pub combined: Option<(TestType, Vec<&'a ControlFile>)>,

    /// The files to run on their own, in discovery order.
    pub standalone: Vec<&'a ControlFile>,
}

/// Decides which of `files` to combine.
pub fn partition(files: &[ControlFile]) -> CombinePartition<'_> {
    let all_standalone = || CombinePartition {
        combined: None,
        standalone: files.iter().collect(),
    };

    let Some(first) = files.first() else {
        return all_standalone();
    };
    let test_type = first.test_type();
    if files.iter().any(|file| file.test_type() != test_type) {
        debug!("not combining: candidate set mixes client and server control files");
        return all_standalone();
    }

    let zero_retry_count = files.iter().filter(|file| file.retry_count() == 0).count();
    if zero_retry_count < 2 {
        return all_standalone();
    }

    let (combined, standalone): (Vec<_>, Vec<_>) =
        files.iter().partition(|file| file.retry_count() == 0);
    CombinePartition {
        combined: Some((test_type, combined)),
        standalone,
    }
}

/// Renders the text of a combined control file from the constituent bodies, in step order.
///
/// Client files advance through steps with `job.next_step`, one step per driver iteration.
/// Server files call each step in turn from `step_init`.
pub fn render_combined<'a>(
    test_type: TestType,
    bodies: impl IntoIterator<Item = &'a str>,
) -> String {
    let bodies: Vec<_> = bodies.into_iter().collect();
    let mut out = String::new();
    swriteln!(out, "TEST_TYPE = \"{test_type}\"");

    match test_type {
        TestType::Client => {
            out.push('\n');
            swriteln!(out, "def step_init():");
            for step in 1..=bodies.len() {
                swriteln!(out, "{BODY_INDENT}job.next_step('step{step}')");
            }
            write_steps(&mut out, &bodies);
        }
        TestType::Server => {
            write_steps(&mut out, &bodies);
            out.push('\n');
            swriteln!(out, "def step_init():");
            for step in 1..=bodies.len() {
                swriteln!(out, "{BODY_INDENT}step{step}()");
            }
            out.push('\n');
            swriteln!(out, "step_init()");
        }
    }

    out
}

fn write_steps(out: &mut String, bodies: &[&str]) {
    for (index, body) in bodies.iter().enumerate() {
        out.push('\n');
        swriteln!(out, "def step{}():", index + 1);
        write_indented(out, body);
    }
}

fn write_indented(out: &mut String, body: &str) {
    let mut wrote_statement = false;
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push('\n');
        } else {
            swriteln!(out, "{BODY_INDENT}{line}");
            wrote_statement |= !trimmed.starts_with('#');
        }
    }
    // A function body needs at least one statement.
    if !wrote_statement {
        swriteln!(out, "{BODY_INDENT}pass");
    }
}

/// Combines `files` into an ordered list of units, writing a combined control file under
/// `out_dir` if any files are combined.
///
/// The combined file is written to `<out_dir>/combined_<type>_<seq>/control`, so that its
/// results directory is named `combined_<type>_<seq>`. The combined unit, if any, comes first,
/// followed by standalone units in discovery order.
pub fn combine(
    files: &[ControlFile],
    out_dir: &Utf8Path,
    seq: usize,
) -> Result<Vec<PlanUnit>, CombineError> {
    let split = partition(files);
    let mut units = Vec::with_capacity(files.len());

    if let Some((test_type, constituents)) = split.combined {
        let bodies = constituents
            .iter()
            .map(|control_file| {
                fs_err::read_to_string(control_file.path()).map_err(|err| {
                    CombineError::ReadConstituent {
                        path: control_file.path().to_owned(),
                        err,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let contents = render_combined(test_type, bodies.iter().map(String::as_str));

        let dir = out_dir.join(format!("combined_{test_type}_{seq}"));
        let path = dir.join("control");
        fs_err::create_dir_all(&dir)
            .and_then(|()| fs_err::write(&path, contents))
            .map_err(|err| CombineError::Write {
                path: path.clone(),
                err,
            })?;
        debug!(
            "combined {} {test_type} control files into {path}",
            constituents.len()
        );

        units.push(PlanUnit::Combined(CombinedControlFile::new(
            path,
            test_type,
            constituents.into_iter().cloned().collect(),
        )));
    }

    units.extend(split.standalone.into_iter().cloned().map(PlanUnit::Standalone));
    Ok(units)
}

/// Returns every file as a standalone unit, without combining anything.
pub fn uncombined(files: &[ControlFile]) -> Vec<PlanUnit> {
    files.iter().cloned().map(PlanUnit::Standalone).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn client(name: &str, retries: u32) -> ControlFile {
        ControlFile::new(
            format!("/autotest/client/site_tests/{name}/control"),
            TestType::Client,
            retries,
        )
    }

    fn server(name: &str, retries: u32) -> ControlFile {
        ControlFile::new(
            format!("/autotest/server/site_tests/{name}/control"),
            TestType::Server,
            retries,
        )
    }

    #[test]
    fn mixed_types_never_combine() {
        let files = vec![client("a", 0), server("b", 0), client("c", 0)];
        let split = partition(&files);
        assert_eq!(split.combined, None);
        assert_eq!(split.standalone, files.iter().collect::<Vec<_>>());
    }

    #[test]
    fn single_zero_retry_file_runs_standalone() {
        let files = vec![client("a", 0)];
        let split = partition(&files);
        assert_eq!(split.combined, None);
        assert_eq!(split.standalone, vec![&files[0]]);

        // A single zero-retry file alongside retried files is also not combined.
        let files = vec![client("a", 2), client("b", 0), client("c", 1)];
        let split = partition(&files);
        assert_eq!(split.combined, None);
        assert_eq!(split.standalone, files.iter().collect::<Vec<_>>());
    }

    #[test]
    fn retried_files_are_isolated() {
        let files = vec![
            client("a", 0),
            client("flaky", 3),
            client("b", 0),
            client("c", 0),
            client("also_flaky", 1),
        ];
        let split = partition(&files);

        let (test_type, combined) = split.combined.expect("zero-retry files combined");
        assert_eq!(test_type, TestType::Client);
        assert_eq!(combined, vec![&files[0], &files[2], &files[3]]);
        assert!(combined.iter().all(|file| file.retry_count() == 0));
        assert_eq!(split.standalone, vec![&files[1], &files[4]]);
    }

    #[test]
    fn empty_set() {
        let split = partition(&[]);
        assert_eq!(split.combined, None);
        assert!(split.standalone.is_empty());
    }

    #[test]
    fn render_client() {
        let rendered = render_combined(
            TestType::Client,
            [
                "TEST_TYPE = 'client'\njob.run_test('login_Cryptohome')\n",
                "job.run_test('platform_Bar',\n             iterations=2)\n\nx = 1\n",
            ],
        );
        assert_eq!(
            rendered,
            indoc! {r#"
                TEST_TYPE = "client"

                def step_init():
                  job.next_step('step1')
                  job.next_step('step2')

                def step1():
                  TEST_TYPE = 'client'
                  job.run_test('login_Cryptohome')

                def step2():
                  job.run_test('platform_Bar',
                               iterations=2)

                  x = 1
            "#}
        );
    }

    #[test]
    fn render_server() {
        let rendered = render_combined(
            TestType::Server,
            ["job.run_test('a', host=host)\n", "# nothing but a comment\n", ""],
        );
        assert_eq!(
            rendered,
            indoc! {r#"
                TEST_TYPE = "server"

                def step1():
                  job.run_test('a', host=host)

                def step2():
                  # nothing but a comment
                  pass

                def step3():
                  pass

                def step_init():
                  step1()
                  step2()
                  step3()

                step_init()
            "#}
        );
    }

    #[test]
    fn combine_writes_file_first() {
        let tree = Utf8TempDir::new().unwrap();
        let write = |name: &str, retries: u32| {
            let dir = tree.path().join(name);
            fs_err::create_dir_all(&dir).unwrap();
            let path = dir.join("control");
            fs_err::write(
                &path,
                format!("TEST_TYPE = 'client'\nRETRIES = {retries}\njob.run_test('{name}')\n"),
            )
            .unwrap();
            ControlFile::new(path, TestType::Client, retries)
        };
        let files = vec![write("a", 0), write("flaky", 2), write("b", 0)];

        let out = Utf8TempDir::new().unwrap();
        let units = combine(&files, out.path(), 1).unwrap();

        assert_eq!(units.len(), 2);
        let PlanUnit::Combined(combined) = &units[0] else {
            panic!("first unit should be combined: {units:?}");
        };
        assert_eq!(combined.path(), out.path().join("combined_client_1/control"));
        assert_eq!(combined.constituents(), [files[0].clone(), files[2].clone()]);
        assert_eq!(units[0].results_name(), "combined_client_1");
        assert_eq!(units[0].retry_count(), 0);

        let contents = fs_err::read_to_string(combined.path()).unwrap();
        assert!(contents.contains("  job.run_test('a')"), "{contents}");
        assert!(contents.contains("  job.run_test('b')"), "{contents}");
        assert!(!contents.contains("flaky"), "{contents}");

        assert_eq!(units[1], PlanUnit::Standalone(files[1].clone()));
        assert_eq!(units[1].retry_count(), 2);
    }

    #[test]
    fn combine_without_candidates_writes_nothing() {
        let out = Utf8TempDir::new().unwrap();
        let files = vec![client("a", 0), server("b", 0)];
        let units = combine(&files, out.path(), 1).unwrap();
        assert_eq!(units, uncombined(&files));
        assert_eq!(fs_err::read_dir(out.path()).unwrap().count(), 0);
    }
}
