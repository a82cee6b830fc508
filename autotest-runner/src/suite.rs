// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enumerating the control files that make up a suite.
//!
//! Suites are defined by the autotest tree and listed by an external program. This module only
//! runs that program and collects the paths it prints; classification happens afterwards, the
//! same way as for pattern-resolved control files.

use crate::{config::resolve_program, errors::SuiteEnumerationError};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// Lists the control files of a suite.
pub trait SuiteEnumerator {
    /// Returns the control files of `suite` in the autotest tree at `autotest_dir`.
    fn enumerate(
        &self,
        suite: &str,
        autotest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, SuiteEnumerationError>;
}

/// A suite enumerator backed by an external program.
///
/// The program is invoked as `<program> --autotest_dir=<dir> <suite>` and is expected to print
/// one control file path per line. Relative paths are resolved against the autotest directory.
#[derive(Clone, Debug)]
pub struct ExternalSuiteEnumerator {
    program: Utf8PathBuf,
}

impl ExternalSuiteEnumerator {
    /// Creates a new enumerator running `program`.
    ///
    /// A relative `program` containing a path separator is resolved against the autotest
    /// directory at enumeration time; a bare name is looked up in `PATH`.
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the program this enumerator runs.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    fn resolved_program(&self, autotest_dir: &Utf8Path) -> Utf8PathBuf {
        resolve_program(autotest_dir, &self.program)
    }
}

impl SuiteEnumerator for ExternalSuiteEnumerator {
    fn enumerate(
        &self,
        suite: &str,
        autotest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, SuiteEnumerationError> {
        let program = self.resolved_program(autotest_dir);
        let args = vec![format!("--autotest_dir={autotest_dir}"), suite.to_owned()];
        let command_line =
            || std::iter::once(program.as_str()).chain(args.iter().map(String::as_str));

        debug!("enumerating suite {suite}: {}", shell_words::join(command_line()));
        let output = duct::cmd(program.as_std_path(), &args)
            .stdout_capture()
            .unchecked()
            .run()
            .map_err(|err| SuiteEnumerationError::exec_failed(suite, command_line(), err))?;
        if !output.status.success() {
            return Err(SuiteEnumerationError::command_failed(
                suite,
                command_line(),
                output.status.code(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_enumerator_output(&stdout, autotest_dir))
    }
}

/// Parses the newline-separated output of a suite enumerator.
pub(crate) fn parse_enumerator_output(output: &str, autotest_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let path = Utf8Path::new(line);
            if path.is_absolute() {
                path.to_owned()
            } else {
                autotest_dir.join(path)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_output() {
        let output = indoc! {"
            client/site_tests/login_Cryptohome/control

            /abs/client/site_tests/desktopui_Foo/control.bvt
              client/site_tests/platform_Bar/control
        "};
        assert_eq!(
            parse_enumerator_output(output, Utf8Path::new("/autotest")),
            vec![
                Utf8PathBuf::from("/autotest/client/site_tests/login_Cryptohome/control"),
                Utf8PathBuf::from("/abs/client/site_tests/desktopui_Foo/control.bvt"),
                Utf8PathBuf::from("/autotest/client/site_tests/platform_Bar/control"),
            ]
        );
    }

    #[test]
    fn program_resolution() {
        let autotest_dir = Utf8Path::new("/autotest");
        assert_eq!(
            ExternalSuiteEnumerator::new("site_utils/suite_enumerator.py")
                .resolved_program(autotest_dir),
            "/autotest/site_utils/suite_enumerator.py"
        );
        assert_eq!(
            ExternalSuiteEnumerator::new("suite_enumerator").resolved_program(autotest_dir),
            "suite_enumerator"
        );
        assert_eq!(
            ExternalSuiteEnumerator::new("/usr/bin/enum").resolved_program(autotest_dir),
            "/usr/bin/enum"
        );
    }

    #[test]
    fn missing_program() {
        let enumerator = ExternalSuiteEnumerator::new("/nonexistent/suite_enumerator");
        let err = enumerator
            .enumerate("bvt", Utf8Path::new("/autotest"))
            .unwrap_err();
        assert_eq!(err.suite, "bvt");
        assert!(err.err.is_some(), "spawn failure carries the io error");
    }
}
