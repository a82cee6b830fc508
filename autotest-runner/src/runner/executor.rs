// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::combine::PlanUnit;
use camino::{Utf8Path, Utf8PathBuf};

/// The program that executes one control file against the target host.
///
/// The command line follows autoserv's conventions:
///
/// ```text
/// <program> -m <remote> [--ssh-port <port>] (-c|-s) -r <results_dir>
///           --test-retry=<n> [--args <test args>] [extra args...] <control>
/// ```
#[derive(Clone, Debug)]
pub struct TestExecutor {
    program: Utf8PathBuf,
    remote: String,
    ssh_port: Option<u16>,
    test_args: Option<String>,
    extra_args: Vec<String>,
}

impl TestExecutor {
    /// Creates a new executor running `program` against `remote`.
    pub fn new(program: impl Into<Utf8PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            remote: remote.into(),
            ssh_port: None,
            test_args: None,
            extra_args: Vec::new(),
        }
    }

    /// Sets the SSH port to connect to.
    pub fn set_ssh_port(&mut self, ssh_port: u16) -> &mut Self {
        self.ssh_port = Some(ssh_port);
        self
    }

    /// Sets the arguments passed through to each test with `--args`.
    pub fn set_test_args(&mut self, test_args: impl Into<String>) -> &mut Self {
        self.test_args = Some(test_args.into());
        self
    }

    /// Adds arguments passed to the executor verbatim, before the control file.
    pub fn extend_extra_args(
        &mut self,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the program.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Returns the target host.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Returns the arguments to run `unit`, writing results to `results_dir`.
    pub fn command_args(&self, unit: &PlanUnit, results_dir: &Utf8Path) -> Vec<String> {
        let mut args = vec!["-m".to_owned(), self.remote.clone()];
        if let Some(port) = self.ssh_port {
            args.push("--ssh-port".to_owned());
            args.push(port.to_string());
        }
        args.push(unit.test_type().executor_flag().to_owned());
        args.push("-r".to_owned());
        args.push(results_dir.to_string());
        args.push(format!("--test-retry={}", unit.retry_count()));
        if let Some(test_args) = &self.test_args {
            args.push("--args".to_owned());
            args.push(test_args.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(unit.path().to_string());
        args
    }

    /// Returns the full command line for `unit`, quoted for display.
    pub fn command_line(&self, unit: &PlanUnit, results_dir: &Utf8Path) -> String {
        let args = self.command_args(unit, results_dir);
        shell_words::join(
            std::iter::once(self.program.as_str()).chain(args.iter().map(String::as_str)),
        )
    }
}
