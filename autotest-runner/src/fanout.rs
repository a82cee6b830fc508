// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running tests on several VMs in parallel.
//!
//! Each test gets its own invocation of a per-VM runner (`cros_run_vm_test` by default), which
//! boots a private copy of the VM image and runs the test against it. Runners listen on
//! localhost SSH ports allocated incrementally from a base port.

use crate::errors::FanoutError;
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::NamedUtf8TempFile;
use std::{
    io::{self, Seek, SeekFrom, Write},
    process::{ExitStatus, Stdio},
};
use tokio::task::JoinHandle;
use tracing::info;

/// What happens to the output of each job.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputMode {
    /// Jobs share the terminal, so their output is interleaved.
    Interleaved,

    /// Each job's output is buffered in a temporary file and replayed once the job finishes,
    /// in job order.
    Ordered,

    /// Output is discarded. Results are still written to each job's results directory.
    Quiet,
}

/// Options for a parallel fan-out.
#[derive(Clone, Debug)]
pub struct FanoutRunnerBuilder {
    runner: Utf8PathBuf,
    base_ssh_port: u16,
    board: Option<String>,
    image_path: Option<Utf8PathBuf>,
    results_dir_root: Option<Utf8PathBuf>,
    order_output: bool,
    quiet: bool,
}

impl FanoutRunnerBuilder {
    /// Creates a new builder invoking `runner` for each test, with SSH ports allocated from
    /// `base_ssh_port`.
    pub fn new(runner: impl Into<Utf8PathBuf>, base_ssh_port: u16) -> Self {
        Self {
            runner: runner.into(),
            base_ssh_port,
            board: None,
            image_path: None,
            results_dir_root: None,
            order_output: false,
            quiet: false,
        }
    }

    /// Sets the target board.
    pub fn set_board(&mut self, board: impl Into<String>) -> &mut Self {
        self.board = Some(board.into());
        self
    }

    /// Sets the VM image to boot.
    pub fn set_image_path(&mut self, image_path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.image_path = Some(image_path.into());
        self
    }

    /// Sets the results directory root. Each job writes results to `<root>/<test>.<port>`.
    pub fn set_results_dir_root(
        &mut self,
        results_dir_root: impl Into<Utf8PathBuf>,
    ) -> &mut Self {
        self.results_dir_root = Some(results_dir_root.into());
        self
    }

    /// Buffers each job's output and prints it once the job finishes.
    pub fn set_order_output(&mut self, order_output: bool) -> &mut Self {
        self.order_output = order_output;
        self
    }

    /// Discards job output. Overrides [`set_order_output`](Self::set_order_output), and
    /// requires a results directory root.
    pub fn set_quiet(&mut self, quiet: bool) -> &mut Self {
        self.quiet = quiet;
        self
    }

    /// Returns the output mode implied by the current options.
    pub fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else if self.order_output {
            OutputMode::Ordered
        } else {
            OutputMode::Interleaved
        }
    }

    /// Validates options and lays out one job per test.
    pub fn build(&self, tests: Vec<String>) -> Result<FanoutRunner, FanoutError> {
        if tests.is_empty() {
            return Err(FanoutError::NoTests);
        }
        if self.quiet && self.results_dir_root.is_none() {
            return Err(FanoutError::QuietWithoutResultsDir);
        }
        let last_port = usize::from(self.base_ssh_port) + tests.len() - 1;
        if last_port > usize::from(u16::MAX) {
            return Err(FanoutError::PortRange {
                base: self.base_ssh_port,
                count: tests.len(),
            });
        }

        let output_mode = self.output_mode();
        let jobs = tests
            .into_iter()
            .enumerate()
            .map(|(index, test)| {
                // Checked against the port range above.
                let ssh_port = self.base_ssh_port + index as u16;
                self.make_job(test, ssh_port, output_mode)
            })
            .collect();

        Ok(FanoutRunner {
            runner: self.runner.clone(),
            output_mode,
            jobs,
        })
    }

    fn make_job(&self, test: String, ssh_port: u16, output_mode: OutputMode) -> FanoutJob {
        let mut args = vec![
            // The image is shared, so don't modify it.
            "--copy".to_owned(),
            "--no_graphics".to_owned(),
            "--use_emerged".to_owned(),
            "--verbose=1".to_owned(),
            format!("--ssh_port={ssh_port}"),
        ];
        if let Some(board) = &self.board {
            args.push(format!("--board={board}"));
        }
        if let Some(image_path) = &self.image_path {
            args.push(format!("--image_path={image_path}"));
        }
        let results_dir = self
            .results_dir_root
            .as_ref()
            .map(|root| root.join(format!("{test}.{ssh_port}")));
        if let Some(results_dir) = &results_dir {
            args.push(format!("--results_dir_root={results_dir}"));
        }
        args.push(test.clone());
        if output_mode == OutputMode::Quiet {
            args.push("--verbose=0".to_owned());
        }

        FanoutJob {
            test,
            ssh_port,
            results_dir,
            args,
        }
    }
}

/// One test, run on its own VM.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FanoutJob {
    test: String,
    ssh_port: u16,
    results_dir: Option<Utf8PathBuf>,
    args: Vec<String>,
}

impl FanoutJob {
    /// Returns the test this job runs.
    pub fn test(&self) -> &str {
        &self.test
    }

    /// Returns the SSH port allocated to this job's VM.
    pub fn ssh_port(&self) -> u16 {
        self.ssh_port
    }

    /// Returns the results directory, if a results root was specified.
    pub fn results_dir(&self) -> Option<&Utf8Path> {
        self.results_dir.as_deref()
    }

    /// Returns the arguments passed to the runner.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Runs fan-out jobs concurrently.
#[derive(Clone, Debug)]
pub struct FanoutRunner {
    runner: Utf8PathBuf,
    output_mode: OutputMode,
    jobs: Vec<FanoutJob>,
}

impl FanoutRunner {
    /// Returns the jobs, in the order their tests were given.
    pub fn jobs(&self) -> &[FanoutJob] {
        &self.jobs
    }

    /// Returns the output mode.
    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Starts every job, then waits for all of them to finish.
    ///
    /// Buffered output is replayed to `writer` in job order. Jobs that exit unsuccessfully are
    /// reported in the returned outcome; errors are only returned for failures to run jobs.
    pub fn run(&self, writer: impl Write) -> Result<FanoutOutcome, FanoutError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("run-remote-tests-fanout")
            .build()
            .map_err(FanoutError::RuntimeCreate)?;
        runtime.block_on(self.run_impl(writer))
    }

    async fn run_impl(&self, mut writer: impl Write) -> Result<FanoutOutcome, FanoutError> {
        let mut spawned = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            spawned.push(self.spawn_job(job)?);
        }

        let mut failed = Vec::new();
        for SpawnedJob {
            job,
            handle,
            output,
        } in spawned
        {
            let status = handle
                .await
                .map_err(io::Error::other)
                .and_then(|res| res)
                .map_err(|err| FanoutError::Wait {
                    test: job.test.clone(),
                    err,
                })?;
            if !status.success() {
                failed.push(job.test.clone());
            }

            if let Some(mut output) = output {
                info!("------ START {}:{} ------", job.test, output.path());
                replay(output.as_file_mut(), &mut writer).map_err(|err| FanoutError::Replay {
                    test: job.test.clone(),
                    err,
                })?;
                info!("------ END {}:{} ------", job.test, output.path());
            }
        }

        Ok(FanoutOutcome { failed })
    }

    fn spawn_job<'a>(&self, job: &'a FanoutJob) -> Result<SpawnedJob<'a>, FanoutError> {
        let mut cmd = tokio::process::Command::new(&self.runner);
        cmd.args(&job.args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match self.output_mode {
            OutputMode::Interleaved => None,
            OutputMode::Quiet => {
                if let Some(results_dir) = &job.results_dir {
                    info!("log files for {} are in {results_dir}", job.test);
                }
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
                None
            }
            OutputMode::Ordered => {
                let output_err = |err| FanoutError::OutputCreate {
                    test: job.test.clone(),
                    err,
                };
                let file = camino_tempfile::Builder::new()
                    .prefix("parallel_vm_test_")
                    .tempfile()
                    .map_err(output_err)?;
                let stdout = file.as_file().try_clone().map_err(output_err)?;
                let stderr = file.as_file().try_clone().map_err(output_err)?;
                info!("piping output of {} to {}", job.test, file.path());
                cmd.stdout(stdout).stderr(stderr);
                Some(file)
            }
        };

        let command = shell_words::join(
            std::iter::once(self.runner.as_str()).chain(job.args.iter().map(String::as_str)),
        );
        info!("running {command}");
        let mut child = cmd
            .spawn()
            .map_err(|err| FanoutError::Spawn { command, err })?;
        let handle = tokio::spawn(async move { child.wait().await });

        Ok(SpawnedJob {
            job,
            handle,
            output,
        })
    }
}

struct SpawnedJob<'a> {
    job: &'a FanoutJob,
    handle: JoinHandle<io::Result<ExitStatus>>,
    output: Option<NamedUtf8TempFile>,
}

fn replay(file: &mut std::fs::File, mut writer: impl Write) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    io::copy(file, &mut writer)?;
    writer.flush()
}

/// The result of a fan-out.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FanoutOutcome {
    failed: Vec<String>,
}

impl FanoutOutcome {
    /// Returns the tests whose runners exited unsuccessfully, in job order.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Returns true if every job succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
