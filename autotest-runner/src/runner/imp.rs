// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{TestExecutor, os};
use crate::{
    combine::PlanUnit,
    control::TestType,
    errors::{RunnerError, TestRunnerExecuteError},
    plan::ExecutionPlan,
    signal::{ShutdownEvent, SignalHandler, SignalHandlerKind},
};
use autotest_metadata::{RunSummary, UnitOutcomeSummary};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset, Local};
use std::{
    convert::Infallible,
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};
use swrite::{SWrite, swrite};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// How long the executor is given to exit after SIGTERM before it's killed.
const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Test runner options.
#[derive(Clone, Debug)]
pub struct TestRunnerBuilder {
    iterations: u32,
}

impl Default for TestRunnerBuilder {
    fn default() -> Self {
        Self { iterations: 1 }
    }
}

impl TestRunnerBuilder {
    /// Sets the number of passes over the plan. Values below 1 are treated as 1.
    pub fn set_iterations(&mut self, iterations: u32) -> &mut Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Creates a new test runner.
    pub fn build<'a>(
        &self,
        plan: &'a ExecutionPlan,
        executor: TestExecutor,
        results_root: impl Into<Utf8PathBuf>,
        signal_handler: SignalHandlerKind,
    ) -> Result<TestRunner<'a>, RunnerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("run-remote-tests-runner")
            .build()
            .map_err(RunnerError::RuntimeCreate)?;
        let _guard = runtime.enter();

        // The signal handler must be set up within the runtime.
        let signal_handler = signal_handler.build()?;

        Ok(TestRunner {
            inner: TestRunnerInner {
                plan,
                executor,
                results_root: results_root.into(),
                iterations: self.iterations,
            },
            signal_handler,
            runtime,
        })
    }
}

/// Executes the units of an [`ExecutionPlan`], one at a time.
pub struct TestRunner<'a> {
    inner: TestRunnerInner<'a>,
    signal_handler: SignalHandler,
    runtime: Runtime,
}

impl<'a> TestRunner<'a> {
    /// Returns the results directory for `unit` in `iteration`.
    pub fn results_dir(&self, unit: &PlanUnit, iteration: u32) -> Utf8PathBuf {
        self.inner.results_dir(unit, iteration)
    }

    /// Executes the plan, calling `callback` as events happen.
    ///
    /// Test failures are recorded in the returned [`RunStats`]. An error is only returned if
    /// the executor couldn't be run at all.
    pub fn execute<F>(self, mut callback: F) -> Result<RunStats, RunnerError>
    where
        F: FnMut(RunEvent<'a>),
    {
        self.try_execute::<Infallible, _>(|event| {
            callback(event);
            Ok(())
        })
        .map_err(|err| match err {
            TestRunnerExecuteError::Runner(err) => err,
            TestRunnerExecuteError::Report(never) => match never {},
        })
    }

    /// Executes the plan, calling a fallible `callback` as events happen.
    ///
    /// If the callback returns an error, the run stops after the current unit and the error
    /// is returned.
    pub fn try_execute<E, F>(self, mut callback: F) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(RunEvent<'a>) -> Result<(), E>,
    {
        let Self {
            inner,
            mut signal_handler,
            runtime,
        } = self;
        let stats = runtime.block_on(inner.execute(&mut signal_handler, &mut callback));

        // Child processes are all reaped by now.
        runtime.shutdown_background();
        stats
    }
}

struct TestRunnerInner<'a> {
    plan: &'a ExecutionPlan,
    executor: TestExecutor,
    results_root: Utf8PathBuf,
    iterations: u32,
}

impl<'a> TestRunnerInner<'a> {
    fn results_dir(&self, unit: &PlanUnit, iteration: u32) -> Utf8PathBuf {
        let mut name = unit.results_name();
        if self.iterations > 1 {
            swrite!(name, ".{iteration}");
        }
        self.results_root.join(name)
    }

    async fn execute<E, F>(
        &self,
        signal_handler: &mut SignalHandler,
        callback: &mut F,
    ) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(RunEvent<'a>) -> Result<(), E>,
    {
        fs_err::create_dir_all(&self.results_root).map_err(|err| {
            RunnerError::ResultsDirCreate {
                path: self.results_root.clone(),
                err,
            }
        })?;

        let plan = self.plan;
        let mut stats = RunStats::default();
        callback(RunEvent::RunStarted {
            unit_count: plan.unit_count(),
            iterations: self.iterations,
            results_root: self.results_root.clone(),
        })
        .map_err(TestRunnerExecuteError::Report)?;

        'run: for iteration in 1..=self.iterations {
            for segment in plan.segments() {
                for unit in segment.units() {
                    let results_dir = self.results_dir(unit, iteration);
                    let command = self.executor.command_line(unit, &results_dir);
                    callback(RunEvent::UnitStarted {
                        suite: segment.suite(),
                        unit,
                        iteration,
                        results_dir: results_dir.clone(),
                        command: command.clone(),
                    })
                    .map_err(TestRunnerExecuteError::Report)?;

                    match self
                        .run_unit(unit, &results_dir, &command, signal_handler)
                        .await?
                    {
                        UnitResult::Finished {
                            status,
                            start_time,
                            time_taken,
                        } => {
                            let outcome = UnitOutcome {
                                name: results_dir.file_name().unwrap_or_default().to_owned(),
                                control_file: unit.path().to_owned(),
                                test_type: unit.test_type(),
                                iteration,
                                exit_code: status.code(),
                                passed: status.success(),
                                results_dir,
                                start_time,
                                time_taken,
                            };
                            stats.record(outcome.clone());
                            callback(RunEvent::UnitFinished {
                                suite: segment.suite(),
                                unit,
                                outcome,
                            })
                            .map_err(TestRunnerExecuteError::Report)?;
                        }
                        UnitResult::Interrupted(event) => {
                            stats.cancelled = Some(event);
                            callback(RunEvent::RunCancelled { event })
                                .map_err(TestRunnerExecuteError::Report)?;
                            break 'run;
                        }
                    }
                }
            }
        }

        callback(RunEvent::RunFinished {
            stats: stats.clone(),
        })
        .map_err(TestRunnerExecuteError::Report)?;
        Ok(stats)
    }

    async fn run_unit(
        &self,
        unit: &PlanUnit,
        results_dir: &Utf8Path,
        command: &str,
        signal_handler: &mut SignalHandler,
    ) -> Result<UnitResult, RunnerError> {
        let mut cmd = tokio::process::Command::new(self.executor.program());
        cmd.args(self.executor.command_args(unit, results_dir))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let start_time = Local::now().fixed_offset();
        let stopwatch = Instant::now();
        debug!("running `{command}`");
        let mut child = cmd.spawn().map_err(|err| RunnerError::ExecutorSpawn {
            command: command.to_owned(),
            err,
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|err| RunnerError::ExecutorWait {
                    command: command.to_owned(),
                    err,
                })?;
                Ok(UnitResult::Finished {
                    status,
                    start_time,
                    time_taken: stopwatch.elapsed(),
                })
            }
            event = signal_handler.recv() => {
                warn!("received {}, stopping the executor", event.description());
                os::terminate_child(&mut child, TERMINATE_GRACE_PERIOD).await;
                Ok(UnitResult::Interrupted(event))
            }
        }
    }
}

enum UnitResult {
    Finished {
        status: ExitStatus,
        start_time: DateTime<FixedOffset>,
        time_taken: Duration,
    },
    Interrupted(ShutdownEvent),
}

/// An event that occurred during a run.
#[derive(Clone, Debug)]
pub enum RunEvent<'a> {
    /// The run started.
    RunStarted {
        /// The number of units in one pass over the plan.
        unit_count: usize,

        /// The number of passes.
        iterations: u32,

        /// The directory results are written under.
        results_root: Utf8PathBuf,
    },

    /// The executor was started for a unit.
    UnitStarted {
        /// The suite the unit belongs to, or `None` for tests named by pattern.
        suite: Option<&'a str>,

        /// The unit.
        unit: &'a PlanUnit,

        /// The 1-based iteration.
        iteration: u32,

        /// The results directory passed to the executor.
        results_dir: Utf8PathBuf,

        /// The executor command line.
        command: String,
    },

    /// The executor exited for a unit.
    UnitFinished {
        /// The suite the unit belongs to, or `None` for tests named by pattern.
        suite: Option<&'a str>,

        /// The unit.
        unit: &'a PlanUnit,

        /// What happened.
        outcome: UnitOutcome,
    },

    /// A signal was received and the run stopped early.
    RunCancelled {
        /// The signal.
        event: ShutdownEvent,
    },

    /// The run finished, whether or not it was cancelled.
    RunFinished {
        /// Statistics for the run.
        stats: RunStats,
    },
}

/// The outcome of executing one unit once.
#[derive(Clone, Debug)]
pub struct UnitOutcome {
    /// The name of the results directory.
    pub name: String,

    /// The control file that was executed.
    pub control_file: Utf8PathBuf,

    /// The unit's test type.
    pub test_type: TestType,

    /// The 1-based iteration.
    pub iteration: u32,

    /// The exit code, or `None` if the executor was terminated by a signal.
    pub exit_code: Option<i32>,

    /// Whether the executor exited successfully.
    pub passed: bool,

    /// The results directory.
    pub results_dir: Utf8PathBuf,

    /// When the executor was started.
    pub start_time: DateTime<FixedOffset>,

    /// How long the executor ran.
    pub time_taken: Duration,
}

impl UnitOutcome {
    /// Converts this outcome into its serializable form.
    pub fn to_summary(&self) -> UnitOutcomeSummary {
        UnitOutcomeSummary::new(
            self.name.clone(),
            self.control_file.clone(),
            self.test_type.to_summary(),
            self.iteration,
            self.exit_code,
            self.time_taken.as_secs_f64(),
        )
    }
}

/// Statistics for a run.
#[derive(Clone, Debug, Default)]
pub struct RunStats {
    /// The number of unit executions that passed.
    pub passed: usize,

    /// The number of unit executions that failed.
    pub failed: usize,

    /// The signal that stopped the run, if any.
    pub cancelled: Option<ShutdownEvent>,

    /// Every outcome, in execution order.
    pub outcomes: Vec<UnitOutcome>,
}

impl RunStats {
    /// Returns true if every unit passed and the run wasn't cancelled.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled.is_none()
    }

    /// Returns the outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }

    /// Converts these statistics into a serializable summary.
    pub fn to_summary(&self, remote: &str, iterations: u32) -> RunSummary {
        RunSummary::new(
            remote,
            iterations,
            self.cancelled.is_some(),
            self.outcomes.iter().map(UnitOutcome::to_summary).collect(),
        )
    }

    fn record(&mut self, outcome: UnitOutcome) {
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}
