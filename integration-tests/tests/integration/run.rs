// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use autotest_metadata::{RunSummary, TestTypeSummary};
use autotest_runner::{
    errors::RunnerError,
    reporter::{JUNIT_FILE_NAME, ReporterBuilder, ReporterStderr, SUMMARY_FILE_NAME},
    runner::{RunEvent, RunStats, TestExecutor, TestRunnerBuilder},
    signal::SignalHandlerKind,
};
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, bail, ensure};
use pretty_assertions::assert_eq;

const REMOTE: &str = "127.0.0.1";

fn run(
    tree: &AutotestTree,
    tokens: &[&str],
    executor: TestExecutor,
    iterations: u32,
    results_root: &Utf8Path,
) -> Result<RunStats> {
    let plan = tree.plan(tokens, true)?;
    let runner = TestRunnerBuilder::default()
        .set_iterations(iterations)
        .build(&plan, executor, results_root, SignalHandlerKind::Noop)?;
    Ok(runner.execute(|_| {})?)
}

#[test]
fn worked_example_invocations() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let autoserv = FakeAutoserv::new()?;
    let results = Utf8TempDir::new()?;

    let stats = run(
        &tree,
        &["BootPerfServer", "suite:bvt"],
        autoserv.executor(REMOTE),
        1,
        results.path(),
    )?;
    assert!(stats.is_success());
    assert_eq!((stats.passed, stats.failed), (2, 0));

    let invocations = autoserv.invocations()?;
    assert_eq!(invocations.len(), 2);

    let server = &invocations[0];
    assert_eq!(flag_value(server, "-m"), Some(REMOTE));
    ensure!(server.contains(&"-s".to_owned()), "server flag: {server:?}");
    assert_eq!(
        flag_value(server, "-r"),
        Some(results.path().join("platform_BootPerfServer").as_str())
    );
    ensure!(
        server.contains(&"--test-retry=0".to_owned()),
        "retry count: {server:?}"
    );
    assert_eq!(
        server.last().map(String::as_str),
        Some(tree.join(BOOT_PERF_SERVER).as_str())
    );

    let client = &invocations[1];
    ensure!(client.contains(&"-c".to_owned()), "client flag: {client:?}");
    assert_eq!(
        flag_value(client, "-r"),
        Some(results.path().join("combined_client_2").as_str())
    );
    ensure!(
        client.contains(&"--test-retry=0".to_owned()),
        "combined files are never retried: {client:?}"
    );

    // The fake executor copies the control file it was given into the results directory.
    let combined = fs_err::read_to_string(results.path().join("combined_client_2/control"))?;
    ensure!(
        combined.contains("job.next_step('step3')"),
        "the combined control file was executed: {combined}"
    );

    Ok(())
}

#[test]
fn failures_do_not_stop_the_run() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    tree.add_raw(
        BOOT_PERF_SERVER,
        "TEST_TYPE = 'server'\n# fake-autoserv: fail\njob.run_test('platform_BootPerfServer')\n",
    )?;
    let autoserv = FakeAutoserv::new()?;
    let results = Utf8TempDir::new()?;

    let stats = run(
        &tree,
        &["BootPerfServer", "suite:bvt"],
        autoserv.executor(REMOTE),
        1,
        results.path(),
    )?;
    assert!(!stats.is_success());
    assert_eq!((stats.passed, stats.failed), (1, 1));
    assert_eq!(autoserv.invocations()?.len(), 2, "the suite still ran");

    let failures: Vec<_> = stats.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "platform_BootPerfServer");
    assert_eq!(failures[0].exit_code, Some(1));
    Ok(())
}

#[test]
fn iterations_get_separate_results_dirs() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let autoserv = FakeAutoserv::new()?;
    let results = Utf8TempDir::new()?;

    let stats = run(
        &tree,
        &["BootPerfServer"],
        autoserv.executor(REMOTE),
        2,
        results.path(),
    )?;
    assert_eq!(stats.passed, 2);

    let dirs: Vec<_> = autoserv
        .invocations()?
        .iter()
        .filter_map(|args| flag_value(args, "-r").map(ToOwned::to_owned))
        .collect();
    assert_eq!(
        dirs,
        vec![
            results.path().join("platform_BootPerfServer.1").into_string(),
            results.path().join("platform_BootPerfServer.2").into_string(),
        ]
    );
    Ok(())
}

#[test]
fn retries_are_passed_to_standalone_runs() -> Result<()> {
    let tree = AutotestTree::new()?;
    tree.add_control("client/site_tests/network_Flaky/control", "client", Some(2))?;
    let autoserv = FakeAutoserv::new()?;
    let results = Utf8TempDir::new()?;

    let mut executor = autoserv.executor(REMOTE);
    executor
        .set_ssh_port(9222)
        .set_test_args("iterations=5 quick");
    run(&tree, &["network_Flaky"], executor, 1, results.path())?;

    let invocations = autoserv.invocations()?;
    let [args] = invocations.as_slice() else {
        bail!("expected one invocation, got {invocations:?}");
    };
    ensure!(
        args.contains(&"--test-retry=2".to_owned()),
        "retry count: {args:?}"
    );
    assert_eq!(flag_value(args, "--ssh-port"), Some("9222"));
    assert_eq!(flag_value(args, "--args"), Some("iterations=5 quick"));
    Ok(())
}

#[test]
fn missing_executor_is_an_error() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let results = Utf8TempDir::new()?;
    let executor = TestExecutor::new(tree.join("no-such-autoserv"), REMOTE);

    let plan = tree.plan(&["BootPerfServer"], true)?;
    let runner = TestRunnerBuilder::default().build(
        &plan,
        executor,
        results.path(),
        SignalHandlerKind::Noop,
    )?;
    match runner.execute(|_| {}) {
        Err(RunnerError::ExecutorSpawn { command, .. }) => {
            ensure!(command.contains("no-such-autoserv"), "command: {command}");
        }
        other => bail!("expected a spawn error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn reporter_writes_summary() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let autoserv = FakeAutoserv::new()?;
    let results = Utf8TempDir::new()?;

    let plan = tree.plan(&["BootPerfServer", "suite:bvt"], true)?;
    let runner = TestRunnerBuilder::default().build(
        &plan,
        autoserv.executor(REMOTE),
        results.path(),
        SignalHandlerKind::Noop,
    )?;

    let mut output = Vec::new();
    let mut started = 0;
    {
        let mut reporter = ReporterBuilder::default()
            .set_write_summary(true)
            .build(REMOTE, ReporterStderr::Buffer(&mut output));
        runner.try_execute(|event| {
            if matches!(event, RunEvent::UnitStarted { .. }) {
                started += 1;
            }
            reporter.report_event(event)
        })?;
    }
    assert_eq!(started, 2);

    let output = String::from_utf8(output)?;
    ensure!(output.contains("PASS"), "output: {output}");
    ensure!(output.contains("combined_client_2 (suite bvt)"), "output: {output}");
    ensure!(
        output.contains("2 units run: 2 passed"),
        "output: {output}"
    );

    let summary =
        RunSummary::parse_json(fs_err::read_to_string(results.path().join(SUMMARY_FILE_NAME))?)?;
    assert_eq!(summary.remote, REMOTE);
    assert_eq!((summary.passed, summary.failed), (2, 0));
    assert_eq!(summary.units[1].name, "combined_client_2");
    assert_eq!(summary.units[1].test_type, TestTypeSummary::Client);

    let junit = fs_err::read_to_string(results.path().join(JUNIT_FILE_NAME))?;
    ensure!(junit.contains("combined_client_2"), "junit: {junit}");
    Ok(())
}

#[cfg(unix)]
#[test]
fn interrupt_cancels_the_run() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let tree = AutotestTree::worked_example()?;
    let results = Utf8TempDir::new()?;

    // Interrupts the runner, then waits to be terminated.
    let script = tree.join("interrupting-autoserv");
    fs_err::write(&script, "#!/bin/sh\nkill -INT $PPID\nexec sleep 30\n")?;
    fs_err::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;

    let plan = tree.plan(&["BootPerfServer", "suite:bvt"], true)?;
    let work_dir = plan.work_dir().to_owned();
    assert_eq!(plan.unit_count(), 2);

    let runner = TestRunnerBuilder::default().build(
        &plan,
        TestExecutor::new(script.clone(), REMOTE),
        results.path(),
        SignalHandlerKind::Standard,
    )?;
    let mut started = 0;
    let mut cancelled = false;
    let stats = runner.execute(|event| match event {
        RunEvent::UnitStarted { .. } => started += 1,
        RunEvent::RunCancelled { .. } => cancelled = true,
        _ => {}
    })?;

    assert_eq!(started, 1, "no unit starts after the interrupt");
    ensure!(cancelled, "a cancellation event was reported");
    ensure!(stats.cancelled.is_some(), "stats: {stats:?}");
    assert_eq!(stats.failed, 0, "the interrupted unit isn't counted as a failure");
    ensure!(!stats.is_success());

    plan.cleanup();
    ensure!(!work_dir.exists(), "work directory {work_dir} was removed");
    Ok(())
}
