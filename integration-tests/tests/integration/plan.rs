// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use autotest_metadata::{PlanUnitSummary, TestTypeSummary};
use autotest_runner::{
    combine::PlanUnit,
    control::TestType,
    errors::{ClassifyError, ResolveError},
};
use camino::Utf8PathBuf;
use color_eyre::eyre::{Result, bail, ensure};
use pretty_assertions::assert_eq;
use test_case::test_case;

#[test]
fn worked_example() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let plan = tree.plan(&["BootPerfServer", "suite:bvt"], true)?;

    let segments = plan.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].suite(), None);
    assert_eq!(segments[1].suite(), Some("bvt"));

    match segments[0].units() {
        [PlanUnit::Standalone(control_file)] => {
            assert_eq!(control_file.path(), tree.join(BOOT_PERF_SERVER));
            assert_eq!(control_file.test_type(), TestType::Server);
            assert_eq!(control_file.retry_count(), 0);
        }
        other => bail!("expected a single standalone unit, got {other:?}"),
    }

    let combined = match segments[1].units() {
        [PlanUnit::Combined(combined)] => combined,
        other => bail!("expected a single combined unit, got {other:?}"),
    };
    assert_eq!(combined.test_type(), TestType::Client);
    assert_eq!(
        combined
            .constituents()
            .iter()
            .map(|control_file| control_file.path().to_owned())
            .collect::<Vec<_>>(),
        BVT_TESTS.map(|test| tree.join(test)),
        "constituents are in suite order"
    );
    assert_eq!(
        combined.path(),
        plan.work_dir().join("combined_client_2/control")
    );

    let contents = fs_err::read_to_string(combined.path())?;
    ensure!(
        contents.starts_with("TEST_TYPE = \"client\"\n\ndef step_init():\n"),
        "combined control file header: {contents}"
    );
    for step in 1..=3 {
        ensure!(
            contents.contains(&format!("  job.next_step('step{step}')\n")),
            "step {step} is scheduled: {contents}"
        );
        ensure!(
            contents.contains(&format!("\ndef step{step}():\n")),
            "step {step} is defined: {contents}"
        );
    }
    ensure!(
        contents.contains("  job.run_test('platform_OSLimits')\n"),
        "bodies are indented: {contents}"
    );
    ensure!(
        !contents.contains("\ndef step4():"),
        "only three steps: {contents}"
    );

    Ok(())
}

#[test]
fn resolution_is_deterministic() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    tree.add_control("client/site_tests/a_Retried/control", "client", Some(3))?;
    let tokens = ["suite:bvt", "BootPerfServer", "a_Retried"];

    // Combined file paths live in a fresh work directory each time, so compare paths relative
    // to it.
    let normalized = || -> Result<Vec<Vec<PlanUnitSummary>>> {
        let plan = tree.plan(&tokens, true)?;
        let work_dir = plan.work_dir().to_owned();
        Ok(plan
            .to_summary()
            .segments
            .into_iter()
            .map(|segment| {
                segment
                    .units
                    .into_iter()
                    .map(|unit| match unit {
                        PlanUnitSummary::Combined {
                            path,
                            test_type,
                            constituents,
                        } => PlanUnitSummary::Combined {
                            path: path
                                .strip_prefix(&work_dir)
                                .map(ToOwned::to_owned)
                                .unwrap_or(path),
                            test_type,
                            constituents,
                        },
                        other => other,
                    })
                    .collect()
            })
            .collect())
    };

    let first = normalized()?;
    assert_eq!(first, normalized()?);

    // Patterns run first regardless of where they appear among the tokens.
    assert_eq!(
        first[0],
        vec![
            PlanUnitSummary::Standalone {
                path: tree.join(BOOT_PERF_SERVER),
                test_type: TestTypeSummary::Server,
                retries: 0,
            },
            PlanUnitSummary::Standalone {
                path: tree.join("client/site_tests/a_Retried/control"),
                test_type: TestTypeSummary::Client,
                retries: 3,
            },
        ],
        "mixed test types are never combined"
    );
    assert_eq!(
        first[1],
        vec![PlanUnitSummary::Combined {
            path: Utf8PathBuf::from("combined_client_2/control"),
            test_type: TestTypeSummary::Client,
            constituents: BVT_TESTS.iter().map(|test| tree.join(test)).collect(),
        }]
    );

    Ok(())
}

#[test]
fn retried_files_stay_standalone() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let flaky = tree.add_control("client/site_tests/network_Flaky/control", "client", Some(2))?;
    tree.add_suite(
        "flaky",
        &[
            BVT_TESTS[0],
            "client/site_tests/network_Flaky/control",
            BVT_TESTS[1],
        ],
    )?;

    let plan = tree.plan(&["suite:flaky"], true)?;
    let units = plan.segments()[0].units();
    assert_eq!(units.len(), 2);
    match &units[0] {
        PlanUnit::Combined(combined) => {
            assert_eq!(combined.constituents().len(), 2);
            assert!(
                combined
                    .constituents()
                    .iter()
                    .all(|control_file| control_file.retry_count() == 0)
            );
        }
        other => bail!("expected the combined unit first, got {other:?}"),
    }
    assert!(matches!(units[1], PlanUnit::Standalone(_)));
    assert_eq!(units[1].path(), flaky);
    assert_eq!(units[1].retry_count(), 2);

    Ok(())
}

#[test]
fn no_combine_runs_everything_standalone() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let plan = tree.plan(&["BootPerfServer", "suite:bvt"], false)?;

    assert_eq!(plan.unit_count(), 4);
    assert!(
        plan.units()
            .all(|unit| matches!(unit, PlanUnit::Standalone(_)))
    );
    assert!(
        fs_err::read_dir(plan.work_dir())?.next().is_none(),
        "nothing is written to the work directory"
    );
    Ok(())
}

#[test]
fn single_zero_retry_file_is_not_combined() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    tree.add_suite("tiny", &[BVT_TESTS[0]])?;

    let plan = tree.plan(&["suite:tiny"], true)?;
    match plan.segments()[0].units() {
        [PlanUnit::Standalone(control_file)] => {
            assert_eq!(control_file.path(), tree.join(BVT_TESTS[0]));
        }
        other => bail!("expected a single standalone unit, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_suite_fails_resolution() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    match tree.resolve_err(&["BootPerfServer", "suite:nonexistent"])? {
        ResolveError::SuiteEnumeration(err) => {
            assert_eq!(err.suite, "nonexistent");
            assert_eq!(err.exit_code, Some(1));
        }
        other => bail!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn missing_test_type_fails_resolution() -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let path = tree.add_raw(
        "client/site_tests/broken_NoType/control",
        "NAME = 'broken_NoType'\njob.run_test('broken_NoType')\n",
    )?;

    match tree.resolve_err(&["suite:bvt", "broken_NoType"])? {
        ResolveError::Classify(ClassifyError::MissingTestType { path: err_path }) => {
            assert_eq!(err_path, path);
        }
        other => bail!("unexpected error: {other}"),
    }
    Ok(())
}

#[test_case(&["network_Missing"], "cannot find a control file" ; "no match")]
#[test_case(&["platform_"], "is ambiguous, it matches 2 control files" ; "ambiguous")]
#[test_case(&["login_Cryptohome("], "not a valid regular expression" ; "invalid regex")]
fn pattern_errors(tokens: &[&str], expected: &str) -> Result<()> {
    let tree = AutotestTree::worked_example()?;
    let message = tree.resolve_err(tokens)?.to_string();
    ensure!(
        message.contains(expected),
        "expected `{expected}` in `{message}`"
    );
    Ok(())
}
