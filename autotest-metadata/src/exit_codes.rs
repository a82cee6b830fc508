// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `run-remote-tests` failures.
///
/// `run-remote-tests` invocations may fail for a variety of reasons. This structure documents the
/// exit codes that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum RemoteTestsExitCode {}

impl RemoteTestsExitCode {
    /// No errors occurred and every executed unit passed.
    pub const OK: i32 = 0;

    /// One or more units failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The run was interrupted by a signal before the plan completed.
    pub const TEST_RUN_CANCELLED: i32 = 101;

    /// A test request could not be resolved to control files: a pattern matched nothing or
    /// matched more than one file, a suite could not be enumerated, or a control file could not
    /// be classified.
    pub const RESOLUTION_FAILED: i32 = 104;

    /// The test executor could not be started. Unlike test failures, this aborts the run.
    pub const EXECUTOR_FAILED: i32 = 105;

    /// Writing data to stdout, stderr or the results directory produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a `run-remote-tests` invocation.
    pub const SETUP_ERROR: i32 = 96;
}
