// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the machine-readable output of `run-remote-tests`.
//!
//! `run-remote-tests list --message-format json` emits a [`PlanSummary`], and every run writes a
//! [`RunSummary`] to `results.json` under its results directory. Exit codes are documented in
//! [`RemoteTestsExitCode`].

mod exit_codes;
mod plan_summary;
mod run_summary;

pub use exit_codes::*;
pub use plan_summary::*;
pub use run_summary::*;
