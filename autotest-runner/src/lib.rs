// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `run-remote-tests`.
//!
//! Test requests (patterns and `suite:` names) are resolved against an autotest tree into
//! classified control files, compatible files are combined, and the resulting
//! [`ExecutionPlan`](plan::ExecutionPlan) is handed to an autoserv-compatible executor one unit
//! at a time. The stages are:
//!
//! 1. [`pattern`]: resolve patterns to single control files.
//! 2. [`suite`]: list the control files of a suite.
//! 3. [`control`]: read each control file's test type and retry count.
//! 4. [`combine`]: merge zero-retry control files of one type into a combined control file.
//!
//! [`plan`] drives these stages, [`runner`] executes the result and [`reporter`] displays and
//! records it.

pub mod combine;
pub mod config;
pub mod control;
pub mod errors;
pub mod fanout;
pub mod pattern;
pub mod plan;
pub mod reporter;
pub mod request;
pub mod runner;
pub mod signal;
pub mod suite;
