// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`], which hands each unit of an
//! [`ExecutionPlan`](crate::plan::ExecutionPlan) to the test executor, one at a time.

mod executor;
mod imp;

#[cfg(unix)]
#[path = "unix.rs"]
mod os;

#[cfg(windows)]
#[path = "windows.rs"]
mod os;

pub use executor::*;
pub use imp::*;
