// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs autotest control files and suites against a remote Chrome OS device.
//!
//! Tests are named by regular expressions matched against the control file tree, or by suite
//! with `suite:<name>`. Compatible control files are combined into a single job to save on
//! per-job setup costs.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
