// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and records run progress.
//!
//! The main structure in this module is [`Reporter`].

mod aggregator;
mod displayer;
mod imp;

pub use aggregator::{JUNIT_FILE_NAME, SUMMARY_FILE_NAME};
pub use imp::*;
