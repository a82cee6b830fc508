// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for suite_enumerator.py, used by integration tests.
//!
//! Invoked as `fake-suite-enumerator --autotest_dir=<dir> <suite>`, it prints the contents of
//! `<dir>/suites/<suite>.list`, and fails if that file doesn't exist.

use std::{env, process::exit};

fn main() {
    let mut autotest_dir = None;
    let mut suite = None;
    for arg in env::args().skip(1) {
        match arg.strip_prefix("--autotest_dir=") {
            Some(dir) => autotest_dir = Some(dir.to_owned()),
            None => suite = Some(arg),
        }
    }

    let (Some(autotest_dir), Some(suite)) = (autotest_dir, suite) else {
        eprintln!("usage: fake-suite-enumerator --autotest_dir=<dir> <suite>");
        exit(2);
    };

    let list = format!("{autotest_dir}/suites/{suite}.list");
    match fs_err::read_to_string(&list) {
        Ok(contents) => print!("{contents}"),
        Err(err) => {
            eprintln!("[fake-suite-enumerator] unknown suite {suite} ({list}: {err})");
            exit(1);
        }
    }
}
