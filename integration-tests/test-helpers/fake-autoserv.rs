// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for autoserv, used by integration tests.
//!
//! If passed `--fake-log=<path>`, each invocation appends its other arguments, quoted as a
//! single line, to that file. The control file is copied into the results directory. It exits
//! with code 1 if the control file contains `# fake-autoserv: fail`.

use std::{env, io::Write, process::exit};

const FAIL_MARKER: &str = "# fake-autoserv: fail";

fn main() {
    let mut log = None;
    let args: Vec<String> = env::args()
        .skip(1)
        .filter(|arg| match arg.strip_prefix("--fake-log=") {
            Some(path) => {
                log = Some(path.to_owned());
                false
            }
            None => true,
        })
        .collect();

    if let Some(log) = log {
        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log)
            .unwrap_or_else(|err| die(&format!("failed to open log {log}: {err}")));
        writeln!(file, "{}", shell_words::join(&args))
            .unwrap_or_else(|err| die(&format!("failed to write log {log}: {err}")));
    }

    let Some(control) = args.last() else {
        die("no control file specified");
    };
    let contents = fs_err::read_to_string(control)
        .unwrap_or_else(|err| die(&format!("failed to read {control}: {err}")));

    if let Some(results_dir) = args
        .iter()
        .position(|arg| arg == "-r")
        .and_then(|index| args.get(index + 1))
    {
        fs_err::create_dir_all(results_dir)
            .and_then(|()| fs_err::write(format!("{results_dir}/control"), &contents))
            .unwrap_or_else(|err| {
                die(&format!("failed to write results to {results_dir}: {err}"))
            });
    }

    if contents.contains(FAIL_MARKER) {
        eprintln!("[fake-autoserv] {control} failed");
        exit(1);
    }
    eprintln!("[fake-autoserv] {control} passed");
}

fn die(message: &str) -> ! {
    eprintln!("[fake-autoserv] {message}");
    exit(2);
}
