// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;
use tokio::process::Child;
use tracing::debug;

/// Asks the executor to exit with SIGTERM, then kills it if it's still around after
/// `grace_period`.
pub(super) async fn terminate_child(child: &mut Child, grace_period: Duration) {
    let Some(pid) = child.id() else {
        // The child exited already -- don't send a signal.
        return;
    };

    // SAFETY: the pid belongs to a child we haven't reaped yet.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };

    tokio::select! {
        _ = child.wait() => {}
        () = tokio::time::sleep(grace_period) => {
            debug!("executor (pid {pid}) didn't exit after SIGTERM, killing it");
            // start_kill sends SIGKILL.
            _ = child.start_kill();
            _ = child.wait().await;
        }
    }
}
