// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;
use tokio::process::Child;

/// Kills the executor. Windows has no graceful equivalent of SIGTERM for console processes.
pub(super) async fn terminate_child(child: &mut Child, _grace_period: Duration) {
    _ = child.start_kill();
    _ = child.wait().await;
}
