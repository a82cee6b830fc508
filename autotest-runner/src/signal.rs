// Copyright (c) The run-remote-tests Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown signals during a run.
//!
//! A shutdown signal stops the run: the running executor is terminated and no further units are
//! started. The plan's work directory is still removed afterwards.

use crate::errors::SignalHandlerSetupError;
use tokio::sync::mpsc;

/// The kind of signal handling to set up for a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SignalHandlerKind {
    /// Listen for interrupts, and on Unix for SIGHUP and SIGTERM as well.
    Standard,

    /// Never report a signal. Useful for tests.
    Noop,
}

impl SignalHandlerKind {
    pub(crate) fn build(self) -> Result<SignalHandler, SignalHandlerSetupError> {
        match self {
            Self::Standard => SignalHandler::standard(),
            Self::Noop => Ok(SignalHandler { events: None }),
        }
    }
}

/// Receives shutdown events forwarded by one listener task per signal.
#[derive(Debug)]
pub(crate) struct SignalHandler {
    events: Option<mpsc::UnboundedReceiver<ShutdownEvent>>,
}

impl SignalHandler {
    /// Must be called from within a tokio runtime.
    fn standard() -> Result<Self, SignalHandlerSetupError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        for event in ShutdownEvent::ALL {
            let mut listener = os::Listener::new(event)?;
            let sender = sender.clone();
            tokio::spawn(async move {
                while listener.recv().await.is_some() {
                    if sender.send(event).is_err() {
                        break;
                    }
                }
            });
        }
        Ok(Self {
            events: Some(receiver),
        })
    }

    /// Waits for the next shutdown event. Never completes for a no-op handler.
    pub(crate) async fn recv(&mut self) -> ShutdownEvent {
        if let Some(events) = &mut self.events
            && let Some(event) = events.recv().await
        {
            return event;
        }
        std::future::pending().await
    }
}

#[cfg(unix)]
mod os {
    use super::ShutdownEvent;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    pub(super) struct Listener(Signal);

    impl Listener {
        pub(super) fn new(event: ShutdownEvent) -> std::io::Result<Self> {
            let kind = match event {
                ShutdownEvent::Hangup => SignalKind::hangup(),
                ShutdownEvent::Term => SignalKind::terminate(),
                ShutdownEvent::Interrupt => SignalKind::interrupt(),
            };
            signal(kind).map(Self)
        }

        pub(super) async fn recv(&mut self) -> Option<()> {
            self.0.recv().await
        }
    }
}

#[cfg(windows)]
mod os {
    use super::ShutdownEvent;
    use tokio::signal::windows::{CtrlC, ctrl_c};

    pub(super) struct Listener(CtrlC);

    impl Listener {
        pub(super) fn new(event: ShutdownEvent) -> std::io::Result<Self> {
            match event {
                ShutdownEvent::Interrupt => ctrl_c().map(Self),
            }
        }

        pub(super) async fn recv(&mut self) -> Option<()> {
            self.0.recv().await
        }
    }
}

/// A signal that stops the run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    /// SIGHUP.
    #[cfg(unix)]
    Hangup,

    /// SIGTERM.
    #[cfg(unix)]
    Term,

    /// SIGINT, or Ctrl-C on Windows.
    Interrupt,
}

impl ShutdownEvent {
    #[cfg(unix)]
    const ALL: [Self; 3] = [Self::Interrupt, Self::Hangup, Self::Term];
    #[cfg(windows)]
    const ALL: [Self; 1] = [Self::Interrupt];

    /// Returns a short description of the signal.
    pub fn description(self) -> &'static str {
        match self {
            #[cfg(unix)]
            Self::Hangup => "SIGHUP",
            #[cfg(unix)]
            Self::Term => "SIGTERM",
            Self::Interrupt => "interrupt",
        }
    }
}
