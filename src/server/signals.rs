// Shutdown signal handling for the research server

use crate::error::{DelveError, Result};
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};

/// Waits for any of SIGTERM, SIGINT or SIGHUP
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
    sighup: TokioSignal,
}

impl SignalHandler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigterm: install(SignalKind::terminate(), "SIGTERM")?,
            sigint: install(SignalKind::interrupt(), "SIGINT")?,
            sighup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Resolve with the name of the first shutdown signal received
    pub async fn wait(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sighup.recv() => "SIGHUP",
        };
        tracing::info!("Received {}", name);
        name
    }
}

fn install(kind: SignalKind, name: &str) -> Result<TokioSignal> {
    signal(kind).map_err(|e| DelveError::Io {
        source: e,
        context: format!("Failed to setup {} handler", name),
    })
}
