use super::orchestrator::PIPELINE;
use super::{AuthscanOrchestrator, ComponentState, ScanReport, ShutdownReason};
use crate::error::Result;
use crate::pipeline::SessionEnd;
use crate::session::ResultView;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

impl AuthscanOrchestrator {
    /// Run one scan session and consume its result
    pub async fn run(&mut self) -> Result<ScanReport> {
        info!("Authscan session starting");

        let signal_handlers = if self.handle_signals {
            self.setup_signal_handlers()
        } else {
            Vec::new()
        };

        self.set_component_state(PIPELINE, ComponentState::Running);
        let result = self
            .pipeline
            .run(&self.context, self.cancellation_token.clone())
            .await;

        for handler in signal_handlers {
            handler.abort();
        }

        let end = match result {
            Ok(end) => end,
            Err(e) => {
                self.set_component_state(PIPELINE, ComponentState::Failed);
                error!("Scan session failed: {}", e);
                return Err(e);
            }
        };
        self.set_component_state(PIPELINE, ComponentState::Stopped);

        let published = match end {
            SessionEnd::Published(published) => Some(published),
            SessionEnd::Stopped => None,
        };
        let page = ResultView::consume(&self.context);
        let shutdown = self.shutdown_reason.lock().take();
        if let Some(reason) = &shutdown {
            info!("Session torn down: {:?}", reason);
        }

        info!("Authscan session complete: {}", page);
        Ok(ScanReport {
            page,
            published,
            shutdown,
        })
    }

    /// Tear down the running session. The first reason wins.
    pub fn shutdown(&self, reason: ShutdownReason) {
        request_shutdown(&self.shutdown_reason, &self.cancellation_token, reason);
        self.set_component_state(PIPELINE, ComponentState::Stopping);
    }

    /// Set up signal handlers that cancel the session
    fn setup_signal_handlers(&self) -> Vec<JoinHandle<()>> {
        let mut handlers = Vec::new();

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let reason = Arc::clone(&self.shutdown_reason);
            let token = self.cancellation_token.clone();
            handlers.push(tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    request_shutdown(&reason, &token, ShutdownReason::Signal("SIGTERM".to_string()));
                }
            }));
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let reason = Arc::clone(&self.shutdown_reason);
        let token = self.cancellation_token.clone();
        handlers.push(tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                request_shutdown(&reason, &token, ShutdownReason::Signal("SIGINT".to_string()));
            }
        }));

        handlers
    }
}

fn request_shutdown(
    slot: &Mutex<Option<ShutdownReason>>,
    token: &CancellationToken,
    reason: ShutdownReason,
) {
    {
        let mut slot = slot.lock();
        if slot.is_none() {
            *slot = Some(reason);
        }
    }
    token.cancel();
}
