//! Cancellation for the whole invocation
//!
//! One token is handed to every blocking operation. It is cancelled on
//! Ctrl-C or when the optional --timeout deadline passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Interrupt {
    token: CancellationToken,
    timed_out: Arc<AtomicBool>,
}

impl Interrupt {
    /// Start watching for Ctrl-C and the deadline
    pub fn install(timeout: Option<Duration>) -> Self {
        let token = CancellationToken::new();
        let timed_out = Arc::new(AtomicBool::new(false));

        let ctrl_c = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = ctrl_c.cancelled() => {}
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        tracing::warn!("Interrupted, cancelling");
                        ctrl_c.cancel();
                    }
                }
            }
        });

        if let Some(timeout) = timeout {
            let deadline = token.clone();
            let flag = timed_out.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = deadline.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        flag.store(true, Ordering::SeqCst);
                        tracing::warn!(
                            "Deadline of {} reached, cancelling",
                            humantime::format_duration(timeout)
                        );
                        deadline.cancel();
                    }
                }
            });
        }

        Self { token, timed_out }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether cancellation came from the deadline
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }
}
