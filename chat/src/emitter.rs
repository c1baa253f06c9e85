//! Debounced delivery of incremental content to a UI sink.
//!
//! Streamed deltas can arrive far faster than a UI wants to repaint. The
//! emitter coalesces a burst of pushes into one sink invocation carrying the
//! concatenated content; the flush timer starts at the first unflushed push
//! of a window and is not reset by later pushes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Coalesces rapid content pushes into throttled sink invocations.
pub struct DebouncedEmitter {
    tx: mpsc::UnboundedSender<String>,
    worker: JoinHandle<()>,
}

impl DebouncedEmitter {
    /// Wrap `sink` with a debounce window of `delay`.
    pub fn new<F>(delay: Duration, mut sink: F) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let worker = tokio::spawn(async move {
            // Outer loop: each iteration is one debounce window, opened by
            // the first push after an idle period.
            while let Some(first) = rx.recv().await {
                let mut accumulated = first;
                let deadline = tokio::time::Instant::now() + delay;

                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        next = rx.recv() => match next {
                            Some(content) => accumulated.push_str(&content),
                            None => {
                                // Emitter dropped: flush the remainder and
                                // stop.
                                sink(accumulated);
                                return;
                            }
                        },
                    }
                }

                debug!("Flushing {} debounced bytes", accumulated.len());
                sink(accumulated);
            }
        });

        Self { tx, worker }
    }

    /// Accumulate `content` into the current window.
    pub fn push(&self, content: impl Into<String>) {
        // The worker only stops once the sender is dropped, so this send
        // cannot fail while `self` is alive.
        let _ = self.tx.send(content.into());
    }

    /// Drop the input side and wait for the final flush.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.worker.await;
    }
}
