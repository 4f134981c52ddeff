// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::types::FileEvent;

use super::Engine;

/// Apply everything currently queued, without waiting.
///
/// Handling an event may register new watches, whose initial batches land
/// on the same channel; those are applied too. Returns the number of events
/// applied.
pub fn drain_pending(engine: &Engine, event_rx: &mut mpsc::UnboundedReceiver<FileEvent>) -> usize {
    let mut applied = 0;
    while let Ok(event) = event_rx.try_recv() {
        debug!(?event, "applying queued event");
        engine.handle_event(&event);
        applied += 1;
    }
    applied
}

/// Feeds monitor notifications into an [`Engine`] strictly in delivery
/// order.
///
/// After each burst (the channel is momentarily empty) the settle callback
/// runs with the engine, so callers can re-resolve whatever they care about.
pub struct Runtime {
    engine: Arc<Engine>,
    event_rx: mpsc::UnboundedReceiver<FileEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(engine: Arc<Engine>, event_rx: mpsc::UnboundedReceiver<FileEvent>) -> Self {
        Self { engine, event_rx }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Main event loop.
    ///
    /// - Waits for the next notification (or Ctrl-C).
    /// - Applies it plus everything queued behind it.
    /// - Calls `on_settle` once the burst is applied.
    ///
    /// Exits when the channel closes or Ctrl-C is received.
    pub async fn run<F>(mut self, mut on_settle: F) -> Result<()>
    where
        F: FnMut(&Engine),
    {
        info!("groupspool runtime started");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            let event = tokio::select! {
                event = self.event_rx.recv() => event,
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
            };
            let Some(event) = event else {
                info!("event channel closed; exiting");
                break;
            };

            debug!(?event, "runtime received event");
            self.engine.handle_event(&event);
            let applied = 1 + drain_pending(&self.engine, &mut self.event_rx);
            debug!(applied, "burst applied");

            on_settle(&self.engine);
        }

        info!("runtime exiting");
        Ok(())
    }
}
