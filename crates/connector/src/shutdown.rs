//! Double-signal shutdown: the first signal (SIGINT or SIGTERM) triggers
//! an orderly shutdown; a second signal of either kind forces an
//! immediate exit.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

#[derive(Debug)]
pub struct ShutdownController {
    forced: AtomicU8,
}

#[derive(Debug, Clone, Copy)]
pub enum ShutdownEvent {
    Graceful,
    Immediate,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            forced: AtomicU8::new(0),
        }
    }

    fn bump_forced(&self) -> u8 {
        self.forced.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns one task per signal source; either source bumps the same
/// counter, so a SIGINT followed by a SIGTERM (or vice versa) counts as
/// the "second signal" that forces exit.
pub fn spawn_signal_handlers(shutdown: Arc<ShutdownController>, shutdown_tx: mpsc::UnboundedSender<ShutdownEvent>) {
    let int_shutdown = shutdown.clone();
    let int_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            report(&int_shutdown, &int_tx);
        }
    });

    tokio::spawn(async move {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => return,
        };
        loop {
            if term.recv().await.is_none() {
                return;
            }
            report(&shutdown, &shutdown_tx);
        }
    });
}

fn report(shutdown: &ShutdownController, tx: &mpsc::UnboundedSender<ShutdownEvent>) {
    let n = shutdown.bump_forced();
    if n == 1 {
        let _ = tx.send(ShutdownEvent::Graceful);
    } else {
        let _ = tx.send(ShutdownEvent::Immediate);
    }
}
