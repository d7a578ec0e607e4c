//! Graceful-shutdown signal handling.
//!
//! Grounded directly on this corpus's own `Terminate` future, which
//! multiplexes SIGINT and SIGTERM into a single pollable event so the
//! event loop's `select!` treats "either signal fired" as one branch.

use anyhow::Result;
use std::future::poll_fn;
use std::task::{Context, Poll};
use tokio::signal::unix::{signal, Signal, SignalKind};

pub struct Terminate {
    sigint: Signal,
    sigterm: Signal,
}

impl Terminate {
    pub fn new() -> Result<Self> {
        let sigint = signal(SignalKind::interrupt())?;
        let sigterm = signal(SignalKind::terminate())?;
        Ok(Self { sigint, sigterm })
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if self.sigint.poll_recv(cx).is_ready() {
            Poll::Ready(())
        } else if self.sigterm.poll_recv(cx).is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    /// Resolves on the first SIGINT or SIGTERM received.
    pub async fn recv(&mut self) {
        poll_fn(|cx| self.poll_recv(cx)).await
    }
}
