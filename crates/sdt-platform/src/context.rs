//! Call Context
//!
//! Cancellable execution context handed to every service entry point. Each
//! outstanding sub-call is raced against cancellation and the optional
//! deadline; the losing sub-call future is dropped, which aborts it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct CallContext {
    cancelled: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Owner side of a cancellable [`CallContext`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CallContext {
    /// Never cancelled, no deadline
    pub fn background() -> Self {
        Self {
            cancelled: None,
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: None,
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancelled: Some(rx),
            deadline: None,
        };
        (ctx, CancelHandle { tx })
    }

    /// Same cancellation source, tighter of the two deadlines.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancelled: self.cancelled.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let flagged = self.cancelled.as_ref().map(|rx| *rx.borrow()).unwrap_or(false);
        let expired = self.deadline.map(|d| Instant::now() >= d).unwrap_or(false);
        flagged || expired
    }

    /// Drive `fut` unless the context fires first.
    pub async fn run<F>(&self, op: &'static str, fut: F) -> Result<F::Output, ServiceError>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(ServiceError::Cancelled { op });
        }

        tokio::select! {
            out = fut => Ok(out),
            _ = self.wait_cancelled() => Err(ServiceError::Cancelled { op }),
            _ = self.wait_deadline() => Err(ServiceError::Cancelled { op }),
        }
    }

    async fn wait_cancelled(&self) {
        let Some(rx) = self.cancelled.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // Dropped handle means nobody can cancel any more
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    async fn wait_deadline(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}
