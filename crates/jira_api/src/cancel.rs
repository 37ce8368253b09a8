//! Cooperative cancellation shared between a caller and in-flight requests.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::{JiraError, Result};

/// Checked at network boundaries and inside decode loops.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Returns [`JiraError::Canceled`] once the token has been tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(JiraError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the token is canceled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }

    /// Drives `future` to completion unless the token is canceled first.
    pub async fn run<F>(&self, future: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(JiraError::Canceled),
            output = future => Ok(output),
        }
    }
}
