//! Session cancellation tokens.
//!
//! Each polling session owns exactly one [`CancellationTokenSource`]. The
//! scheduling loop holds a [`CancellationToken`] clone and races every delay
//! against [`CancellationToken::cancelled`], so a cancelled session can never
//! fire another check.
//!
//! # Example
//!
//! ```
//! use idv_runtime::cancellation::CancellationTokenSource;
//!
//! let source = CancellationTokenSource::new();
//! let token = source.token();
//!
//! assert!(!token.is_cancelled());
//! source.cancel();
//! assert!(token.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable handle observing a session's cancellation state.
///
/// All clones share the same state; cancelling the owning source is seen by
/// every clone.
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Returns true if the owning source has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Completes once the token is cancelled.
    ///
    /// Returns immediately if cancellation already happened. Intended for use
    /// inside `tokio::select!`:
    ///
    /// ```ignore
    /// tokio::select! {
    ///     _ = token.cancelled() => return,
    ///     _ = tokio::time::sleep(delay) => {}
    /// }
    /// ```
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a cancel between
            // the check and the await is not lost.
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Owner of a cancellation token.
///
/// Not `Clone`: exactly one owner may cancel a session.
#[derive(Debug)]
pub struct CancellationTokenSource {
    token: CancellationToken,
}

impl CancellationTokenSource {
    /// Creates a new source with a fresh, non-cancelled token.
    pub fn new() -> Self {
        Self {
            token: CancellationToken {
                state: Arc::new(TokenState::default()),
            },
        }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the token and wakes every waiter.
    ///
    /// Idempotent. Returns true only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        let first = !self.token.state.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.token.state.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}
