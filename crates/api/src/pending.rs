//! Pending results
//!
//! Every facade call returns a `Pending<T>` at once; a worker later resolves
//! it through the paired `Completer<T>`. The caller chooses how to receive
//! the result:
//!
//! - `wait()` / `wait_timeout()` block the calling thread
//! - `.await` (the handle is a `Future`)
//! - `on_complete(f)` runs `f` on the thread that resolves the handle (or
//!   immediately on the caller's thread if it is already resolved)
//!
//! `cancel()` only suppresses the callback. The operation itself is already
//! queued and runs to completion; its result stays available to `wait`.
//!
//! A completer dropped without resolving (its lane shut down under it)
//! resolves the handle to `StoreError::Closed`, so no waiter hangs.

use histmeta_core::{StoreError, StoreResult};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use tracing::error;

type Callback<T> = Box<dyn FnOnce(StoreResult<T>) + Send>;

struct State<T> {
    result: Option<StoreResult<T>>,
    resolved: bool,
    cancelled: bool,
    waker: Option<Waker>,
    callback: Option<Callback<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

/// Create a linked completer/handle pair
pub fn pending<T>() -> (Completer<T>, Pending<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            result: None,
            resolved: false,
            cancelled: false,
            waker: None,
            callback: None,
        }),
        ready: Condvar::new(),
    });
    (
        Completer {
            shared: Some(Arc::clone(&shared)),
        },
        Pending { shared },
    )
}

// ============================================================================
// Completer
// ============================================================================

/// Write side of a `Pending`
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Completer<T> {
    /// Resolve the handle
    pub fn complete(mut self, result: StoreResult<T>) {
        if let Some(shared) = self.shared.take() {
            resolve(&shared, result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            resolve(&shared, Err(StoreError::Closed));
        }
    }
}

fn resolve<T>(shared: &Shared<T>, result: StoreResult<T>) {
    let mut state = shared.state.lock();
    state.resolved = true;

    if let Some(callback) = state.callback.take() {
        if !state.cancelled {
            drop(state);
            run_callback(callback, result);
            return;
        }
    }

    state.result = Some(result);
    let waker = state.waker.take();
    drop(state);

    shared.ready.notify_all();
    if let Some(waker) = waker {
        waker.wake();
    }
}

fn run_callback<T>(callback: Callback<T>, result: StoreResult<T>) {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || callback(result)));
    if outcome.is_err() {
        error!(target: "histmeta::facade", "Completion callback panicked");
    }
}

// ============================================================================
// Pending
// ============================================================================

/// Handle to a result that is not available yet
#[must_use = "a pending result does nothing unless waited on, awaited or given a callback"]
pub struct Pending<T> {
    shared: Arc<Shared<T>>,
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Pending")
            .field("resolved", &state.resolved)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

impl<T> Pending<T> {
    /// Handle that is already resolved
    pub fn ready(result: StoreResult<T>) -> Self {
        let (completer, pending) = pending();
        completer.complete(result);
        pending
    }

    /// Handle resolved to `err`
    pub fn failed(err: StoreError) -> Self {
        Self::ready(Err(err))
    }

    /// Check if the operation has finished
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().resolved
    }

    /// Suppress the callback registered with `on_complete`
    ///
    /// The operation still runs; `wait` still returns its result.
    pub fn cancel(&self) {
        self.shared.state.lock().cancelled = true;
    }

    /// Check if `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.lock().cancelled
    }

    /// Block until the result is available
    pub fn wait(self) -> StoreResult<T> {
        let mut state = self.shared.state.lock();
        while state.result.is_none() {
            if state.resolved {
                // Result already taken.
                return Err(StoreError::Closed);
            }
            self.shared.ready.wait(&mut state);
        }
        state.result.take().unwrap_or(Err(StoreError::Closed))
    }

    /// Block for at most `timeout`
    ///
    /// Gives the handle back if the operation has not finished in time. If it
    /// finished but its result was already taken, by a callback or by an
    /// earlier `.await` on this handle, this returns `Ok(Err(StoreError::Closed))`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<StoreResult<T>, Pending<T>> {
        let deadline = Instant::now() + timeout;
        {
            let mut state = self.shared.state.lock();
            while state.result.is_none() && !state.resolved {
                if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            if let Some(result) = state.result.take() {
                return Ok(result);
            }
            if state.resolved {
                return Ok(Err(StoreError::Closed));
            }
        }
        Err(self)
    }

    /// Deliver the result to `callback` instead of to this handle
    ///
    /// Runs on the resolving worker thread, or right here if already
    /// resolved. Returns a `Subscription` that can still cancel delivery.
    /// A callback on a write may read and wait, but must not wait on another
    /// write: it runs on the single write lane.
    pub fn on_complete<F>(self, callback: F) -> Subscription<T>
    where
        F: FnOnce(StoreResult<T>) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.cancelled {
            drop(state);
            return Subscription {
                shared: self.shared,
            };
        }
        if let Some(result) = state.result.take() {
            drop(state);
            run_callback(Box::new(callback), result);
        } else {
            state.callback = Some(Box::new(callback));
            drop(state);
        }
        Subscription {
            shared: self.shared,
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = StoreResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let Some(result) = state.result.take() {
            return Poll::Ready(result);
        }
        if state.resolved {
            return Poll::Ready(Err(StoreError::Closed));
        }
        let stale = state
            .waker
            .as_ref()
            .map_or(true, |existing| !existing.will_wake(cx.waker()));
        if stale {
            state.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// A registered completion callback
pub struct Subscription<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Subscription<T> {
    /// Stop the callback from running if it has not run yet
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.cancelled = true;
        state.callback = None;
    }

    /// Check if the operation has finished
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().resolved
    }
}
