//! Single-shot typed promises.
//!
//! A [`Promise`] is completed at most once (enforced by move semantics).
//! Dropping an unfulfilled promise delivers a state error to its
//! continuation instead of hanging it.

// Layer 1: Standard library
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

// Layer 2: Third-party
use tokio::sync::oneshot;

// Layer 3: Internal
use tgsys_utils::{CoreError, CoreResult};

fn dropped_error() -> CoreError {
    CoreError::state("Promise was dropped before completion")
}

/// The fulfilling half of a single-shot promise.
pub struct Promise<T> {
    tx: Option<oneshot::Sender<CoreResult<T>>>,
}

impl<T> Promise<T> {
    /// Create a connected promise/future pair.
    pub fn new() -> (Promise<T>, PromiseFuture<T>) {
        let (tx, rx) = oneshot::channel();
        (Promise { tx: Some(tx) }, PromiseFuture { rx })
    }

    /// Complete the promise with a value.
    pub fn set_value(mut self, value: T) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Ok(value));
        }
    }

    /// Complete the promise with an error.
    pub fn set_error(mut self, error: CoreError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error));
        }
    }

    /// Complete the promise with an arbitrary result.
    pub fn set_result(mut self, result: CoreResult<T>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(dropped_error()));
        }
    }
}

/// The consuming half of a single-shot promise.
pub struct PromiseFuture<T> {
    rx: oneshot::Receiver<CoreResult<T>>,
}

impl<T> PromiseFuture<T> {
    /// Block the current thread until the promise completes.
    ///
    /// Must not be called from a scheduler thread.
    pub fn wait(self) -> CoreResult<T> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(dropped_error()))
    }
}

impl<T> Future for PromiseFuture<T> {
    type Output = CoreResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(dropped_error())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_value() {
        let (promise, future) = Promise::new();
        promise.set_value(41);
        assert_eq!(future.await, Ok(41));
    }

    #[tokio::test]
    async fn test_set_error() {
        let (promise, future) = Promise::<i32>::new();
        promise.set_error(CoreError::bad_request("nope"));
        let err = future.await.unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[tokio::test]
    async fn test_dropped_promise_completes_with_error() {
        let (promise, future) = Promise::<i32>::new();
        drop(promise);
        let err = future.await.unwrap_err();
        assert!(err.is_state_error());
    }

    #[test]
    fn test_blocking_wait() {
        let (promise, future) = Promise::new();
        let worker = std::thread::spawn(move || promise.set_value("done"));
        assert_eq!(future.wait(), Ok("done"));
        let _ = worker.join();
    }
}
