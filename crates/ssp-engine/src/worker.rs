//! Per-invocation worker threads
//!
//! The shell that hosts this engine is single-threaded and must stay
//! responsive through multi-second derivations and large-file
//! operations. [`spawn`] runs one operation on its own thread and
//! hands back a [`TaskHandle`]: progress events arrive over an mpsc
//! channel, cancellation goes through the shared token, and `join`
//! returns the operation's typed result.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use ssp_core::{CancelToken, ProgressEvent, ProgressFn, SspError, SspResult};

/// Handle to one in-flight operation.
pub struct TaskHandle<T> {
    events: mpsc::Receiver<ProgressEvent>,
    cancel: CancelToken,
    handle: JoinHandle<SspResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Raise the cancellation flag; the operation observes it at its
    /// next chunk boundary and fails with `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Block for the next progress event; `None` once the operation
    /// has finished and the channel is closed.
    pub fn recv_event(&self) -> Option<ProgressEvent> {
        self.events.recv().ok()
    }

    /// Non-blocking event poll.
    pub fn try_recv_event(&self) -> Option<ProgressEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the operation and return its result.
    pub fn join(self) -> SspResult<T> {
        // Drop the receiver first so a sender blocked on a full
        // channel can never deadlock the join (std mpsc is unbounded,
        // but the ordering costs nothing).
        drop(self.events);
        self.handle
            .join()
            .map_err(|_| SspError::Io(std::io::Error::other("worker thread panicked")))?
    }
}

/// Run `op` on a dedicated thread.
///
/// The closure receives a progress callback wired to the handle's
/// event channel and the handle's cancellation token — the same
/// optional-parameter shapes every engine operation takes.
pub fn spawn<T, F>(op: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(Option<&ProgressFn>, Option<&CancelToken>) -> SspResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let cancel_for_op = cancel.clone();

    let handle = thread::spawn(move || {
        let progress: ProgressFn = Box::new(move |event| {
            // A disconnected receiver just means nobody is watching.
            let _ = tx.send(event);
        });
        op(Some(&progress), Some(&cancel_for_op))
    });

    TaskHandle {
        events: rx,
        cancel,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssp_core::progress::{emit, Phase};

    #[test]
    fn test_task_completes_with_events() {
        let task = spawn(|progress, _cancel| {
            for i in 0..3u64 {
                emit(
                    progress,
                    ProgressEvent {
                        operation: "demo",
                        phase: Phase::Process,
                        bytes_done: i,
                        bytes_total: Some(3),
                    },
                );
            }
            Ok(42u64)
        });

        let mut seen = 0;
        while task.recv_event().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert_eq!(task.join().unwrap(), 42);
    }

    #[test]
    fn test_cancellation_observed() {
        let task = spawn::<(), _>(|_progress, cancel| {
            let token = cancel.expect("worker always passes a token");
            loop {
                if token.is_cancelled() {
                    return Err(SspError::Cancelled);
                }
                std::thread::yield_now();
            }
        });

        task.cancel();
        assert!(matches!(task.join(), Err(SspError::Cancelled)));
    }

    #[test]
    fn test_typed_error_propagates() {
        let task = spawn::<(), _>(|_, _| {
            Err(SspError::UnsupportedAlgorithm("whirlpool".into()))
        });
        assert!(matches!(
            task.join(),
            Err(SspError::UnsupportedAlgorithm(_))
        ));
    }
}
