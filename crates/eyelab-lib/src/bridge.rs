//! Blocking bridge from callback-style device requests to sequential control.
//!
//! A request hands the device a [`Completion`] and keeps the matching
//! [`Pending`]. The callback sends its result over a one-slot channel; the
//! controlling thread waits on it with a timeout. A callback arriving after the
//! waiter gave up finds the channel closed and is dropped.

use crate::device::{Completion, ErrorCode};
use crate::error::{Result, TrackerError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub struct Pending<T> {
    rx: Receiver<std::result::Result<T, ErrorCode>>,
    operation: &'static str,
}

/// Create a completion/pending pair for one device request.
pub fn request<T: Send + 'static>(operation: &'static str) -> (Completion<T>, Pending<T>) {
    let (tx, rx) = bounded(1);
    let done: Completion<T> = Box::new(move |result| {
        let _ = tx.send(result);
    });
    (done, Pending { rx, operation })
}

impl<T> Pending<T> {
    /// Block until the device answers. The outer result carries bridge
    /// failures, the inner one the device's own status.
    pub fn wait(self, timeout: Duration) -> Result<std::result::Result<T, ErrorCode>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(TrackerError::Timeout(self.operation)),
            Err(RecvTimeoutError::Disconnected) => Err(TrackerError::Abandoned(self.operation)),
        }
    }

    /// Like [`Pending::wait`], but runs `tick` every `interval` while waiting
    /// so the caller can keep a display alive.
    pub fn wait_while<F: FnMut()>(
        self,
        timeout: Duration,
        interval: Duration,
        mut tick: F,
    ) -> Result<std::result::Result<T, ErrorCode>> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(TrackerError::Timeout(self.operation));
            }
            match self.rx.recv_timeout(interval.min(deadline - now)) {
                Ok(result) => return Ok(result),
                Err(RecvTimeoutError::Timeout) => tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TrackerError::Abandoned(self.operation))
                }
            }
        }
    }
}

/// Lock shared state, recovering the data if a device thread panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn resolves_from_another_thread() {
        let (done, pending) = request::<u32>("test request");
        thread::spawn(move || done(Ok(7)));
        let result = pending.wait(Duration::from_secs(2)).unwrap();
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn passes_device_errors_through() {
        let (done, pending) = request::<()>("test request");
        done(Err(ErrorCode(0x42)));
        let result = pending.wait(Duration::from_millis(10)).unwrap();
        assert_eq!(result, Err(ErrorCode(0x42)));
    }

    #[test]
    fn times_out_when_callback_never_fires() {
        let (done, pending) = request::<()>("silent request");
        let err = pending.wait(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, TrackerError::Timeout("silent request")));
        // late answer must not panic
        done(Ok(()));
    }

    #[test]
    fn dropped_completion_is_reported() {
        let (done, pending) = request::<()>("dropped request");
        drop(done);
        let err = pending.wait(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TrackerError::Abandoned(_)));
    }

    #[test]
    fn wait_while_ticks_until_answer() {
        let (done, pending) = request::<()>("slow request");
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(40));
            done(Ok(()));
        });
        let mut ticks = 0;
        let result = pending
            .wait_while(Duration::from_secs(2), Duration::from_millis(5), || {
                ticks += 1
            })
            .unwrap();
        assert!(result.is_ok());
        assert!(ticks > 0);
    }
}
