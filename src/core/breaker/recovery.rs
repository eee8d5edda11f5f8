use super::CircuitBreaker;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

/// Periodic `Open -> HalfOpen` poller for a single breaker, firing at half
/// the recovery timeout.
///
/// The handle owns the background thread. Dropping it (registry `stop_all`,
/// breaker teardown, or test scope exit) wakes and joins the thread, so no
/// polling work outlives its breaker. The thread holds only a `Weak`
/// reference and exits on its own once the breaker is gone.
#[derive(Debug)]
pub struct RecoveryTicker {
    shared: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl RecoveryTicker {
    pub(crate) fn spawn(
        service_name: String,
        period_ms: u64,
        breaker: Weak<CircuitBreaker>,
    ) -> RecoveryTicker {
        let shared = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            let (stopped, trigger) = &*thread_shared;
            let mut guard = stopped.lock().unwrap();
            loop {
                let (g, timeout) = trigger
                    .wait_timeout(guard, Duration::from_millis(period_ms))
                    .unwrap();
                guard = g;
                if *guard {
                    break;
                }
                if !timeout.timed_out() {
                    // spurious wakeup
                    continue;
                }
                match breaker.upgrade() {
                    Some(breaker) => breaker.try_recover(),
                    None => break,
                }
            }
            crate::logging::debug!("[RecoveryTicker] {} poller stopped", service_name);
        });
        RecoveryTicker {
            shared,
            handle: Some(handle),
        }
    }

    fn stop(&mut self) {
        *self.shared.0.lock().unwrap() = true;
        self.shared.1.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RecoveryTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
