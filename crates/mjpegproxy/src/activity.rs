use {
    std::{sync::Mutex, time::Instant},
    tokio::sync::Notify,
};

/// Lossy wake-up from request handlers to the crawler.
///
/// `ping` wakes whoever is currently suspended in `wait` and returns at once. A
/// ping nobody is waiting for is not queued: the next `wait` only returns on a
/// later ping.
#[derive(Debug, Default)]
pub struct ActivitySignal {
    notify: Notify,
    last: Mutex<Option<Instant>>,
}

impl ActivitySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity now and wake a waiting crawler, if any.
    pub fn ping(&self) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        // notify_waiters stores no permit when nobody waits
        self.notify.notify_waiters();
    }

    /// Suspend until the next ping and return its timestamp.
    pub async fn wait(&self) -> Instant {
        self.notify.notified().await;
        self.last_ping().unwrap_or_else(Instant::now)
    }

    /// Timestamp of the most recent ping, whether or not it woke anyone.
    pub fn last_ping(&self) -> Option<Instant> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}
