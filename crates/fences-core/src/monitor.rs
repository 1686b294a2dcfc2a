use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::directory::DirectoryService;

/// Poll cadence of the monitor. Readers of the flag may observe a value up
/// to one interval stale; the compose gate tolerates that.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Background loop that compares wall-clock time against the stored
/// expiration timestamp and keeps the shared expired flag current.
///
/// The loop is the flag's only writer; compose entry guards are its readers.
pub struct ExpirationMonitor {
    service: Arc<DirectoryService>,
    expired: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ExpirationMonitor {
    pub fn new(service: Arc<DirectoryService>) -> Self {
        Self {
            service,
            expired: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    /// Shared handle readers use to check expiry.
    pub fn expired_flag(&self) -> Arc<AtomicBool> {
        self.expired.clone()
    }

    /// One poll step: absent or future timestamp clears the flag, past sets it.
    pub async fn tick(&self) {
        let expired = match self.service.expires_at().await {
            Some(at) => at <= Local::now().naive_local(),
            None => false,
        };
        if self.expired.swap(expired, Ordering::SeqCst) != expired {
            info!(expired, "expiration state changed");
        }
    }

    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut tick = interval(POLL_INTERVAL);
            loop {
                tokio::select! {
                  _ = monitor.cancel.cancelled() => break,
                  _ = tick.tick() => monitor.tick().await,
                }
            }
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Directory;
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;

    fn setup() -> (Arc<DirectoryService>, ExpirationMonitor) {
        let store = MemoryStore::with_settings(Directory::default());
        let service = Arc::new(DirectoryService::new(
            Arc::new(store),
            crate::config::DEFAULT_DATETIME_PATTERN,
        ));
        (service.clone(), ExpirationMonitor::new(service))
    }

    fn fmt(at: chrono::NaiveDateTime) -> String {
        at.format(crate::config::DEFAULT_DATETIME_PATTERN).to_string()
    }

    #[tokio::test]
    async fn no_timestamp_means_not_expired() {
        let (_, monitor) = setup();
        monitor.tick().await;
        assert!(!monitor.expired_flag().load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn past_timestamp_sets_flag_future_clears_it() {
        let (service, monitor) = setup();

        let past = Local::now().naive_local() - ChronoDuration::seconds(1);
        service.set_expiration(&fmt(past)).await.unwrap();
        monitor.tick().await;
        assert!(monitor.expired_flag().load(Ordering::SeqCst));

        let future = Local::now().naive_local() + ChronoDuration::hours(1);
        service.set_expiration(&fmt(future)).await.unwrap();
        monitor.tick().await;
        assert!(!monitor.expired_flag().load(Ordering::SeqCst));
    }
}
