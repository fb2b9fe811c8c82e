use crate::error::Error;
use crate::feed::{ChangeFeed, FeedSource};
use events::{DomainEvent, EventPublisher};
use futures::StreamExt;
use log::*;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Fixed delay between a feed failure and the next attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherStatus {
    /// Opening the first cursor.
    Starting,
    /// A cursor is open and events are being published.
    Watching,
    /// The last cursor failed; waiting for the retry delay.
    Retrying,
    /// Shut down. Terminal.
    Stopped,
}

/// Cloneable read-only view of a running watcher.
#[derive(Debug, Clone)]
pub struct WatcherMonitor {
    source: FeedSource,
    status: watch::Receiver<WatcherStatus>,
    restarts: Arc<AtomicU64>,
}

impl WatcherMonitor {
    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    pub fn status(&self) -> WatcherStatus {
        *self.status.borrow()
    }

    /// Number of times the feed has been restarted after a failure.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }
}

pub struct WatcherHandle {
    monitor: WatcherMonitor,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn monitor(&self) -> WatcherMonitor {
        self.monitor.clone()
    }

    /// Wait for the watcher to stop. Only returns after the shutdown token
    /// given to [`ChangeFeedWatcher::spawn`] was cancelled.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Change feed watcher for {} panicked: {e}", self.monitor.source);
        }
    }
}

/// Republishes changes from one external collection as domain events.
///
/// Runs until shutdown. Any failure to open or read the feed, including the
/// cursor simply ending, is logged and followed by a restart after a fixed
/// delay.
pub struct ChangeFeedWatcher {
    feed: Arc<dyn ChangeFeed>,
    source: FeedSource,
    publisher: EventPublisher,
    retry_delay: Duration,
}

impl ChangeFeedWatcher {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        source: FeedSource,
        publisher: EventPublisher,
        retry_delay: Duration,
    ) -> Self {
        Self {
            feed,
            source,
            publisher,
            retry_delay,
        }
    }

    /// Start the watcher on its own task.
    pub fn spawn(self, shutdown: CancellationToken) -> WatcherHandle {
        let (status_tx, status_rx) = watch::channel(WatcherStatus::Starting);
        let restarts = Arc::new(AtomicU64::new(0));
        let monitor = WatcherMonitor {
            source: self.source.clone(),
            status: status_rx,
            restarts: restarts.clone(),
        };

        let task = tokio::spawn(self.run(shutdown, status_tx, restarts));

        WatcherHandle { monitor, task }
    }

    async fn run(
        self,
        shutdown: CancellationToken,
        status: watch::Sender<WatcherStatus>,
        restarts: Arc<AtomicU64>,
    ) {
        info!("Starting change feed watcher for {}", self.source);

        loop {
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                outcome = self.watch_once(&status) => outcome,
            };

            match outcome {
                Ok(()) => warn!(
                    "Change feed cursor for {} closed, retrying in {:?}",
                    self.source, self.retry_delay
                ),
                Err(e) => error!(
                    "Change feed for {} failed, retrying in {:?}: {e}",
                    self.source, self.retry_delay
                ),
            }

            status.send_replace(WatcherStatus::Retrying);
            restarts.fetch_add(1, Ordering::Relaxed);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = time::sleep(self.retry_delay) => {}
            }
        }

        status.send_replace(WatcherStatus::Stopped);
        info!("Change feed watcher for {} stopped", self.source);
    }

    /// Open one cursor and publish until it ends or fails.
    async fn watch_once(&self, status: &watch::Sender<WatcherStatus>) -> Result<(), Error> {
        let mut stream = self.feed.open(&self.source.collection).await?;
        status.send_replace(WatcherStatus::Watching);
        info!("Change feed cursor opened for {}", self.source);

        while let Some(event) = stream.next().await {
            let event = event?;
            if !event.operation.is_qualifying() {
                trace!(
                    "Ignoring {} on {}",
                    event.operation.as_str(),
                    event.collection
                );
                continue;
            }

            info!(
                "Change detected on {}: {}",
                event.collection,
                event.operation.as_str()
            );
            self.publisher
                .publish(DomainEvent::ExternalChange {
                    collection: event.collection.clone(),
                    model_type: self.source.topic.clone(),
                    operation: event.operation.as_str().to_string(),
                })
                .await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ChangeEvent, ChangeStream, OperationKind};
    use async_trait::async_trait;
    use events::EventHandler;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    enum Attempt {
        FailToOpen,
        /// Events to emit, then whether the cursor stays open.
        Events(Vec<Result<ChangeEvent, Error>>, bool),
    }

    struct ScriptedFeed {
        attempts: Mutex<VecDeque<Attempt>>,
        opens: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(attempts: Vec<Attempt>) -> Arc<Self> {
            Arc::new(Self {
                attempts: Mutex::new(attempts.into()),
                opens: AtomicUsize::new(0),
            })
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChangeFeed for ScriptedFeed {
        async fn open(&self, _collection: &str) -> Result<ChangeStream, Error> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let attempt = self.attempts.lock().unwrap().pop_front();
            match attempt {
                Some(Attempt::FailToOpen) => Err(Error::other("feed unavailable")),
                Some(Attempt::Events(events, true)) => {
                    Ok(stream::iter(events).chain(stream::pending()).boxed())
                }
                Some(Attempt::Events(events, false)) => Ok(stream::iter(events).boxed()),
                None => Ok(stream::pending().boxed()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        published: Mutex<Vec<(String, String)>>,
    }

    impl RecordingHandler {
        fn published(&self) -> Vec<(String, String)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &DomainEvent) {
            if let DomainEvent::ExternalChange {
                model_type,
                operation,
                ..
            } = event
            {
                self.published
                    .lock()
                    .unwrap()
                    .push((model_type.clone(), operation.clone()));
            }
        }
    }

    fn change(operation: OperationKind) -> Result<ChangeEvent, Error> {
        Ok(ChangeEvent::new("pose_events", operation))
    }

    fn start(feed: Arc<ScriptedFeed>) -> (WatcherHandle, Arc<RecordingHandler>, CancellationToken) {
        let handler = Arc::new(RecordingHandler::default());
        let publisher = EventPublisher::new().with_handler(handler.clone());
        let shutdown = CancellationToken::new();
        let watcher = ChangeFeedWatcher::new(
            feed,
            FeedSource::new("pose_events", "pose_events"),
            publisher,
            DEFAULT_RETRY_DELAY,
        );
        (watcher.spawn(shutdown.clone()), handler, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_open_failure_and_skips_deletes() {
        let feed = ScriptedFeed::new(vec![
            Attempt::FailToOpen,
            Attempt::Events(
                vec![
                    change(OperationKind::Insert),
                    change(OperationKind::Delete),
                    change(OperationKind::Update),
                    change(OperationKind::Replace),
                    change(OperationKind::Other("drop".to_string())),
                ],
                true,
            ),
        ]);
        let (handle, handler, shutdown) = start(feed.clone());
        let monitor = handle.monitor();

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(feed.opens(), 1);
        assert_eq!(monitor.status(), WatcherStatus::Retrying);
        assert!(handler.published().is_empty());

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(feed.opens(), 2);
        assert_eq!(monitor.status(), WatcherStatus::Watching);
        assert_eq!(monitor.restarts(), 1);
        assert_eq!(
            handler.published(),
            vec![
                ("pose_events".to_string(), "insert".to_string()),
                ("pose_events".to_string(), "update".to_string()),
                ("pose_events".to_string(), "replace".to_string()),
            ]
        );

        shutdown.cancel();
        handle.join().await;
        assert_eq!(monitor.status(), WatcherStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_before_fixed_delay() {
        let feed = ScriptedFeed::new(vec![Attempt::FailToOpen, Attempt::FailToOpen]);
        let (handle, _handler, shutdown) = start(feed.clone());

        time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(feed.opens(), 1);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(feed.opens(), 2);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(feed.opens(), 3);

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_when_cursor_closes() {
        let feed = ScriptedFeed::new(vec![
            Attempt::Events(vec![change(OperationKind::Insert)], false),
            Attempt::Events(vec![change(OperationKind::Update)], true),
        ]);
        let (handle, handler, shutdown) = start(feed.clone());
        let monitor = handle.monitor();

        time::sleep(Duration::from_secs(3)).await;

        assert_eq!(feed.opens(), 2);
        assert_eq!(monitor.restarts(), 1);
        assert_eq!(handler.published().len(), 2);

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_when_iteration_fails() {
        let feed = ScriptedFeed::new(vec![Attempt::Events(
            vec![
                change(OperationKind::Insert),
                Err(Error::other("cursor killed")),
                change(OperationKind::Update),
            ],
            true,
        )]);
        let (handle, handler, shutdown) = start(feed.clone());
        let monitor = handle.monitor();

        time::sleep(Duration::from_secs(3)).await;

        assert_eq!(feed.opens(), 2);
        assert_eq!(monitor.restarts(), 1);
        assert_eq!(
            handler.published(),
            vec![("pose_events".to_string(), "insert".to_string())]
        );

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_retry_delay() {
        let feed = ScriptedFeed::new(vec![Attempt::FailToOpen]);
        let handler = Arc::new(RecordingHandler::default());
        let shutdown = CancellationToken::new();
        let watcher = ChangeFeedWatcher::new(
            feed.clone(),
            FeedSource::new("pose_events", "pose_events"),
            EventPublisher::new().with_handler(handler),
            Duration::from_secs(3600),
        );
        let handle = watcher.spawn(shutdown.clone());
        let monitor = handle.monitor();

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(monitor.status(), WatcherStatus::Retrying);

        shutdown.cancel();
        handle.join().await;

        assert_eq!(monitor.status(), WatcherStatus::Stopped);
        assert_eq!(feed.opens(), 1);
    }

    #[tokio::test]
    async fn test_publishes_under_configured_topic() {
        let feed = ScriptedFeed::new(vec![Attempt::Events(
            vec![change(OperationKind::Insert)],
            true,
        )]);
        let handler = Arc::new(RecordingHandler::default());
        let shutdown = CancellationToken::new();
        let handle = ChangeFeedWatcher::new(
            feed,
            FeedSource::new("pose_events", "patients"),
            EventPublisher::new().with_handler(handler.clone()),
            DEFAULT_RETRY_DELAY,
        )
        .spawn(shutdown.clone());

        for _ in 0..100 {
            if !handler.published().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(
            handler.published(),
            vec![("patients".to_string(), "insert".to_string())]
        );
        assert_eq!(handle.monitor().source().topic, "patients");

        shutdown.cancel();
        handle.join().await;
    }
}
