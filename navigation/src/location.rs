use std::{fs::File, future::Future, io::BufReader, path::Path, sync::Mutex, time::Duration};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};

use crate::models::PositionFix;

const SUBSCRIPTION_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("no position available")]
    Unavailable,
    #[error("location source closed")]
    SourceClosed,
    #[error("failed to read recorded fixes: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid recorded fixes: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Device location. Platform glue pushes fixes into a [`LocationFeed`];
/// recorded walks are played back by [`ReplayLocationSource`].
pub trait LocationSource: Send + Sync {
    /// Resolves once a fix is available.
    fn fetch_position(&self) -> impl Future<Output = Result<PositionFix, LocationError>> + Send;

    /// Fixes from now on, in order. Dropping the subscription cancels it.
    fn position_updates(&self) -> PositionSubscription;
}

#[derive(Debug)]
pub struct PositionSubscription {
    receiver: mpsc::Receiver<PositionFix>,
}

impl PositionSubscription {
    pub fn new(receiver: mpsc::Receiver<PositionFix>) -> Self {
        Self { receiver }
    }

    /// Next fix, or `None` once the source has finished.
    pub async fn next(&mut self) -> Option<PositionFix> {
        self.receiver.recv().await
    }
}

/// Fan-out point for fixes reported by the platform location service.
#[derive(Debug)]
pub struct LocationFeed {
    latest: watch::Sender<Option<PositionFix>>,
    subscribers: Mutex<Vec<mpsc::Sender<PositionFix>>>,
}

impl Default for LocationFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationFeed {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn latest(&self) -> Option<PositionFix> {
        *self.latest.borrow()
    }

    /// Deliver a fix to every live subscription.
    ///
    /// Subscribers that fall a full buffer behind miss the fix; dropped
    /// subscriptions are pruned.
    pub fn publish(&self, fix: PositionFix) {
        self.latest.send_replace(Some(fix));

        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|sender| match sender.try_send(fix) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("position subscriber is lagging, dropping fix");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(guard) => guard.iter().filter(|sender| !sender.is_closed()).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|sender| !sender.is_closed())
                .count(),
        }
    }
}

impl LocationSource for LocationFeed {
    fn fetch_position(&self) -> impl Future<Output = Result<PositionFix, LocationError>> + Send {
        let mut latest = self.latest.subscribe();
        async move {
            let fix = *latest
                .wait_for(Option::is_some)
                .await
                .map_err(|_| LocationError::SourceClosed)?;
            fix.ok_or(LocationError::Unavailable)
        }
    }

    fn position_updates(&self) -> PositionSubscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        match self.subscribers.lock() {
            Ok(mut guard) => guard.push(sender),
            Err(poisoned) => poisoned.into_inner().push(sender),
        }
        PositionSubscription::new(receiver)
    }
}

/// Plays back a recorded walk, optionally pacing the fixes.
#[derive(Debug, Clone)]
pub struct ReplayLocationSource {
    fixes: Vec<PositionFix>,
    interval: Option<Duration>,
}

impl ReplayLocationSource {
    pub fn new(fixes: Vec<PositionFix>) -> Self {
        Self {
            fixes,
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Read a JSON array of fixes.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let reader = BufReader::new(File::open(path)?);
        let fixes: Vec<PositionFix> = serde_json::from_reader(reader)?;
        Ok(Self::new(fixes))
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl LocationSource for ReplayLocationSource {
    fn fetch_position(&self) -> impl Future<Output = Result<PositionFix, LocationError>> + Send {
        let first = self.fixes.first().copied();
        async move { first.ok_or(LocationError::Unavailable) }
    }

    /// Must be called inside a tokio runtime; playback runs on its own task.
    fn position_updates(&self) -> PositionSubscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let fixes = self.fixes.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            for fix in fixes {
                if let Some(interval) = interval {
                    tokio::time::sleep(interval).await;
                }
                if sender.send(fix).await.is_err() {
                    tracing::debug!("replay cancelled by subscriber");
                    return;
                }
            }
            tracing::debug!("replay finished");
        });

        PositionSubscription::new(receiver)
    }
}
