//! Shared polling of API resources
//!
//! One task per resource key fetches immediately and then on a cadence.
//! Every subscriber to the same key shares that task; when the last
//! subscription is dropped the task is aborted, so no timer outlives its
//! readers and late responses are discarded with it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::{
    config::{BoostReevaluation, PollingConfig},
    errors::DashboardError,
};

/// Something that can be fetched repeatedly
#[async_trait]
pub trait PollSource: Send + Sync + 'static {
    type Output: Clone + PartialEq + Send + Sync + 'static;

    async fn fetch(&self) -> Result<Self::Output, DashboardError>;

    /// Danger stamp carried by a fetched value, read by boosted cadences
    fn boost_anchor(&self, _value: &Self::Output) -> Option<DateTime<Utc>> {
        None
    }
}

/// Wall clock used for danger windows
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Fixed(Duration),
    /// `fast` while the last danger stamp is younger than `window`,
    /// `slow` otherwise
    Boosted {
        fast: Duration,
        slow: Duration,
        window: Duration,
        reevaluation: BoostReevaluation,
    },
}

impl Cadence {
    pub fn boosted(config: &PollingConfig) -> Self {
        Cadence::Boosted {
            fast: config.fast_interval,
            slow: config.slow_interval,
            window: config.boost_window,
            reevaluation: config.boost_reevaluation,
        }
    }

    pub fn interval(&self, anchor: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        match *self {
            Cadence::Fixed(period) => period,
            Cadence::Boosted {
                fast, slow, window, ..
            } => {
                let in_window = anchor.is_some_and(|at| {
                    (now - at)
                        .to_std()
                        .map(|elapsed| elapsed < window)
                        .unwrap_or(true)
                });
                if in_window {
                    fast
                } else {
                    slow
                }
            }
        }
    }

    /// Whether the timer is re-armed after a poll
    fn rearm(&self, anchor_changed: bool) -> bool {
        match self {
            Cadence::Fixed(_) => false,
            Cadence::Boosted {
                reevaluation: BoostReevaluation::OnChange,
                ..
            } => anchor_changed,
            Cadence::Boosted {
                reevaluation: BoostReevaluation::EveryTick,
                ..
            } => true,
        }
    }
}

struct Shared<T> {
    rx: watch::Receiver<Option<T>>,
    handle: JoinHandle<()>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read side of a polled resource.
///
/// Holds `None` until the first successful fetch.
pub struct Subscription<T> {
    rx: watch::Receiver<Option<T>>,
    _shared: Arc<Shared<T>>,
}

impl<T: Clone> Subscription<T> {
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait until a fetch yields a value different from the last one
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

type Registry = HashMap<String, Weak<dyn Any + Send + Sync>>;

/// Registry of polled resources keyed by resource id
#[derive(Clone)]
pub struct PollingService {
    resources: Arc<Mutex<Registry>>,
    clock: Arc<dyn Clock>,
}

impl Default for PollingService {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingService {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            resources: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Subscribe to `key`, starting a poller from `source` if none runs.
    ///
    /// A poller already running for `key` is shared and `source` and
    /// `cadence` are ignored. Must be called inside a Tokio runtime.
    pub fn subscribe<S: PollSource>(
        &self,
        key: &str,
        source: S,
        cadence: Cadence,
    ) -> Result<Subscription<S::Output>, DashboardError> {
        let mut resources = self
            .resources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        resources.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = resources.get(key).and_then(Weak::upgrade) {
            let shared = existing
                .downcast::<Shared<S::Output>>()
                .map_err(|_| DashboardError::ResourceTypeMismatch(key.to_string()))?;
            debug!(resource = key, "Joining running poller");
            return Ok(Subscription {
                rx: shared.rx.clone(),
                _shared: shared,
            });
        }

        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(run_poller(
            key.to_string(),
            Arc::new(source),
            cadence,
            self.clock.clone(),
            tx,
        ));
        let shared = Arc::new(Shared {
            rx: rx.clone(),
            handle,
        });
        let erased: Arc<dyn Any + Send + Sync> = shared.clone();
        resources.insert(key.to_string(), Arc::downgrade(&erased));
        info!(resource = key, ?cadence, "Started poller");

        Ok(Subscription {
            rx,
            _shared: shared,
        })
    }

    /// Number of resources with at least one subscriber
    pub fn active(&self) -> usize {
        self.resources
            .lock()
            .map(|r| r.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Fetch once; returns whether the boost anchor moved
async fn poll_once<S: PollSource>(
    key: &str,
    source: &S,
    tx: &watch::Sender<Option<S::Output>>,
    anchor: &mut Option<DateTime<Utc>>,
) -> bool {
    match source.fetch().await {
        Ok(value) => {
            let next = source.boost_anchor(&value);
            let changed = next != *anchor;
            *anchor = next;
            // Subscribers are woken only when the value differs
            tx.send_if_modified(|current| {
                if current.as_ref() == Some(&value) {
                    return false;
                }
                *current = Some(value);
                true
            });
            changed
        }
        Err(e) => {
            debug!(resource = key, "Poll failed, keeping last value: {}", e);
            false
        }
    }
}

async fn run_poller<S: PollSource>(
    key: String,
    source: Arc<S>,
    cadence: Cadence,
    clock: Arc<dyn Clock>,
    tx: watch::Sender<Option<S::Output>>,
) {
    let mut anchor = None;
    let mut changed = poll_once(&key, source.as_ref(), &tx, &mut anchor).await;
    let mut period = cadence.interval(anchor, clock.now());
    let mut interval = ticker(period);

    loop {
        if cadence.rearm(changed) {
            let next = cadence.interval(anchor, clock.now());
            // An anchor change restarts the timer even at the same period
            if changed || next != period {
                debug!(resource = %key, ?next, "Re-arming poll timer");
                period = next;
                interval = ticker(period);
            }
        }

        interval.tick().await;
        changed = poll_once(&key, source.as_ref(), &tx, &mut anchor).await;
    }
}
