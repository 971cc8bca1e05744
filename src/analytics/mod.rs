/// Usage analytics
///
/// Events are handed to a bounded queue and recorded by a background task, so
/// a slow or failing sink never delays a search response.

pub mod usage;

pub use usage::{DailyUsage, QueryUsage, UsageReport, UsageStatsRecorder};

use crate::error::SearchResult;
use crate::types::AnalyticsEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sink for usage events
#[async_trait]
pub trait AnalyticsRecorder: Send + Sync {
    async fn record(&self, event: AnalyticsEvent) -> SearchResult<()>;
}

/// Non-blocking front of the analytics queue
#[derive(Clone)]
pub struct AnalyticsDispatcher {
    sender: mpsc::Sender<AnalyticsEvent>,
    dropped: Arc<AtomicU64>,
}

impl AnalyticsDispatcher {
    /// Start the worker that drains the queue into `recorder`
    ///
    /// The worker stops once every dispatcher clone has been dropped and the
    /// queue is empty.
    pub fn spawn(recorder: Arc<dyn AnalyticsRecorder>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AnalyticsEvent>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(e) = recorder.record(event).await {
                    warn!("Failed to record analytics event: {}", e);
                }
            }
            debug!("Analytics worker stopped");
        });

        let dispatcher = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (dispatcher, worker)
    }

    /// Enqueue an event without waiting; returns false when it was dropped
    pub fn dispatch(&self, event: AnalyticsEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Analytics queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Analytics queue closed, dropping event");
                false
            }
        }
    }

    /// Whether the worker is still consuming events
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Events dropped since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
