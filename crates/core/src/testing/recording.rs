//! Deterministic delay and progress recording helpers.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::ingest::Delay;
use crate::progress::{ProgressSink, ProgressUpdate};

/// A [`Delay`] that returns immediately and records what was asked for.
#[derive(Debug, Default)]
pub struct ImmediateDelay {
    waits: Mutex<Vec<Duration>>,
}

impl ImmediateDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waits requested.
    pub fn waits(&self) -> usize {
        self.waits.lock().unwrap().len()
    }

    /// Sum of all requested waits.
    pub fn total_waited(&self) -> Duration {
        self.waits.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Delay for ImmediateDelay {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        // Still a suspension point so concurrent tasks interleave.
        tokio::task::yield_now().await;
    }
}

/// A [`ProgressSink`] that keeps every update in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ProgressUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
