//! Live lead snapshots.
//!
//! A [`Subscription`] is a handle on a stream of full team snapshots. The
//! producer side is released when the handle is dropped, whichever way the
//! consumer exits.

use chrono::Utc;
use tokio::sync::watch;

use crate::filter::{filter_leads, FilterCriteria};
use crate::models::Lead;

type Cleanup = Box<dyn FnOnce() + Send + 'static>;

pub struct Subscription {
    receiver: watch::Receiver<Vec<Lead>>,
    cleanup: Option<Cleanup>,
}

impl Subscription {
    pub fn new(receiver: watch::Receiver<Vec<Lead>>) -> Self {
        Subscription {
            receiver,
            cleanup: None,
        }
    }

    /// Runs `cleanup` once when the subscription ends.
    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn current(&self) -> Vec<Lead> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<Vec<Lead>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// Re-runs the filter over every snapshot a subscription delivers.
pub struct LeadView {
    subscription: Subscription,
    criteria: FilterCriteria,
}

impl LeadView {
    pub fn new(subscription: Subscription, criteria: FilterCriteria) -> Self {
        LeadView {
            subscription,
            criteria,
        }
    }

    pub fn current(&self) -> Vec<Lead> {
        filter_leads(&self.subscription.current(), &self.criteria, Utc::now())
    }

    pub async fn next(&mut self) -> Option<Vec<Lead>> {
        let snapshot = self.subscription.next().await?;
        Some(filter_leads(&snapshot, &self.criteria, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn cleanup_runs_on_drop() {
        let (_tx, rx) = watch::channel(Vec::new());
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();

        let subscription = Subscription::new(rx).with_cleanup(move || flag.store(true, Ordering::SeqCst));
        assert!(!released.load(Ordering::SeqCst));
        subscription.unsubscribe();
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn next_ends_when_producer_closes() {
        let (tx, rx) = watch::channel(Vec::new());
        let mut subscription = Subscription::new(rx);
        tx.send_replace(Vec::new());
        assert!(subscription.next().await.is_some());
        drop(tx);
        assert!(subscription.next().await.is_none());
    }
}
