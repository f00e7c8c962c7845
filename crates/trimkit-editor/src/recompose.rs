//! Rebuilding the playable asset whenever the target range changes.
//!
//! Every request is tagged with a generation number taken from a counter at
//! issue time. Requests run concurrently and may finish in any order; a
//! result is accepted only if its generation is still the latest issued.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use trimkit_core::{Result, TimeRange};
use trimkit_media::{compose, Playable, SourceAsset};

/// Outcome of one recomposition request.
#[derive(Debug)]
pub struct Recomposed {
    pub generation: u64,
    pub range: TimeRange,
    pub result: Result<Playable>,
}

/// Issues recomposition requests and filters their results.
#[derive(Debug)]
pub struct Recomposer {
    source: Arc<dyn SourceAsset>,
    latest: AtomicU64,
    in_flight: usize,
    tx: mpsc::UnboundedSender<Recomposed>,
    rx: mpsc::UnboundedReceiver<Recomposed>,
}

impl Recomposer {
    pub fn new(source: Arc<dyn SourceAsset>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            latest: AtomicU64::new(0),
            in_flight: 0,
            tx,
            rx,
        }
    }

    pub fn source(&self) -> &Arc<dyn SourceAsset> {
        &self.source
    }

    /// Highest generation issued so far (0 before the first request).
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Whether a result of `generation` may still be applied.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest_generation()
    }

    /// Issue a request for `range`.
    ///
    /// The generation is assigned now, before the returned future is first
    /// polled, so generations follow issue order.
    pub fn request(&self, range: TimeRange) -> impl Future<Output = Recomposed> + Send + 'static {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let source = Arc::clone(&self.source);
        debug!(generation, range = %range, "Recomposition requested");
        async move {
            let result = compose(source, range).await;
            Recomposed {
                generation,
                range,
                result,
            }
        }
    }

    /// Issue a request and run it on the runtime; the result is collected
    /// by [`try_next`](Self::try_next) or [`next`](Self::next).
    pub fn submit(&mut self, range: TimeRange) -> u64 {
        let work = self.request(range);
        let generation = self.latest_generation();
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let _ = tx.send(work.await);
        });
        generation
    }

    /// Filter one arrived result: `Some` only if it is still current.
    pub fn accept(&self, recomposed: Recomposed) -> Option<Recomposed> {
        if self.is_current(recomposed.generation) {
            Some(recomposed)
        } else {
            debug!(
                generation = recomposed.generation,
                latest = self.latest_generation(),
                "Dropping stale recomposition"
            );
            None
        }
    }

    /// Current result that has already arrived, if any. Stale results
    /// encountered on the way are dropped.
    pub fn try_next(&mut self) -> Option<Recomposed> {
        while let Ok(recomposed) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if let Some(current) = self.accept(recomposed) {
                return Some(current);
            }
        }
        None
    }

    /// Wait for the next current result. `None` once nothing is in flight.
    pub async fn next(&mut self) -> Option<Recomposed> {
        while self.in_flight > 0 {
            let recomposed = self.rx.recv().await?;
            self.in_flight -= 1;
            if let Some(current) = self.accept(recomposed) {
                return Some(current);
            }
        }
        None
    }

    /// Number of submitted requests whose results have not been collected.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
