//! Bounded Semaphore.
//!
//! Not RAII: `release` is a distinct call that can happen on a
//! different task than the one that called `acquire` (a job's submit-queue
//! permit is acquired by the dispatcher and released later by whichever
//! task observes the job reach a terminal state). A `tokio::sync::Semaphore`
//! permit is forgotten on acquire and a fresh one is added back on release;
//! an outstanding-count atomic backs `count()` and guards against
//! over-release.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct BoundedSemaphore {
    inner: Arc<Semaphore>,
    capacity: usize,
    outstanding: AtomicUsize,
}

impl BoundedSemaphore {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded semaphore capacity must be >= 1");
        BoundedSemaphore {
            inner: Arc::new(Semaphore::new(capacity)),
            capacity,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Blocks until a permit is available.
    pub async fn acquire(&self) {
        let permit = self
            .inner
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed");
        permit.forget();
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Non-blocking; returns whether a permit was taken.
    pub fn try_acquire(&self) -> bool {
        match self.inner.clone().try_acquire_owned() {
            Ok(permit) => {
                permit.forget();
                self.outstanding.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns a permit. Must not be called more times than permits were
    /// acquired — doing so is a programming error.
    pub fn release(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        assert!(
            previous > 0,
            "bounded semaphore released more permits than were acquired"
        );
        self.inner.add_permits(1);
    }

    /// Current outstanding permit count. Observational only; may be stale
    /// by the time the caller reads it.
    pub fn count(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn acquire_then_release_returns_count_to_zero() {
        let sem = BoundedSemaphore::new(2);
        sem.acquire().await;
        assert_eq!(sem.count(), 1);
        sem.release();
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn try_acquire_fails_when_capacity_exhausted() {
        let sem = BoundedSemaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    #[should_panic(expected = "released more permits than were acquired")]
    fn over_release_panics() {
        let sem = BoundedSemaphore::new(1);
        sem.release();
    }

    #[tokio::test]
    async fn acquire_blocks_until_a_permit_is_released() {
        let sem = StdArc::new(BoundedSemaphore::new(1));
        sem.acquire().await;

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move {
                sem.acquire().await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        sem.release();
        waiter.await.unwrap();
        assert_eq!(sem.count(), 1);
    }
}
