//! Counting gate bounding how many files are processed at once.
//!
//! # Usage
//!
//! ```
//! use dz_bus::ConcurrencyGate;
//!
//! # async fn example() {
//! let gate = ConcurrencyGate::new(2);
//! if let Some(_permit) = gate.acquire().await {
//!     // file I/O happens here; the slot is released when `_permit` drops
//! }
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore with `max(1, n)` slots plus in-flight instrumentation.
///
/// Cloning shares the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    semaphore: Arc<Semaphore>,
    slots: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ConcurrencyGate {
    /// Creates a gate with `slots` permits; zero is treated as one.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(slots)),
                slots,
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits for a free slot.
    ///
    /// Returns `None` once the gate has been [closed](Self::close).
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = Arc::clone(&self.inner.semaphore).acquire_owned().await.ok()?;
        Some(self.admit(permit))
    }

    /// Takes a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let permit = Arc::clone(&self.inner.semaphore).try_acquire_owned().ok()?;
        Some(self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        GatePermit {
            _permit: permit,
            gate: Arc::clone(&self.inner),
        }
    }

    /// Wakes every waiter with `None` and refuses new acquisitions.
    ///
    /// Permits already handed out stay valid until dropped.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn slots(&self) -> usize {
        self.inner.slots
    }

    /// Returns the number of permits currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the highest number of permits held at the same time.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Returns the number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }
}

/// A held slot; released on drop regardless of how processing ended.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    gate: Arc<GateInner>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_zero_slots_means_one() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.slots(), 1);
        let held = gate.try_acquire();
        assert!(held.is_some());
        assert!(gate.try_acquire().is_none());
    }

    #[test]
    fn test_permit_release_on_drop() {
        let gate = ConcurrencyGate::new(2);
        let a = gate.try_acquire().unwrap();
        let b = gate.try_acquire().unwrap();
        assert_eq!(gate.in_flight(), 2);
        assert_eq!(gate.available(), 0);

        drop(a);
        assert_eq!(gate.in_flight(), 1);
        assert_eq!(gate.available(), 1);
        drop(b);
        assert_eq!(gate.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.close();

        assert!(waiter.await.unwrap());
        drop(held);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bound_holds_under_burst() {
        const SLOTS: usize = 3;
        let gate = ConcurrencyGate::new(SLOTS);
        let observed = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let gate = gate.clone();
                let observed = Arc::clone(&observed);
                tokio::spawn(async move {
                    let _permit = gate.acquire().await.unwrap();
                    observed.fetch_max(gate.in_flight(), Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(observed.load(Ordering::SeqCst) <= SLOTS);
        assert!(gate.peak_in_flight() <= SLOTS);
        assert_eq!(gate.in_flight(), 0);
    }
}
