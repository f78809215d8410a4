//! Elastic worker pool with bounded concurrency.
//!
//! The pool starts with `preallocated` idle slots and grows lazily up to
//! `max_units` when a scheduling tick finds no idle slot. At capacity it
//! signals [`Acquire::Busy`] instead of queueing, so saturation surfaces
//! as dropped iterations rather than being masked by an unbounded queue.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};

/// Handle to an acquired worker slot.
///
/// The ordinal is assigned at slot creation and stays stable for the
/// slot's lifetime; the iteration counter is scoped to the slot. Both
/// feed the sharded payload selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    /// Stable slot index.
    pub ordinal: usize,
    /// Number of iterations this slot has completed before this one.
    pub iteration: u64,
}

/// Result of an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A slot was acquired and is now busy.
    Acquired(SlotHandle),
    /// The pool is at `max_units` with no idle slot.
    Busy,
}

#[derive(Debug)]
struct Slot {
    busy: bool,
    retired: bool,
    iteration: u64,
    idle_since: Instant,
}

#[derive(Debug)]
struct Registry {
    slots: Vec<Slot>,
    live: usize,
}

/// Bounded, elastically-sized set of execution units.
#[derive(Debug)]
pub struct WorkerPool {
    registry: Mutex<Registry>,
    preallocated: usize,
    max_units: usize,
    idle_timeout: Duration,
}

impl WorkerPool {
    /// Creates a pool with `preallocated` eager idle slots, growth bounded
    /// by `max_units`, and idle slots retired after `idle_timeout`.
    pub fn new(preallocated: usize, max_units: usize, idle_timeout: Duration) -> CoreResult<Self> {
        if max_units == 0 {
            return Err(CoreError::invalid_config("max_units must be > 0"));
        }
        if preallocated > max_units {
            return Err(CoreError::invalid_config(format!(
                "preallocated ({preallocated}) exceeds max_units ({max_units})"
            )));
        }
        let now = Instant::now();
        let slots = (0..preallocated)
            .map(|_| Slot {
                busy: false,
                retired: false,
                iteration: 0,
                idle_since: now,
            })
            .collect();
        Ok(Self {
            registry: Mutex::new(Registry {
                slots,
                live: preallocated,
            }),
            preallocated,
            max_units,
            idle_timeout,
        })
    }

    /// Acquires an idle slot, growing the pool if below `max_units`.
    pub fn acquire(&self) -> Acquire {
        let mut registry = self.registry.lock();
        if let Some((ordinal, slot)) = registry
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| !s.retired && !s.busy)
        {
            slot.busy = true;
            return Acquire::Acquired(SlotHandle {
                ordinal,
                iteration: slot.iteration,
            });
        }
        if registry.live < self.max_units {
            let ordinal = registry.slots.len();
            registry.slots.push(Slot {
                busy: true,
                retired: false,
                iteration: 0,
                idle_since: Instant::now(),
            });
            registry.live += 1;
            return Acquire::Acquired(SlotHandle {
                ordinal,
                iteration: 0,
            });
        }
        Acquire::Busy
    }

    /// Returns a slot to the idle set and advances its iteration counter.
    ///
    /// Releasing a handle for a retired or already-idle slot is a no-op.
    pub fn release(&self, handle: SlotHandle) {
        let mut registry = self.registry.lock();
        if let Some(slot) = registry.slots.get_mut(handle.ordinal) {
            if slot.busy && !slot.retired {
                slot.busy = false;
                slot.iteration += 1;
                slot.idle_since = Instant::now();
            }
        }
    }

    /// Retires slots idle longer than the idle timeout, never shrinking
    /// below `preallocated` so a ramp-down cannot flap the pool empty.
    /// Returns the number of slots retired.
    pub fn retire_idle(&self) -> usize {
        let mut guard = self.registry.lock();
        let registry: &mut Registry = &mut guard;
        let mut retired = 0;
        for slot in &mut registry.slots {
            if registry.live - retired <= self.preallocated {
                break;
            }
            if !slot.retired && !slot.busy && slot.idle_since.elapsed() >= self.idle_timeout {
                slot.retired = true;
                retired += 1;
            }
        }
        registry.live -= retired;
        retired
    }

    /// Number of live (non-retired) slots.
    #[must_use]
    pub fn size(&self) -> usize {
        self.registry.lock().live
    }

    /// Number of slots currently executing an iteration.
    #[must_use]
    pub fn busy(&self) -> usize {
        self.registry
            .lock()
            .slots
            .iter()
            .filter(|s| !s.retired && s.busy)
            .count()
    }

    /// Upper bound on concurrent slots.
    #[must_use]
    pub fn max_units(&self) -> usize {
        self.max_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pool(preallocated: usize, max_units: usize) -> WorkerPool {
        WorkerPool::new(preallocated, max_units, Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn grows_lazily_up_to_max_units() {
        let pool = pool(1, 3);
        assert_eq!(pool.size(), 1);

        let a = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!("expected slot"),
        };
        let b = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!("expected growth"),
        };
        let c = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!("expected growth"),
        };
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.acquire(), Acquire::Busy);

        // Ordinals are distinct and stable.
        assert_ne!(a.ordinal, b.ordinal);
        assert_ne!(b.ordinal, c.ordinal);
    }

    #[test]
    fn saturation_signals_busy_not_queueing() {
        let pool = pool(2, 2);
        let _a = pool.acquire();
        let _b = pool.acquire();
        assert_eq!(pool.acquire(), Acquire::Busy);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn release_advances_iteration_counter() {
        let pool = pool(1, 1);
        let first = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!(),
        };
        assert_eq!(first.iteration, 0);
        pool.release(first);

        let second = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!(),
        };
        assert_eq!(second.ordinal, first.ordinal);
        assert_eq!(second.iteration, 1);
    }

    #[test]
    fn retire_idle_keeps_preallocated_floor() {
        let pool = WorkerPool::new(2, 10, Duration::ZERO).unwrap();
        let handles: Vec<_> = (0..6)
            .map(|_| match pool.acquire() {
                Acquire::Acquired(h) => h,
                Acquire::Busy => panic!(),
            })
            .collect();
        assert_eq!(pool.size(), 6);
        for h in handles {
            pool.release(h);
        }

        let retired = pool.retire_idle();
        assert_eq!(retired, 4);
        assert_eq!(pool.size(), 2);

        // Retired again: nothing left above the floor.
        assert_eq!(pool.retire_idle(), 0);
    }

    #[test]
    fn busy_slots_are_never_retired() {
        let pool = WorkerPool::new(0, 4, Duration::ZERO).unwrap();
        let held = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!(),
        };
        let released = match pool.acquire() {
            Acquire::Acquired(h) => h,
            Acquire::Busy => panic!(),
        };
        pool.release(released);

        pool.retire_idle();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.busy(), 1);
        pool.release(held);
    }

    #[test]
    fn concurrent_acquire_never_exceeds_max_units() {
        let pool = Arc::new(pool(0, 8));
        let mut joins = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            joins.push(std::thread::spawn(move || {
                let mut acquired = 0usize;
                for _ in 0..100 {
                    if let Acquire::Acquired(h) = pool.acquire() {
                        acquired += 1;
                        assert!(pool.size() <= 8);
                        pool.release(h);
                    }
                }
                acquired
            }));
        }
        let total: usize = joins.into_iter().map(|j| j.join().unwrap()).sum();
        assert!(total > 0);
        assert!(pool.size() <= 8);
    }

    #[test]
    fn rejects_invalid_bounds() {
        assert!(WorkerPool::new(0, 0, Duration::ZERO).is_err());
        assert!(WorkerPool::new(5, 2, Duration::ZERO).is_err());
    }
}
