use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::clock;
use crate::config::{Config, DEFAULT_INITIAL_QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY_CEILING};
use crate::queue::GrowableQueue;

/// Per-producer ownership record. The registry's current list, the
/// consumer's snapshot, and the producer's thread-local slot each hold an
/// `Arc` clone, so storage removed from the lists stays valid for as long
/// as any snapshot still references it.
pub(crate) struct QueueHandle {
    pub(crate) queue: GrowableQueue,
    pub(crate) thread: ThreadId,
    pub(crate) created_at: u64,
    pub(crate) orphaned: AtomicBool,
    pub(crate) orphaned_at: AtomicU64,
}

struct Lists {
    /// Authoritative list of live handles, mutated copy-on-write: mutators
    /// build a replacement vector so a previously taken snapshot keeps its
    /// own consistent view.
    current: Vec<Arc<QueueHandle>>,
    /// Handles removed from `current` but possibly still referenced by the
    /// consumer's previous snapshot. Destroyed one reclamation cycle later.
    pending_deletion: Vec<Arc<QueueHandle>>,
}

/// Owns all producer queues for the lifetime of the process.
///
/// The writer mutex serializes registration, retirement, snapshot refresh
/// and reclamation; none of those are on the hot path. Producers touch the
/// mutex once at first use and once at thread exit.
pub(crate) struct Registry {
    lists: Mutex<Lists>,
    add_flag: AtomicBool,
    remove_flag: AtomicBool,
    dropped: AtomicU64,
    initial_queue_capacity: AtomicUsize,
    queue_capacity_ceiling: AtomicUsize,
}

/// Process-wide singleton. A `static` is never destroyed, so a producer
/// thread exiting arbitrarily late always finds it alive.
static REGISTRY: Registry = Registry {
    lists: Mutex::new(Lists {
        current: Vec::new(),
        pending_deletion: Vec::new(),
    }),
    add_flag: AtomicBool::new(false),
    remove_flag: AtomicBool::new(false),
    dropped: AtomicU64::new(0),
    initial_queue_capacity: AtomicUsize::new(DEFAULT_INITIAL_QUEUE_CAPACITY),
    queue_capacity_ceiling: AtomicUsize::new(DEFAULT_QUEUE_CAPACITY_CEILING),
};

pub(crate) fn registry() -> &'static Registry {
    &REGISTRY
}

impl Registry {
    /// Adopt queue sizing from the backend configuration. Applies to queues
    /// created afterwards; existing queues keep their geometry.
    pub(crate) fn configure(&self, config: &Config) {
        self.initial_queue_capacity
            .store(config.initial_queue_capacity.max(1), Ordering::Relaxed);
        self.queue_capacity_ceiling
            .store(config.queue_capacity_ceiling.max(1), Ordering::Relaxed);
    }

    /// Register the calling thread's queue. Called once per producer, on
    /// its first log call.
    fn register(&self) -> Arc<QueueHandle> {
        let handle = Arc::new(QueueHandle {
            queue: GrowableQueue::new(
                self.initial_queue_capacity.load(Ordering::Relaxed),
                self.queue_capacity_ceiling.load(Ordering::Relaxed),
            ),
            thread: thread::current().id(),
            created_at: clock::global().now(),
            orphaned: AtomicBool::new(false),
            orphaned_at: AtomicU64::new(0),
        });

        let mut lists = self.lists.lock().expect("registry mutex poisoned");
        let mut next = lists.current.clone();
        next.push(handle.clone());
        lists.current = next;
        drop(lists);

        self.add_flag.store(true, Ordering::Release);
        handle
    }

    /// Mark a producer's queue as orphaned. Never frees anything here; the
    /// consumer reclaims the queue once it is drained. Retiring a handle
    /// the registry doesn't know is a no-op.
    fn retire(&self, handle: &Arc<QueueHandle>) {
        let lists = self.lists.lock().expect("registry mutex poisoned");
        let known = lists.current.iter().any(|h| Arc::ptr_eq(h, handle));
        if !known {
            return;
        }

        if handle
            .orphaned
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            handle.orphaned_at.store(clock::global().now(), Ordering::Release);
        }
        if handle.queue.is_empty() {
            self.remove_flag.store(true, Ordering::Release);
        }
        drop(lists);
    }

    pub(crate) fn add_dirty(&self) -> bool {
        self.add_flag.load(Ordering::Acquire)
    }

    pub(crate) fn remove_dirty(&self) -> bool {
        self.remove_flag.load(Ordering::Acquire)
    }

    /// Signal that an orphaned queue has been fully drained and can be
    /// removed on the consumer's next refresh.
    pub(crate) fn raise_remove(&self) {
        self.remove_flag.store(true, Ordering::Release);
    }

    /// Refresh the consumer's snapshot.
    ///
    /// When the remove flag is up this also runs the two-phase shift:
    /// handles destroyed now are the ones parked in `pending_deletion` by an
    /// *earlier* refresh — the snapshot replaced back then no longer
    /// references them — and freshly drained orphans move from `current`
    /// into `pending_deletion` to wait out their own cycle.
    pub(crate) fn refresh_snapshot(&self, snapshot: &mut Vec<Arc<QueueHandle>>) {
        let removing = self.remove_flag.swap(false, Ordering::AcqRel);
        let adding = self.add_flag.swap(false, Ordering::AcqRel);
        if !removing && !adding {
            return;
        }

        let mut lists = self.lists.lock().expect("registry mutex poisoned");
        if removing {
            lists.pending_deletion.clear();
            let mut retained = Vec::with_capacity(lists.current.len());
            let mut parked = Vec::new();
            for handle in lists.current.drain(..) {
                if handle.orphaned.load(Ordering::Acquire) && handle.queue.is_empty() {
                    log::debug!(
                        "flashlog retiring queue for {:?} (lived {}ns)",
                        handle.thread,
                        handle
                            .orphaned_at
                            .load(Ordering::Relaxed)
                            .saturating_sub(handle.created_at)
                    );
                    parked.push(handle);
                } else {
                    retained.push(handle);
                }
            }
            lists.current = retained;
            lists.pending_deletion = parked;
        }
        *snapshot = lists.current.clone();
    }

    /// Periodic reclamation between snapshot refreshes: anything parked in
    /// `pending_deletion` has already survived the refresh that unlinked
    /// it, so no snapshot references it any more.
    pub(crate) fn reclaim(&self) {
        let mut lists = self.lists.lock().expect("registry mutex poisoned");
        lists.pending_deletion.clear();
    }

    /// Shutdown reclamation: drain `pending_deletion` and drop every
    /// orphaned, drained handle still in `current`. Handles whose producer
    /// threads are alive stay registered.
    pub(crate) fn reclaim_all(&self) {
        let mut lists = self.lists.lock().expect("registry mutex poisoned");
        lists.pending_deletion.clear();
        let retained = lists
            .current
            .iter()
            .filter(|h| !(h.orphaned.load(Ordering::Acquire) && h.queue.is_empty()))
            .cloned()
            .collect();
        lists.current = retained;
    }

    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn reset_dropped_count(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }
}

/// Atomic drop counter, bumped by any producer whose reservation fails.
pub(crate) fn count_drop() {
    REGISTRY.dropped.fetch_add(1, Ordering::Relaxed);
}

struct ProducerSlot {
    handle: RefCell<Option<Arc<QueueHandle>>>,
}

impl Drop for ProducerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.borrow_mut().take() {
            REGISTRY.retire(&handle);
        }
    }
}

thread_local! {
    static PRODUCER: ProducerSlot = const {
        ProducerSlot {
            handle: RefCell::new(None),
        }
    };
}

/// Run `f` with the calling thread's queue, registering it on first use.
///
/// A submit arriving while the thread's TLS is already being torn down has
/// no queue to land on; the record is dropped and counted.
pub(crate) fn with_producer_queue(f: impl FnOnce(&GrowableQueue)) {
    let outcome = PRODUCER.try_with(|slot| {
        let mut guard = slot.handle.borrow_mut();
        let handle = guard.get_or_insert_with(|| REGISTRY.register());
        f(&handle.queue);
    });
    if outcome.is_err() {
        count_drop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The registry is process-global; these tests only exercise pieces that
    // tolerate shared state. Full lifecycle coverage lives in the
    // integration tests, which run one scenario per process.

    #[test]
    fn drop_counter_accumulates_and_resets() {
        let registry = registry();
        registry.reset_dropped_count();
        count_drop();
        count_drop();
        assert_eq!(registry.dropped_count(), 2);
        registry.reset_dropped_count();
        assert_eq!(registry.dropped_count(), 0);
    }

    #[test]
    fn registration_marks_snapshot_dirty() {
        let registry = registry();
        with_producer_queue(|queue| {
            assert!(queue.is_empty());
        });
        assert!(registry.add_dirty());

        let mut snapshot = Vec::new();
        registry.refresh_snapshot(&mut snapshot);
        assert!(snapshot
            .iter()
            .any(|handle| handle.thread == thread::current().id()));
        assert!(!registry.add_dirty());
    }
}
