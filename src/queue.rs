use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use crate::ring::RingBytes;

struct Node {
    ring: RingBytes,
    next: AtomicPtr<Node>,
}

impl Node {
    fn alloc(capacity: usize) -> *mut Node {
        Box::into_raw(Box::new(Node {
            ring: RingBytes::with_capacity(capacity),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Per-producer unbounded-up-to-ceiling queue of opaque byte records.
///
/// A singly linked chain of `RingBytes` nodes. The producer writes to the
/// newest node and appends a node with doubled capacity when the current one
/// refuses a reservation; the consumer reads from the oldest node and frees
/// it once drained. Node capacities double up to `ceiling`; a write that
/// still doesn't fit at the ceiling is the defined drop condition (counted
/// by the registry, not here).
///
/// Exactly one producer and one consumer for the lifetime of the queue.
/// Node deletion is performed exclusively by the consumer.
pub struct GrowableQueue {
    write_node: AtomicPtr<Node>,
    read_node: AtomicPtr<Node>,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    ceiling: usize,
}

// SAFETY: write_node and the write half of each ring are touched only by the
// producer; read_node and the read half only by the consumer. The byte
// counters are atomics. Cross-thread handoff of new nodes goes through the
// release store on `next` paired with the consumer's acquire load.
unsafe impl Send for GrowableQueue {}
unsafe impl Sync for GrowableQueue {}

impl GrowableQueue {
    pub fn new(initial_capacity: usize, ceiling: usize) -> Self {
        let initial = initial_capacity.next_power_of_two();
        let ceiling = ceiling.next_power_of_two().max(initial);
        let first = Node::alloc(initial);

        Self {
            write_node: AtomicPtr::new(first),
            read_node: AtomicPtr::new(first),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            ceiling,
        }
    }

    /// Reserve `size` contiguous bytes, growing a new node if the current
    /// one refuses. Returns `None` when the write must be dropped.
    ///
    /// Producer side only.
    pub fn reserve_write(&self, size: usize) -> Option<&mut [u8]> {
        if size == 0 {
            return None;
        }

        // SAFETY: write_node is only replaced by this producer, and nodes
        // reachable from it are never freed while the producer can write
        // (the consumer frees a node only after advancing past it, which
        // requires a successor the producer published).
        let node = unsafe { &*self.write_node.load(Ordering::Relaxed) };
        if let Some(slot) = node.ring.reserve(size) {
            return Some(slot);
        }

        self.grow_and_reserve(node, size)
    }

    #[cold]
    fn grow_and_reserve(&self, current: &Node, size: usize) -> Option<&mut [u8]> {
        let capacity = current.ring.capacity();
        if capacity >= self.ceiling || size > self.ceiling {
            return None;
        }

        let mut new_capacity = (capacity * 2).min(self.ceiling);
        while new_capacity < size && new_capacity < self.ceiling {
            new_capacity = (new_capacity * 2).min(self.ceiling);
        }
        if new_capacity < size {
            return None;
        }

        let fresh = Node::alloc(new_capacity);
        // SAFETY: `fresh` is exclusively ours until the release store below
        // publishes it. The reservation cannot fail on an empty ring whose
        // capacity covers `size`.
        let slot = unsafe { (*fresh).ring.reserve(size) };
        debug_assert!(slot.is_some());

        current.next.store(fresh, Ordering::Release);
        self.write_node.store(fresh, Ordering::Release);
        slot
    }

    /// Publish `size` previously reserved bytes. Producer side only.
    pub fn commit_write(&self, size: usize) {
        // SAFETY: see reserve_write.
        let node = unsafe { &*self.write_node.load(Ordering::Relaxed) };
        node.ring.commit_write(size);
        self.bytes_written.fetch_add(size as u64, Ordering::Release);
    }

    /// Borrow `size` readable bytes, advancing across a drained node if its
    /// successor exists. Consumer side only.
    pub fn peek(&self, size: usize) -> Option<&[u8]> {
        let node_ptr = self.read_node.load(Ordering::Relaxed);
        // SAFETY: read_node is only replaced by this consumer, which is also
        // the only thread that frees nodes.
        let node = unsafe { &*node_ptr };
        if let Some(bytes) = node.ring.peek(size) {
            return Some(bytes);
        }

        let next = node.next.load(Ordering::Acquire);
        if next.is_null() || node.ring.available_read() != 0 {
            return None;
        }

        // The read node is drained and has a successor: advance, free the
        // old node, and retry once.
        self.read_node.store(next, Ordering::Relaxed);
        // SAFETY: the producer abandoned `node` when it linked `next`; the
        // consumer owns it exclusively now.
        unsafe { drop(Box::from_raw(node_ptr)) };
        unsafe { (*next).ring.peek(size) }
    }

    /// Advance the read position; frees the read node when it becomes empty
    /// and a successor exists. Consumer side only.
    ///
    /// Any slice returned by `peek` must be released before this is called.
    pub fn commit_read(&self, size: usize) {
        let node_ptr = self.read_node.load(Ordering::Relaxed);
        // SAFETY: see peek.
        let node = unsafe { &*node_ptr };
        node.ring.commit_read(size);
        self.bytes_read.fetch_add(size as u64, Ordering::Release);

        if node.ring.available_read() == 0 {
            let next = node.next.load(Ordering::Acquire);
            if !next.is_null() {
                self.read_node.store(next, Ordering::Relaxed);
                // SAFETY: as in peek, the drained node is ours to free.
                unsafe { drop(Box::from_raw(node_ptr)) };
            }
        }
    }

    /// True when every committed byte has been consumed. Callable from any
    /// thread (used by retirement and reclamation under the registry lock).
    pub fn is_empty(&self) -> bool {
        self.bytes_read.load(Ordering::Acquire) == self.bytes_written.load(Ordering::Acquire)
    }

    /// Capacity of the node currently accepting writes. Producer side only.
    pub fn current_capacity(&self) -> usize {
        // SAFETY: see reserve_write.
        unsafe { &*self.write_node.load(Ordering::Relaxed) }.ring.capacity()
    }

    /// Number of ring nodes currently chained. Consumer side only.
    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.read_node.load(Ordering::Relaxed);
        while !current.is_null() {
            count += 1;
            current = unsafe { &*current }.next.load(Ordering::Acquire);
        }
        count
    }
}

impl Drop for GrowableQueue {
    fn drop(&mut self) {
        let mut current = self.read_node.load(Ordering::Relaxed);
        while !current.is_null() {
            let next = unsafe { &*current }.next.load(Ordering::Relaxed);
            unsafe { drop(Box::from_raw(current)) };
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_record(queue: &GrowableQueue, byte: u8, len: usize) -> bool {
        match queue.reserve_write(len) {
            Some(slot) => {
                slot.fill(byte);
                queue.commit_write(len);
                true
            }
            None => false,
        }
    }

    #[test]
    fn grows_a_doubled_node_on_refusal() {
        let queue = GrowableQueue::new(64, 1024);

        assert_eq!(queue.current_capacity(), 64);
        assert!(write_record(&queue, 1, 48));
        // 32 more would straddle the first node's boundary: a 128-byte node
        // is appended.
        assert!(write_record(&queue, 2, 32));
        assert_eq!(queue.node_count(), 2);
        assert_eq!(queue.current_capacity(), 128);

        let bytes = queue.peek(48).expect("first record");
        assert!(bytes.iter().all(|&b| b == 1));
        queue.commit_read(48);

        // Advancing past the drained first node frees it.
        let bytes = queue.peek(32).expect("second record");
        assert!(bytes.iter().all(|&b| b == 2));
        queue.commit_read(32);
        assert_eq!(queue.node_count(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn grows_until_record_fits() {
        let queue = GrowableQueue::new(64, 4096);

        // 1000 bytes needs two doublings past 128.
        assert!(write_record(&queue, 7, 1000));
        let bytes = queue.peek(1000).expect("large record");
        assert_eq!(bytes.len(), 1000);
        queue.commit_read(1000);
    }

    #[test]
    fn drops_at_the_ceiling() {
        let queue = GrowableQueue::new(64, 128);

        // Fill the 64-byte node, grow to 128, fill that too.
        assert!(write_record(&queue, 1, 64));
        assert!(write_record(&queue, 2, 128));
        // At the ceiling with no room: the defined drop condition.
        assert!(!write_record(&queue, 3, 64));

        // Records larger than the ceiling always drop.
        assert!(!write_record(&queue, 4, 256));

        // Existing data is untouched.
        assert_eq!(queue.peek(64).expect("first").len(), 64);
    }

    #[test]
    fn empty_queue_reports_empty() {
        let queue = GrowableQueue::new(64, 1024);
        assert!(queue.is_empty());
        assert!(queue.peek(1).is_none());
        assert!(write_record(&queue, 9, 16));
        assert!(!queue.is_empty());
        queue.peek(16).expect("record");
        queue.commit_read(16);
        assert!(queue.is_empty());
    }

    #[test]
    fn interleaved_growth_preserves_fifo_across_nodes() {
        let queue = GrowableQueue::new(64, 4096);
        let mut expected = Vec::new();
        for i in 0..200u8 {
            let len = 16 + (i as usize % 3) * 8;
            assert!(write_record(&queue, i, len));
            expected.push((i, len));
        }
        for (byte, len) in expected {
            let bytes = queue.peek(len).expect("record in order");
            assert!(bytes.iter().all(|&b| b == byte));
            queue.commit_read(len);
        }
        assert!(queue.is_empty());
    }
}
