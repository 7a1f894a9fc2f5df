// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// Adapted from the bounded SPSC ring in `glommio::channels::spsc_queue`:
// same FastForward-style layout (cache-line-separated producer/consumer
// cursors, per-slot `has_value` flag instead of a null-pointer sentinel,
// lookahead batching of the emptiness probe), generalized to be driven by
// an external blocking protocol (`Stream`) instead of being used bare with
// spin-polling `try_push`/`try_pop`.

use std::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crossbeam::utils::CachePadded;

#[derive(Debug)]
struct ProducerCacheline {
    /// Index position of the current tail.
    tail: AtomicUsize,
    /// Cached "known free up to" position; advanced in batches via the
    /// lookahead probe below to avoid checking the immediately-following
    /// slot on every single push.
    limit: AtomicUsize,
}

#[derive(Debug)]
struct ConsumerCacheline {
    /// Index position of the current head.
    head: AtomicUsize,
}

struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    has_value: AtomicBool,
}

// SAFETY: a `Slot<T>` is only ever written by the single producer and read
// by the single consumer; the `has_value` flag's Acquire/Release pairing is
// what makes that handoff safe across threads.
unsafe impl<T: Send> Sync for Slot<T> {}

/// The bounded ring shared between exactly one producer and one consumer.
///
/// This type enforces no blocking of its own; `has_space`/`push`/`pop` all
/// assume the caller (`Stream`) has already arbitrated who may call them
/// and when, via the counting semaphores.
pub(crate) struct Buffer<T> {
    storage: Box<[Slot<T>]>,
    capacity: usize,
    mask: usize,
    lookahead: usize,
    pcache: CachePadded<ProducerCacheline>,
    ccache: CachePadded<ConsumerCacheline>,
}

// SAFETY: see `Slot<T>`.
unsafe impl<T: Send> Sync for Buffer<T> {}

const MAX_LOOKAHEAD: usize = 1 << 12;

impl<T> Buffer<T> {
    pub(crate) fn new(requested_capacity: usize) -> Self {
        let capacity = requested_capacity.max(1).next_power_of_two();
        let storage = std::iter::repeat_with(|| Slot {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            has_value: AtomicBool::new(false),
        })
        .take(capacity)
        .collect::<Vec<_>>()
        .into_boxed_slice();

        Buffer {
            storage,
            capacity,
            mask: capacity - 1,
            lookahead: (capacity / 4).clamp(1, MAX_LOOKAHEAD),
            pcache: CachePadded::new(ProducerCacheline {
                tail: AtomicUsize::new(0),
                limit: AtomicUsize::new(0),
            }),
            ccache: CachePadded::new(ConsumerCacheline {
                head: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current occupancy. Diagnostic only; the source of truth for
    /// suspension decisions is the pair of counting semaphores in `Stream`.
    pub(crate) fn len(&self) -> usize {
        let tail = self.pcache.tail.load(Ordering::Acquire);
        let head = self.ccache.head.load(Ordering::Acquire);
        std::cmp::min(self.capacity, tail.wrapping_sub(head))
    }

    /// Non-destructive emptiness probe on the head slot. Side-effect free,
    /// so it is safe to call under `prod_lock` from the producer side
    /// during `Poll`'s scan, or from the consumer itself.
    pub(crate) fn peek_ready(&self) -> bool {
        let head = self.ccache.head.load(Ordering::Relaxed);
        self.storage[head & self.mask]
            .has_value
            .load(Ordering::Acquire)
    }

    /// Non-destructive read of the head item, if any. Safe because only
    /// the single consumer ever calls this or `pop`, so no other thread can
    /// observe or mutate the slot `Read` borrows from here.
    pub(crate) fn peek_value(&self) -> Option<&T> {
        let head = self.ccache.head.load(Ordering::Relaxed);
        let slot = &self.storage[head & self.mask];
        if slot.has_value.load(Ordering::Acquire) {
            Some(unsafe { (&*slot.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Non-destructive, side-effect-free check of whether `push` would
    /// currently succeed. Used by `TryWrite`, which must not mutate state
    /// on a false result.
    pub(crate) fn has_space(&self) -> bool {
        let tail = self.pcache.tail.load(Ordering::Relaxed);
        let limit = self.pcache.limit.load(Ordering::Relaxed);
        if tail != limit {
            return true;
        }
        let idx = tail.wrapping_add(self.lookahead);
        let slot = &self.storage[idx & self.mask];
        if !slot.has_value.load(Ordering::Acquire) {
            return true;
        }
        !self.storage[tail & self.mask]
            .has_value
            .load(Ordering::Acquire)
    }

    /// Remove and return the head item.
    ///
    /// # Panics (debug only)
    /// If the head slot is empty. Callers must have already established,
    /// via the counting semaphore, that a filled slot exists.
    pub(crate) fn pop(&self) -> T {
        let head = self.ccache.head.load(Ordering::Relaxed);
        let slot = &self.storage[head & self.mask];
        debug_assert!(
            slot.has_value.load(Ordering::Acquire),
            "pop() called on an empty head slot"
        );
        let v = unsafe { slot.value.get().read().assume_init() };
        slot.has_value.store(false, Ordering::Release);
        self.ccache
            .head
            .store(head.wrapping_add(1), Ordering::Relaxed);
        v
    }

    /// Append an item at the tail, advancing the lookahead cache as needed.
    ///
    /// # Panics (debug only)
    /// If the buffer is actually full. Callers must have already
    /// established, via the counting semaphore, that a free slot exists.
    pub(crate) fn push(&self, v: T) {
        let tail = self.pcache.tail.load(Ordering::Relaxed);
        let limit = self.pcache.limit.load(Ordering::Relaxed);

        if tail == limit {
            let idx = tail.wrapping_add(self.lookahead);
            let slot = &self.storage[idx & self.mask];
            if !slot.has_value.load(Ordering::Acquire) {
                self.pcache.limit.store(idx, Ordering::Relaxed);
            } else {
                let slot0 = &self.storage[tail & self.mask];
                debug_assert!(
                    !slot0.has_value.load(Ordering::Acquire),
                    "push() called without a reserved slot"
                );
                self.pcache
                    .limit
                    .store(tail.wrapping_add(1), Ordering::Relaxed);
            }
        }

        let slot = &self.storage[tail & self.mask];
        unsafe {
            slot.value.get().write(MaybeUninit::new(v));
        }
        slot.has_value.store(true, Ordering::Release);
        self.pcache
            .tail
            .store(tail.wrapping_add(1), Ordering::Relaxed);
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        while self.peek_ready() {
            drop(self.pop());
        }
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_capacity_up_to_a_power_of_two() {
        let b: Buffer<u32> = Buffer::new(10);
        assert_eq!(b.capacity(), 16);
    }

    #[test]
    fn fifo_order_round_trip() {
        let b = Buffer::new(4);
        b.push(10);
        b.push(20);
        b.push(30);
        assert_eq!(b.pop(), 10);
        assert_eq!(b.pop(), 20);
        assert_eq!(b.pop(), 30);
    }

    #[test]
    fn has_space_is_side_effect_free() {
        let b: Buffer<u32> = Buffer::new(2);
        assert!(b.has_space());
        assert!(b.has_space());
        b.push(1);
        b.push(2);
        assert!(!b.has_space());
        assert!(!b.has_space());
        assert_eq!(b.pop(), 1);
        assert!(b.has_space());
    }

    #[test]
    fn peek_ready_does_not_consume() {
        let b = Buffer::new(2);
        assert!(!b.peek_ready());
        b.push(42);
        assert!(b.peek_ready());
        assert!(b.peek_ready());
        assert_eq!(b.pop(), 42);
        assert!(!b.peek_ready());
    }

    #[test]
    fn peek_value_does_not_consume() {
        let b = Buffer::new(2);
        assert_eq!(b.peek_value(), None);
        b.push(42);
        assert_eq!(b.peek_value(), Some(&42));
        assert_eq!(b.peek_value(), Some(&42));
        assert_eq!(b.pop(), 42);
        assert_eq!(b.peek_value(), None);
    }

    #[test]
    fn wraps_around_capacity() {
        let b = Buffer::new(2);
        for i in 0..100u32 {
            b.push(i);
            assert_eq!(b.pop(), i);
        }
    }

    #[test]
    fn drop_runs_destructors_for_remaining_items() {
        use std::rc::Rc;
        let marker = Rc::new(());
        let b = Buffer::new(4);
        b.push(marker.clone());
        b.push(marker.clone());
        assert_eq!(Rc::strong_count(&marker), 3);
        drop(b);
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
