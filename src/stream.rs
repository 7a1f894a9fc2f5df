// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// The stream object itself: spec.md §4.2 (lifecycle) and §4.3/§4.4
// (blocking read/write protocols), built on `Buffer` for storage and
// `CountingSemaphore` for the suspend/wake accounting.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    buffer::Buffer,
    descriptor::{Mode, StreamDescriptor},
    error::{Result, StreamError},
    monitor::Monitor,
    semaphore::CountingSemaphore,
    task::{BlockReason, ScanOutcome, TaskHandle},
};

/// Default ring capacity used by `Stream::create` when the caller asks for
/// `0`, mirroring `spsc_queue::Buffer`'s own "at least one slot" floor.
const DEFAULT_CAPACITY: usize = 64;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

struct Binding {
    task: Arc<dyn TaskHandle>,
}

/// Whether a producer's last scan under `Poll` left this stream armed.
#[derive(Debug, Default)]
struct PollMeta {
    is_poll: bool,
}

/// A single bounded, single-producer/single-consumer item stream.
///
/// `Stream` is always handled through an `Arc`: both the descriptor that
/// opened it and, in the `Replace` case, a consumer mid-transition can hold
/// a reference at once, and the object itself outlives any one descriptor.
pub struct Stream<T: Send> {
    uid: u64,
    buffer: Buffer<T>,
    /// Filled slots, minus one if the consumer is blocked on `Read`.
    n_sem: CountingSemaphore,
    /// Free slots, minus one if the producer is blocked on `Write`.
    e_sem: CountingSemaphore,
    prod_lock: Mutex<PollMeta>,
    prod_binding: Mutex<Option<Binding>>,
    cons_binding: Mutex<Option<Binding>>,
}

impl<T: Send> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("uid", &self.uid)
            .field("capacity", &self.buffer.capacity())
            .field("len", &self.buffer.len())
            .finish()
    }
}

impl<T: Send> Stream<T> {
    /// `Create(size)`. `size == 0` picks a default capacity, same as
    /// `spsc_queue::Buffer::new(0)` flooring to one slot, except here we
    /// pick a usable working set rather than the degenerate single slot.
    pub fn create(size: usize) -> Arc<Self> {
        let requested = if size == 0 { DEFAULT_CAPACITY } else { size };
        let buffer = Buffer::new(requested);
        // `Buffer::new` rounds `requested` up to a power of two; `e_sem`
        // must track that rounded capacity `C`, not the request, or
        // `TryWrite`'s side-effect-free `has_space` check (gated on the
        // buffer) and the blocking `Write` path (gated on `e_sem`) disagree
        // about how many free slots actually exist.
        let capacity = buffer.capacity();
        Arc::new(Stream {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            buffer,
            n_sem: CountingSemaphore::new(0),
            e_sem: CountingSemaphore::new(capacity as isize),
            prod_lock: Mutex::new(PollMeta::default()),
            prod_binding: Mutex::new(None),
            cons_binding: Mutex::new(None),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// `Open(s, mode)`: bind a task's handle to one end of this stream and
    /// hand back the descriptor it operates through.
    pub fn open(
        self: &Arc<Self>,
        task: Arc<dyn TaskHandle>,
        mode: Mode,
        monitor: Option<Arc<dyn Monitor>>,
    ) -> Result<Box<StreamDescriptor<T>>> {
        match mode {
            Mode::Read => self.bind_consumer(task.clone())?,
            Mode::Write => self.bind_producer(task.clone())?,
        }
        if let Some(mon) = &monitor {
            mon.stream_open(self.uid, mode);
        }
        Ok(Box::new(StreamDescriptor {
            task,
            stream: self.clone(),
            mode,
            mon: monitor,
        }))
    }

    /// `Destroy(s)`: precondition-checked drop. A stream with live
    /// descriptors or a blocked peer must never be destroyed; those are
    /// programming errors caught here in debug builds.
    pub fn destroy(self: Arc<Self>) {
        debug_assert!(
            !self.has_bound_producer(),
            "destroy: producer descriptor still open"
        );
        debug_assert!(
            !self.has_bound_consumer(),
            "destroy: consumer descriptor still open"
        );
        debug_assert!(!self.has_blocked_peer(), "destroy: a peer is blocked");
        drop(self);
    }

    pub(crate) fn has_blocked_peer(&self) -> bool {
        self.n_sem.get() < 0 || self.e_sem.get() < 0
    }

    pub(crate) fn has_bound_producer(&self) -> bool {
        self.prod_binding.lock().unwrap().is_some()
    }

    pub(crate) fn has_bound_consumer(&self) -> bool {
        self.cons_binding.lock().unwrap().is_some()
    }

    pub(crate) fn bind_producer(&self, task: Arc<dyn TaskHandle>) -> Result<()> {
        let mut slot = self.prod_binding.lock().unwrap();
        if slot.is_some() {
            return Err(StreamError::AlreadyOpen);
        }
        *slot = Some(Binding { task });
        Ok(())
    }

    pub(crate) fn bind_consumer(&self, task: Arc<dyn TaskHandle>) -> Result<()> {
        let mut slot = self.cons_binding.lock().unwrap();
        if slot.is_some() {
            return Err(StreamError::AlreadyOpen);
        }
        *slot = Some(Binding { task });
        Ok(())
    }

    pub(crate) fn unbind_producer(&self) {
        *self.prod_binding.lock().unwrap() = None;
    }

    pub(crate) fn unbind_consumer(&self) {
        *self.cons_binding.lock().unwrap() = None;
    }

    /// `Read(sd)`, spec.md §4.3.
    pub(crate) fn read(&self, task: &Arc<dyn TaskHandle>, mon: Option<&dyn Monitor>) -> T {
        if self.n_sem.claim() {
            if let Some(m) = mon {
                m.stream_blockon(self.uid, BlockReason::Input);
            }
            task.block(BlockReason::Input);
        }

        let item = self.buffer.pop();

        if self.e_sem.release() {
            if let Some(binding) = self.prod_binding.lock().unwrap().as_ref() {
                binding.task.unblock();
            }
            if let Some(m) = mon {
                m.stream_wakeup(self.uid);
            }
        }
        if let Some(m) = mon {
            m.stream_moved(self.uid);
        }
        item
    }

    /// `Write(sd, item)`, spec.md §4.4. Also the engine behind `TryWrite`
    /// once its non-blocking `IsSpace` pre-check has passed.
    pub(crate) fn write(&self, task: &Arc<dyn TaskHandle>, mon: Option<&dyn Monitor>, item: T) {
        if self.e_sem.claim() {
            if let Some(m) = mon {
                m.stream_blockon(self.uid, BlockReason::Output);
            }
            task.block(BlockReason::Output);
        }

        let mut poll_winner: Option<Arc<dyn TaskHandle>> = None;
        {
            let mut meta = self.prod_lock.lock().unwrap();
            debug_assert!(self.buffer.has_space(), "write: no reserved slot");
            self.buffer.push(item);

            if meta.is_poll {
                if let Some(binding) = self.cons_binding.lock().unwrap().as_ref() {
                    if binding.task.poll_token().swap(false, Ordering::AcqRel) {
                        poll_winner = Some(binding.task.clone());
                    }
                }
                meta.is_poll = false;
            }
        }

        if self.n_sem.release() {
            if let Some(binding) = self.cons_binding.lock().unwrap().as_ref() {
                binding.task.unblock();
            }
            if let Some(m) = mon {
                m.stream_wakeup(self.uid);
            }
        } else if let Some(winner) = poll_winner {
            winner.wakeup_slot().store(self.uid, Ordering::Release);
            winner.unblock();
            if let Some(m) = mon {
                m.stream_wakeup(self.uid);
            }
        }

        if let Some(m) = mon {
            m.stream_moved(self.uid);
        }
    }

    /// One step of `Poll`'s scan, spec.md §4.5: under `prod_lock`, check
    /// for a ready item; if found, attempt to claim `poll_token` for the
    /// caller. If not found, arm `is_poll` so a future `Write` knows to
    /// race for the token on the caller's behalf.
    pub(crate) fn scan_for_poll(&self, consumer: &Arc<dyn TaskHandle>) -> ScanOutcome {
        let mut meta = self.prod_lock.lock().unwrap();
        if self.buffer.peek_ready() {
            let won = consumer.poll_token().swap(false, Ordering::AcqRel);
            ScanOutcome::Ready(won)
        } else {
            meta.is_poll = true;
            ScanOutcome::Armed
        }
    }

    /// Clears `is_poll`, undoing `scan_for_poll`'s `Armed` outcome once a
    /// `Poll` call has resolved (spec.md §9, Open Question (i)).
    pub(crate) fn disarm(&self) {
        self.prod_lock.lock().unwrap().is_poll = false;
    }
}
