// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// The scheduler contract this crate consumes (spec.md §6: `Self()`,
// `Block(reason)`, `Unblock(target)`) plus a reference implementation used
// by this crate's own tests. The production scheduler — worker threads
// pinned to CPUs, task stacks, real context switching — is an external
// collaborator and is not implemented here.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
};

use bitflags::bitflags;

/// Why a task suspended itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Blocked in `Read` on an empty stream.
    Input,
    /// Blocked in `Write` on a full stream.
    Output,
    /// Blocked in `Poll` with every stream in the set empty.
    AnyIn,
}

bitflags! {
    /// Coarse scheduling state, in the style of `glommio::task::state`'s
    /// bitflag task states, reduced to the three transitions spec.md §3
    /// actually names for a task: `Ready ↔ Running ↔ Blocked(reason)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskState: u8 {
        /// Scheduled to run but not currently executing.
        const READY   = 1 << 0;
        /// Currently executing on a worker.
        const RUNNING = 1 << 1;
        /// Suspended at a stream operation, waiting on `Unblock`.
        const BLOCKED = 1 << 2;
    }
}

/// Sentinel meaning "no wakeup has been recorded yet" in a `wakeup_slot`.
/// Stream uids are assigned starting at 1, so 0 is never a live stream.
pub(crate) const NO_WAKEUP: u64 = 0;

/// Result of one step of `Poll`'s per-stream scan (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanOutcome {
    /// The stream had a ready item. The bool is whether the caller's own
    /// swap actually claimed the poll token (`false` means a racing
    /// producer already claimed it for a different stream).
    Ready(bool),
    /// The stream was empty; `is_poll` was armed for a future `Write`.
    Armed,
}

/// The handle a task presents to the stream subsystem.
///
/// A handle is obtained by the caller from its own scheduler context
/// (`Self()`) and passed explicitly into `Stream::open`/`read`/`write`/
/// `poll` — this crate never looks up "the current task" on its own.
pub trait TaskHandle: Send + Sync + fmt::Debug {
    /// One-shot arbiter for `Poll`'s wakeup race (spec.md §4.5, §9). `true`
    /// means armed/unclaimed; claiming is an atomic swap to `false`.
    fn poll_token(&self) -> &AtomicBool;

    /// Set by whoever wins the poll token to the uid of the stream that
    /// became ready, so the waking consumer knows which of its streams to
    /// return from `Poll` once it resumes.
    fn wakeup_slot(&self) -> &AtomicU64;

    /// Suspend the calling task until some peer calls `unblock` on this
    /// same handle. Must only be called by the task the handle belongs to.
    fn block(&self, reason: BlockReason);

    /// Resume a task previously suspended via `block`. Safe to call from
    /// any worker; must not be called by the task being unblocked.
    fn unblock(&self);
}

struct ParkInner {
    name: String,
    state: Mutex<(TaskState, bool)>, // (coarse state, permit)
    cv: Condvar,
    poll_token: AtomicBool,
    wakeup_slot: AtomicU64,
}

/// A `TaskHandle` built on a `Mutex`+`Condvar` binary permit — a
/// "park"/"unpark" pairing robust against the spurious wakeups
/// `std::thread::park` itself documents, since `Block`/`Unblock` in this
/// protocol must never return without a genuine matching `unblock`.
///
/// This is the crate's reference scheduler for its own tests, not a
/// production coroutine runtime: spec.md §1 places worker threads, CPU
/// pinning and task stacks out of this crate's scope.
#[derive(Clone)]
pub struct ParkTask {
    inner: Arc<ParkInner>,
}

impl ParkTask {
    pub fn new(name: impl Into<String>) -> Self {
        ParkTask {
            inner: Arc::new(ParkInner {
                name: name.into(),
                state: Mutex::new((TaskState::READY, false)),
                cv: Condvar::new(),
                poll_token: AtomicBool::new(false),
                wakeup_slot: AtomicU64::new(NO_WAKEUP),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> TaskState {
        self.inner.state.lock().unwrap().0
    }
}

impl fmt::Debug for ParkTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParkTask")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for ParkTask {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
impl Eq for ParkTask {}

impl TaskHandle for ParkTask {
    fn poll_token(&self) -> &AtomicBool {
        &self.inner.poll_token
    }

    fn wakeup_slot(&self) -> &AtomicU64 {
        &self.inner.wakeup_slot
    }

    fn block(&self, reason: BlockReason) {
        tracing::trace!(task = self.name(), ?reason, "blocking");
        let mut guard = self.inner.state.lock().unwrap();
        guard.0 = TaskState::BLOCKED;
        while !guard.1 {
            guard = self.inner.cv.wait(guard).unwrap();
        }
        guard.1 = false;
        guard.0 = TaskState::RUNNING;
        tracing::trace!(task = self.name(), "woken");
    }

    fn unblock(&self) {
        let mut guard = self.inner.state.lock().unwrap();
        guard.1 = true;
        guard.0 = TaskState::READY;
        self.inner.cv.notify_one();
        tracing::trace!(task = self.name(), "unblocked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn unblock_before_block_is_not_lost() {
        let t = ParkTask::new("t");
        t.unblock();
        t.block(BlockReason::Input); // must return immediately, not deadlock
    }

    #[test]
    fn block_waits_for_a_matching_unblock() {
        let t = ParkTask::new("t");
        let t2 = t.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            t2.unblock();
        });
        t.block(BlockReason::Output);
        handle.join().unwrap();
    }

    #[test]
    fn poll_token_and_wakeup_slot_round_trip() {
        let t = ParkTask::new("t");
        assert!(!t.poll_token().swap(true, Ordering::AcqRel));
        assert!(t.poll_token().swap(false, Ordering::AcqRel));
        t.wakeup_slot().store(7, Ordering::Release);
        assert_eq!(t.wakeup_slot().load(Ordering::Acquire), 7);
    }
}
