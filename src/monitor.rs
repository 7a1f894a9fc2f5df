// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// The monitoring hooks consumed from spec.md §6: `StreamOpen`,
// `StreamClose`, `StreamReplace`, `StreamBlockon`, `StreamWakeup`,
// `StreamMoved`. All must be no-throw and cheap, and are never called with
// `prod_lock` held — both of those are structural properties of the call
// sites in `stream.rs`/`poll.rs`, not of this trait.

use crate::{descriptor::Mode, task::BlockReason};

/// Pure observation hooks into the stream subsystem.
///
/// `StreamMoved` intentionally does not forward the item itself: doing so
/// would force `Monitor` to be generic over `T`, coupling every monitoring
/// consumer to every payload type in the process. Consumers that need the
/// payload should wrap `T` themselves before handing it to `Write`.
pub trait Monitor: Send + Sync {
    fn stream_open(&self, _stream_uid: u64, _mode: Mode) {}
    fn stream_close(&self, _stream_uid: u64, _destroyed: bool) {}
    fn stream_replace(&self, _old_uid: u64, _new_uid: u64) {}
    fn stream_blockon(&self, _stream_uid: u64, _reason: BlockReason) {}
    fn stream_wakeup(&self, _stream_uid: u64) {}
    fn stream_moved(&self, _stream_uid: u64) {}
}

/// Zero-cost default: every hook is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {}

/// Ambient observability via `tracing`, for deployments that want it
/// without writing their own `Monitor`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn stream_open(&self, stream_uid: u64, mode: Mode) {
        tracing::trace!(stream = stream_uid, ?mode, "stream open");
    }

    fn stream_close(&self, stream_uid: u64, destroyed: bool) {
        tracing::trace!(stream = stream_uid, destroyed, "stream close");
    }

    fn stream_replace(&self, old_uid: u64, new_uid: u64) {
        tracing::trace!(old = old_uid, new = new_uid, "stream replace");
    }

    fn stream_blockon(&self, stream_uid: u64, reason: BlockReason) {
        tracing::debug!(stream = stream_uid, ?reason, "blocking on stream");
    }

    fn stream_wakeup(&self, stream_uid: u64) {
        tracing::debug!(stream = stream_uid, "stream wakeup");
    }

    fn stream_moved(&self, stream_uid: u64) {
        tracing::trace!(stream = stream_uid, "item moved");
    }
}
