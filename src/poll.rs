// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// `Poll(ready_set)`, spec.md §4.5: block a task until one of several
// streams it reads from has a ready item, waking exactly once no matter
// how many of them become ready concurrently. The race this resolves:
// a producer may decide to write to a stream the scan already passed, or
// to one the scan hasn't reached yet, at any point during the scan
// itself. `poll_token` (armed before the scan, swapped to claim) and
// `wakeup_slot` (where the winner records its uid) are what let exactly
// one side — the scanning consumer or a racing producer — own the single
// wakeup.

use std::sync::{atomic::Ordering, Arc};

use smallvec::SmallVec;

use crate::{
    monitor::Monitor,
    set::StreamSet,
    task::{BlockReason, ScanOutcome, TaskHandle, NO_WAKEUP},
};

/// Block `task` until some stream in `set` has a ready item, then return
/// that stream's uid.
///
/// `task` must be the same handle bound as consumer to every read-mode
/// descriptor in `set`: `Poll` and the individual `Read`s on those streams
/// share the one `poll_token`/`wakeup_slot` pair on that handle to
/// arbitrate which of them owns the eventual wakeup.
///
/// # Panics
/// If `set` is empty — a precondition violation (spec.md §7), not a
/// recoverable error.
pub fn poll<T: Send>(
    set: &mut StreamSet<T>,
    task: &Arc<dyn TaskHandle>,
    mon: Option<&dyn Monitor>,
) -> u64 {
    assert!(!set.is_empty(), "poll: stream set is empty");

    // Arm: whoever flips this back to `false` first — our own scan, or a
    // producer racing against it — owns setting `wakeup_slot` and waking us.
    task.poll_token().store(true, Ordering::Release);

    let mut activators: SmallVec<[u64; 8]> = SmallVec::new();
    let mut short_circuited = false;

    for sd in set.iter() {
        match sd.stream().scan_for_poll(task) {
            ScanOutcome::Ready(won) => {
                if won {
                    task.wakeup_slot().store(sd.uid(), Ordering::Release);
                    short_circuited = true;
                    break;
                }
                // We found data but lost the token swap to a racing
                // producer elsewhere in the set. That producer stores
                // `wakeup_slot` and calls `unblock` *after* winning, with
                // no happens-before edge to us yet, so we must not read
                // `wakeup_slot` now — keep scanning (and arming) the rest
                // of the set and let `block` synchronize with that store.
            }
            ScanOutcome::Armed => activators.push(sd.uid()),
        }
    }

    if !short_circuited {
        if let Some(m) = mon {
            m.stream_blockon(NO_WAKEUP, BlockReason::AnyIn);
        }
        // If a producer already raced ahead and claimed the token on one
        // of the streams we just armed, `unblock` was already called and
        // this returns immediately rather than suspending.
        task.block(BlockReason::AnyIn);
    }

    debug_assert!(
        !task.poll_token().load(Ordering::Acquire),
        "poll: token still armed after scan/suspend"
    );
    let winner = task.wakeup_slot().swap(NO_WAKEUP, Ordering::AcqRel);

    // Open Question (i), spec.md §9: this loop only ever touches streams
    // this exact call armed, so it can't under- or over-disarm relative to
    // what it marked.
    for uid in activators {
        if let Some(sd) = set.get(uid) {
            sd.stream().disarm();
        }
    }

    debug_assert_ne!(winner, NO_WAKEUP, "poll: resumed with no wakeup recorded");
    set.rotate_after(winner);
    if let Some(m) = mon {
        m.stream_wakeup(winner);
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{descriptor::Mode, monitor::NoopMonitor, stream::Stream, task::ParkTask};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn short_circuits_when_a_stream_is_already_ready() {
        let consumer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("consumer"));
        let producer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("producer"));

        let s1: Arc<Stream<u32>> = Stream::create(4);
        let s2: Arc<Stream<u32>> = Stream::create(4);
        let rd1 = s1.open(consumer.clone(), Mode::Read, None).unwrap();
        let rd2 = s2.open(consumer.clone(), Mode::Read, None).unwrap();
        let wr2 = s2.open(producer.clone(), Mode::Write, None).unwrap();

        wr2.write(7);

        let mut set = StreamSet::new();
        set.insert(rd1);
        set.insert(rd2);

        let won = poll(&mut set, &consumer, Some(&NoopMonitor));
        assert_eq!(won, s2.uid());
        assert_eq!(set.get(s2.uid()).unwrap().peek(), Some(&7));
    }

    #[test]
    fn suspends_until_a_later_write_wakes_it() {
        let consumer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("consumer"));
        let producer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("producer"));

        let s1: Arc<Stream<u32>> = Stream::create(4);
        let s2: Arc<Stream<u32>> = Stream::create(4);
        let rd1 = s1.open(consumer.clone(), Mode::Read, None).unwrap();
        let rd2 = s2.open(consumer.clone(), Mode::Read, None).unwrap();
        let wr2 = s2.open(producer, Mode::Write, None).unwrap();

        let mut set = StreamSet::new();
        set.insert(rd1);
        set.insert(rd2);

        let s2_uid = s2.uid();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            wr2.write(99);
        });

        let won = poll(&mut set, &consumer, None);
        assert_eq!(won, s2_uid);
        handle.join().unwrap();
    }

    #[test]
    fn rotates_so_the_next_poll_starts_after_the_winner() {
        let consumer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("consumer"));
        let producer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("producer"));

        let s1: Arc<Stream<u32>> = Stream::create(4);
        let s2: Arc<Stream<u32>> = Stream::create(4);
        let rd1 = s1.open(consumer.clone(), Mode::Read, None).unwrap();
        let rd2 = s2.open(consumer.clone(), Mode::Read, None).unwrap();
        let wr1 = s1.open(producer, Mode::Write, None).unwrap();

        let s1_uid = s1.uid();
        let s2_uid = s2.uid();

        let mut set = StreamSet::new();
        set.insert(rd1);
        set.insert(rd2);

        wr1.write(1);
        let won = poll(&mut set, &consumer, None);
        assert_eq!(won, s1_uid);

        let order: Vec<u64> = set.iter().map(|sd| sd.uid()).collect();
        assert_eq!(order, vec![s2_uid, s1_uid]);
    }

    #[test]
    #[should_panic(expected = "poll: stream set is empty")]
    fn empty_set_is_a_precondition_violation() {
        let consumer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("consumer"));
        let mut set: StreamSet<u32> = StreamSet::new();
        poll(&mut set, &consumer, None);
    }
}
