// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience

use std::{fmt, sync::Arc};

use crate::{
    error::{Result, StreamError},
    monitor::Monitor,
    stream::Stream,
    task::TaskHandle,
};

/// Which end of a stream a descriptor binds its owning task to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// A task's handle for one end of one stream, in one direction.
///
/// This is the only object a task manipulates after `Stream::open`. It is
/// deliberately *not* `Clone` — same reasoning as
/// `glommio::channels::spsc_queue::{Producer, Consumer}` not being `Clone`:
/// two tasks racing on `Read`/`Write` for the same end would violate the
/// SPSC guarantee the whole subsystem relies on.
pub struct StreamDescriptor<T: Send> {
    pub(crate) task: Arc<dyn TaskHandle>,
    pub(crate) stream: Arc<Stream<T>>,
    pub(crate) mode: Mode,
    pub(crate) mon: Option<Arc<dyn Monitor>>,
}

impl<T: Send> fmt::Debug for StreamDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("stream_uid", &self.stream.uid())
            .field("mode", &self.mode)
            .finish()
    }
}

impl<T: Send> StreamDescriptor<T> {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `Get(sd)`: the stream this descriptor is currently bound to.
    pub fn stream(&self) -> &Arc<Stream<T>> {
        &self.stream
    }

    pub fn uid(&self) -> u64 {
        self.stream.uid()
    }

    /// `Peek(sd)`: the item currently at the head of the buffer, if any,
    /// without consuming it. Idempotent as long as no `Read`/`Write`
    /// happens in between. Read-mode only.
    pub fn peek(&self) -> Option<&T> {
        debug_assert_eq!(self.mode, Mode::Read, "peek on a write-mode descriptor");
        self.stream.buffer.peek_value()
    }

    /// `Read(sd)`: spec.md §4.3. Blocks until an item is available.
    pub fn read(&self) -> T {
        debug_assert_eq!(self.mode, Mode::Read, "read on a write-mode descriptor");
        self.stream.read(&self.task, self.mon.as_deref())
    }

    /// `Write(sd, item)`: spec.md §4.4. Blocks until there is room.
    pub fn write(&self, item: T) {
        debug_assert_eq!(self.mode, Mode::Write, "write on a read-mode descriptor");
        self.stream.write(&self.task, self.mon.as_deref(), item);
    }

    /// `TryWrite(sd, item)`: spec.md §4.4. Never blocks.
    pub fn try_write(&self, item: T) -> Result<()> {
        debug_assert_eq!(self.mode, Mode::Write, "try_write on a read-mode descriptor");
        if !self.stream.buffer.has_space() {
            return Err(StreamError::Full);
        }
        self.stream.write(&self.task, self.mon.as_deref(), item);
        Ok(())
    }

    /// `Replace(sd, snew)`: spec.md §4.2. Read-mode only; `snew` must not
    /// already have a bound consumer.
    pub fn replace(&mut self, new_stream: Arc<Stream<T>>) -> Result<()> {
        assert_eq!(
            self.mode,
            Mode::Read,
            "Replace is only valid for read-mode descriptors"
        );
        new_stream.bind_consumer(self.task.clone())?;

        // Open Question (ii) in spec.md §9: the old stream's producer side
        // must be vacant before we tear it down from under a bound writer.
        debug_assert!(
            !self.stream.has_bound_producer(),
            "Replace: old stream still has a bound producer"
        );

        let old_uid = self.stream.uid();
        self.stream.unbind_consumer();
        if let Some(mon) = &self.mon {
            mon.stream_replace(old_uid, new_stream.uid());
        }
        self.stream = new_stream;
        Ok(())
    }

    /// `Close(sd, destroy)`: releases this descriptor, clearing the
    /// stream's corresponding binding. If `destroy` is set and this was the
    /// last descriptor, the stream's memory is reclaimed when the last
    /// `Arc` drops.
    pub fn close(self, destroy: bool) {
        debug_assert!(
            !self.stream.has_blocked_peer(),
            "Close: a peer is still blocked on this stream"
        );
        if let Some(mon) = &self.mon {
            mon.stream_close(self.stream.uid(), destroy);
        }
        match self.mode {
            Mode::Read => self.stream.unbind_consumer(),
            Mode::Write => self.stream.unbind_producer(),
        }
        if destroy {
            debug_assert_eq!(
                Arc::strong_count(&self.stream),
                1,
                "Close(destroy=true): other references to the stream are still live"
            );
        }
        // Dropping `self` here releases this descriptor's own `Arc<Stream<T>>`.
        // When `destroy` was requested and this really was the last
        // reference, that drop is the stream's destruction; the `debug_assert`
        // above is what actually enforces the documented precondition.
    }
}
