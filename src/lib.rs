// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience

//! Lock-free SPSC streams and the multi-stream `Poll` primitive for a
//! cooperative, thread-per-core task layer.
//!
//! A [`Stream`] is a bounded, single-producer/single-consumer item queue.
//! Tasks attach to one end of a stream via [`Stream::open`], getting back
//! a [`StreamDescriptor`] through which they `read`/`write`/`try_write`.
//! [`StreamSet`] groups several read-mode descriptors so a task can
//! [`poll`] all of them at once, waking as soon as any one has data.
//!
//! The scheduler itself — worker threads, task stacks, context switches —
//! is not part of this crate; it is modeled behind the [`TaskHandle`]
//! trait and supplied externally. [`task::ParkTask`] is a reference
//! implementation good enough to exercise the whole API, including in
//! this crate's own tests.

mod buffer;
mod descriptor;
mod error;
mod monitor;
mod poll;
mod semaphore;
mod set;
mod stream;
pub mod task;

pub use descriptor::{Mode, StreamDescriptor};
pub use error::{Result, StreamError};
pub use monitor::{Monitor, NoopMonitor, TracingMonitor};
pub use poll::poll;
pub use set::StreamSet;
pub use stream::Stream;
pub use task::{BlockReason, ParkTask, TaskHandle};
