// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience

use std::fmt;

/// Errors surfaced by the stream API.
///
/// `Read`, `Write` and `Poll` never produce one of these: they either
/// complete or suspend. Only the fallible setup/teardown operations
/// (`Stream::create`, `Stream::open`, `StreamDescriptor::try_write`) return
/// `Result`.
#[derive(Debug)]
pub enum StreamError {
    /// `Stream::open` was called for a mode that already has a bound
    /// descriptor.
    AlreadyOpen,
    /// Allocation failed while creating a stream or descriptor.
    ResourceExhaustion,
    /// `TryWrite` found the buffer full.
    Full,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::AlreadyOpen => {
                write!(f, "stream already has a bound descriptor for this mode")
            }
            StreamError::ResourceExhaustion => write!(f, "allocation failed"),
            StreamError::Full => write!(f, "stream buffer is full"),
        }
    }
}

impl std::error::Error for StreamError {}

pub type Result<T> = std::result::Result<T, StreamError>;
