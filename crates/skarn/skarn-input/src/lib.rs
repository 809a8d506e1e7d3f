//! Input side of the monitor: the pull contract an event source satisfies,
//! plus the double-buffered per-signal scalar store shared between the
//! ingest and consume threads.
//!
//! An input is driven from two threads with a strict alternation enforced by
//! the pipeline handshake:
//!
//! - the **ingest** thread calls [`Input::fetch`] (may block on I/O) and,
//!   once the consumer has drained the previous event, [`Input::buffer`];
//! - the **consume** thread calls [`Input::data`] while evaluating one
//!   event, strictly between two `buffer` calls.
//!
//! Signals the source cannot provide read as empty slices; the graph treats
//! them as absent for that event.

pub mod buffers;
pub mod mem;
pub mod stream;

pub use buffers::SignalStore;
pub use mem::MemoryInput;
pub use stream::StreamInput;

use skarn_value::{Scalar, SigType};

/// Which member of a compound signal a bound buffer feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Id,
    End,
    V,
}

/// A signal the configuration wants, as named member buffers. Empty member
/// names mean "not declared"; the source decides what it can serve.
#[derive(Clone, Debug)]
pub struct SignalRequest {
    /// Source location of the declaration, for diagnostics.
    pub loc: String,
    pub name: String,
    pub id: String,
    pub end: String,
    pub v: String,
}

/// The graph side of input construction: the source asks which signals are
/// wanted and reports back, per member, the buffer id and scalar type it
/// will serve them under.
pub trait SignalBinder {
    fn requests(&self) -> Vec<SignalRequest>;
    fn bind(
        &self,
        name: &str,
        member: MemberKind,
        buffer_id: usize,
        ty: SigType,
    ) -> Result<(), InputError>;
}

/// One event source. See the module docs for the two-thread protocol.
pub trait Input {
    /// Pulls one event into the background buffer. `Ok(false)` is
    /// end-of-stream; streaming sources may produce more data later, so the
    /// pipeline retries rather than exiting.
    fn fetch(&self) -> Result<bool, InputError>;

    /// Commits the fetched event: flips the background buffer to the
    /// foreground slot read by `data`.
    fn buffer(&self);

    /// Scalars of one bound member buffer for the current event.
    fn data(&self, buffer_id: usize) -> (&[Scalar], SigType);
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to open '{path}'")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read error on '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{loc}: input told to bind unknown signal '{name}'")]
    UnknownSignal { loc: String, name: String },

    #[error("{loc}: signal member '{name}' must be integer typed")]
    NonIntegerMember { loc: String, name: String },

    #[error("{loc}: signal member '{name}' bound twice")]
    MemberRebound { loc: String, name: String },
}
