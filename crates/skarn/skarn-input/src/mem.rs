//! Canned in-memory input for tests, benches and demos.
//!
//! Holds a list of prebaked events; each `fetch` copies the next one into
//! the background half. Follows the same thread protocol as every input,
//! though most users drive it single-threaded.

use std::cell::UnsafeCell;

use skarn_value::{Scalar, SigType};

use crate::buffers::SignalStore;
use crate::{Input, InputError};

/// One prebaked event: hit vectors indexed by buffer id.
pub type Event = Vec<Vec<Scalar>>;

pub struct MemoryInput {
    events: Vec<Event>,
    cursor: UnsafeCell<usize>,
    looped: bool,
    store: SignalStore,
}

// SAFETY: `cursor` is touched by fetch only (ingest thread); the store
// partitions its halves per the SignalStore protocol.
unsafe impl Sync for MemoryInput {}

impl MemoryInput {
    pub fn new(types: &[SigType], events: Vec<Event>) -> Self {
        MemoryInput {
            events,
            cursor: UnsafeCell::new(0),
            looped: false,
            store: SignalStore::with_types(types),
        }
    }

    /// Replays the event list forever instead of ending the stream; used by
    /// benches that need an inexhaustible source.
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    /// Events built from u64 hits, the common case in tests.
    pub fn from_u64(n_buffers: usize, events: Vec<Vec<Vec<u64>>>) -> Self {
        let events = events
            .into_iter()
            .map(|ev| {
                let mut bufs: Event = vec![Vec::new(); n_buffers];
                for (i, vals) in ev.into_iter().enumerate() {
                    bufs[i] = vals.into_iter().map(Scalar::from_u64).collect();
                }
                bufs
            })
            .collect();
        MemoryInput::new(&vec![SigType::U64; n_buffers], events)
    }
}

impl Input for MemoryInput {
    fn fetch(&self) -> Result<bool, InputError> {
        // SAFETY: ingest thread only, per the input protocol.
        let cursor = unsafe { &mut *self.cursor.get() };
        let bufs = unsafe { self.store.back_mut() };

        if *cursor >= self.events.len() && self.looped && !self.events.is_empty() {
            *cursor = 0;
        }
        let Some(event) = self.events.get(*cursor) else {
            return Ok(false);
        };
        *cursor += 1;
        for (buf, hits) in bufs.iter_mut().zip(event) {
            buf.v.clear();
            buf.v.extend_from_slice(hits);
        }
        Ok(true)
    }

    fn buffer(&self) {
        // SAFETY: ingest thread under the handshake lock, consumer parked.
        unsafe { self.store.swap() }
    }

    fn data(&self, buffer_id: usize) -> (&[Scalar], SigType) {
        // SAFETY: consume thread, inside its event window.
        unsafe { self.store.front(buffer_id) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_events_in_order() {
        let input = MemoryInput::from_u64(2, vec![
            vec![vec![1, 2], vec![10]],
            vec![vec![3], vec![]],
        ]);

        assert!(input.fetch().unwrap());
        input.buffer();
        assert_eq!(input.data(0).0.len(), 2);
        assert_eq!(input.data(1).0[0].u64(), 10);

        assert!(input.fetch().unwrap());
        input.buffer();
        assert_eq!(input.data(0).0[0].u64(), 3);
        assert!(input.data(1).0.is_empty());

        assert!(!input.fetch().unwrap());
    }
}
