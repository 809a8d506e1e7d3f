//! Double-buffered per-signal scalar storage.
//!
//! One `SignalStore` backs every concrete input: a back half the ingest
//! thread fills while the consume thread reads the front half, and a swap
//! that flips the two. There is no lock in here; the pipeline handshake is
//! the synchronization.
//!
//! # Protocol
//!
//! - `back_mut` and `swap` are called by the **ingest** thread only.
//! - `front` is called by the **consume** thread only, and only while the
//!   consumer owns the current event (between its handshake wait and its
//!   sequence increment).
//! - `swap` runs only while the consumer is parked on the handshake
//!   condition variable (the pipeline guarantees `input_seq == event_seq`
//!   and holds the handshake lock), so it never races `front`.
//!
//! # Safety
//!
//! The two halves are separate allocations behind separate `UnsafeCell`s:
//! the ingest thread's exclusive reference into the back half never aliases
//! the consumer's shared reference into the front half. The handshake lock
//! that brackets `swap` also provides the release/acquire edge that makes
//! the swapped contents visible to the consumer.

use std::cell::UnsafeCell;

use skarn_value::{Scalar, SigType};

/// One member buffer: a hit vector and the type its scalars carry.
#[derive(Debug, Default)]
pub struct SignalBuf {
    pub ty: SigType,
    pub v: Vec<Scalar>,
}

pub struct SignalStore {
    back: UnsafeCell<Vec<SignalBuf>>,
    front: UnsafeCell<Vec<SignalBuf>>,
}

// SAFETY: interior access is partitioned between the two pipeline threads as
// documented in the module docs; the handshake serializes the swap.
unsafe impl Sync for SignalStore {}

impl SignalStore {
    /// Allocates `n` buffers per half, all typed `ty`.
    pub fn new(n: usize, ty: SigType) -> Self {
        let mk = || {
            (0..n)
                .map(|_| SignalBuf { ty, v: Vec::new() })
                .collect::<Vec<_>>()
        };
        SignalStore {
            back: UnsafeCell::new(mk()),
            front: UnsafeCell::new(mk()),
        }
    }

    /// Allocates from an explicit per-buffer type list.
    pub fn with_types(types: &[SigType]) -> Self {
        let mk = || {
            types
                .iter()
                .map(|&ty| SignalBuf { ty, v: Vec::new() })
                .collect::<Vec<_>>()
        };
        SignalStore {
            back: UnsafeCell::new(mk()),
            front: UnsafeCell::new(mk()),
        }
    }

    pub fn len(&self) -> usize {
        // SAFETY: reads only the vector length, which is fixed after new().
        unsafe { (*self.front.get()).len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ingest-thread access to the background half.
    ///
    /// # Safety
    /// Caller is the ingest thread and no call to `swap` is in flight.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn back_mut(&self) -> &mut Vec<SignalBuf> {
        unsafe { &mut *self.back.get() }
    }

    /// Flips the halves. Ingest thread only, consumer parked.
    ///
    /// # Safety
    /// Caller holds the pipeline handshake lock with `input_seq ==
    /// event_seq`, so no reference into either half is live.
    pub unsafe fn swap(&self) {
        unsafe { std::ptr::swap(self.back.get(), self.front.get()) }
    }

    /// Consume-thread view of one foreground buffer. Out-of-range ids read
    /// as an empty U64 buffer, the "signal absent this event" case.
    ///
    /// # Safety
    /// Caller is the consume thread, inside its event window.
    pub unsafe fn front(&self, id: usize) -> (&[Scalar], SigType) {
        let front = unsafe { &*self.front.get() };
        match front.get(id) {
            Some(buf) => (&buf.v, buf.ty),
            None => (&[], SigType::U64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_flips_the_halves() {
        let store = SignalStore::new(2, SigType::U64);
        unsafe {
            store.back_mut()[0].v.push(Scalar::from_u64(42));
            let (front, _) = store.front(0);
            assert!(front.is_empty());
            store.swap();
            let (front, ty) = store.front(0);
            assert_eq!(front.len(), 1);
            assert_eq!(front[0].u64(), 42);
            assert_eq!(ty, SigType::U64);
        }
    }

    #[test]
    fn missing_buffer_reads_empty() {
        let store = SignalStore::new(1, SigType::F64);
        let (front, ty) = unsafe { store.front(7) };
        assert!(front.is_empty());
        assert_eq!(ty, SigType::U64);
    }
}
