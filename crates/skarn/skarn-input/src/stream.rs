//! Framed binary stream input.
//!
//! A deliberately simple streaming protocol for piping events into the
//! monitor from anything that can write bytes, little-endian throughout:
//!
//! ```text
//! 8 bytes   magic "SKARNEVT"
//! u32       number of signals
//! per signal:
//!   c-string  name (NUL terminated)
//!   u32       number of values
//!   u32 * n   values
//! ```
//!
//! Signals the configuration never asked for are decoded and dropped.
//! A garbled stream resyncs by scanning for the next magic. Every value is
//! served as a U64 scalar bound to the signal's `v` member.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use skarn_value::{Scalar, SigType};
use tracing::{debug, info};

use crate::buffers::SignalStore;
use crate::{Input, InputError, MemberKind, SignalBinder};

const MAGIC: &[u8; 8] = b"SKARNEVT";

/// Producer-thread state: the byte source and its working buffer.
struct BackHalf {
    path: String,
    src: Box<dyn Read + Send>,
    buf: Vec<u8>,
    len: usize,
}

pub struct StreamInput {
    back: UnsafeCell<BackHalf>,
    store: SignalStore,
    /// Signal name -> buffer id, fixed after construction.
    lookup: HashMap<String, usize>,
}

// SAFETY: `back` is touched by the ingest thread only (fetch); the store
// partitions its halves per the SignalStore protocol.
unsafe impl Sync for StreamInput {}

impl StreamInput {
    /// Opens `path` ("-" for stdin) and binds every requested signal's `v`
    /// member as a U64 buffer.
    pub fn open(path: &str, binder: &dyn SignalBinder) -> Result<Self, InputError> {
        let src: Box<dyn Read + Send> = if path == "-" {
            Box::new(std::io::stdin())
        } else {
            Box::new(File::open(path).map_err(|source| InputError::Open {
                path: path.to_string(),
                source,
            })?)
        };

        let requests = binder.requests();
        let mut lookup = HashMap::new();
        for (i, req) in requests.iter().enumerate() {
            lookup.insert(req.name.clone(), i);
            binder.bind(&req.name, MemberKind::V, i, SigType::U64)?;
        }
        info!(path, signals = requests.len(), "stream input bound");

        Ok(StreamInput {
            back: UnsafeCell::new(BackHalf {
                path: path.to_string(),
                src,
                buf: vec![0; 1 << 16],
                len: 0,
            }),
            store: SignalStore::new(requests.len(), SigType::U64),
            lookup,
        })
    }
}

impl BackHalf {
    /// Ensures `n` bytes are buffered; `Ok(false)` on end-of-stream.
    fn want(&mut self, n: usize) -> Result<bool, InputError> {
        while self.len < n {
            let rc = self
                .src
                .read(&mut self.buf[self.len..n])
                .map_err(|source| InputError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            if rc == 0 {
                debug!(path = %self.path, "end of stream");
                return Ok(false);
            }
            self.len += rc;
        }
        Ok(true)
    }

    /// Drops `n` consumed bytes from the front of the buffer.
    fn shift(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    fn take_u32(&mut self) -> Result<Option<u32>, InputError> {
        if !self.want(4)? {
            return Ok(None);
        }
        let v = u32::from_le_bytes(self.buf[..4].try_into().unwrap());
        self.shift(4);
        Ok(Some(v))
    }
}

impl Input for StreamInput {
    fn fetch(&self) -> Result<bool, InputError> {
        // SAFETY: ingest thread only, per the input protocol.
        let back = unsafe { &mut *self.back.get() };
        let bufs = unsafe { self.store.back_mut() };

        for buf in bufs.iter_mut() {
            buf.v.clear();
        }

        // Resync: scan for the frame magic.
        loop {
            if !back.want(MAGIC.len())? {
                return Ok(false);
            }
            if &back.buf[..MAGIC.len()] == MAGIC {
                back.shift(MAGIC.len());
                break;
            }
            back.shift(1);
        }

        let Some(sig_n) = back.take_u32()? else {
            return Ok(false);
        };
        for _ in 0..sig_n {
            let mut name = Vec::new();
            loop {
                if !back.want(1)? {
                    return Ok(false);
                }
                let c = back.buf[0];
                back.shift(1);
                if c == 0 {
                    break;
                }
                name.push(c);
            }
            let target = std::str::from_utf8(&name)
                .ok()
                .and_then(|n| self.lookup.get(n).copied());

            let Some(v_n) = back.take_u32()? else {
                return Ok(false);
            };
            for _ in 0..v_n {
                let Some(v) = back.take_u32()? else {
                    return Ok(false);
                };
                if let Some(id) = target {
                    bufs[id].v.push(Scalar::from_u64(v as u64));
                }
            }
        }
        Ok(true)
    }

    fn buffer(&self) {
        // SAFETY: called by the ingest thread under the handshake lock with
        // the consumer parked.
        unsafe { self.store.swap() }
    }

    fn data(&self, buffer_id: usize) -> (&[Scalar], SigType) {
        // SAFETY: consume thread, inside its event window.
        unsafe { self.store.front(buffer_id) }
    }
}
