//! Two-stage producer/consumer pipeline.
//!
//! Two long-lived threads share the input's single-slot double buffer and a
//! pair of monotonic counters guarded by one lock and two condition
//! variables:
//!
//! - the **ingest** thread pulls one event into the background buffer,
//!   waits until the consumer has drained the previous event
//!   (`input_seq == event_seq`), flips the buffers and bumps `input_seq`;
//! - the **consume** thread waits for a buffered event
//!   (`input_seq > event_seq`), runs the event callback and bumps
//!   `event_seq`.
//!
//! This admits exactly one in-flight event: at any instant
//! `input_seq - event_seq` is 0 or 1. The ingest thread always works one
//! event ahead while the consumer processes the previous one; upstream
//! stalls back-pressure through the single slot, no timeouts anywhere on
//! the data path.
//!
//! End-of-stream is not the end of the run: streaming sources may come back,
//! so the ingest thread naps and retries until `stop` clears the running
//! flag. Both workers observe the flag on their next wake and exit after
//! draining their current event.

pub mod time;

pub use time::{Clock, FakeClock, MonoClock, now_ms};

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use skarn_input::Input;
use tracing::{error, info};

struct Handshake {
    input_seq: u64,
    event_seq: u64,
    running: bool,
}

struct Shared {
    hs: Mutex<Handshake>,
    /// Ingest waits here for the consumer to drain.
    input_cv: Condvar,
    /// Consume waits here for a buffered event.
    event_cv: Condvar,
}

pub struct Pipeline {
    shared: Arc<Shared>,
    ingest: Option<JoinHandle<()>>,
    consume: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawns the two worker threads over `input`. `on_event` runs on the
    /// consume thread once per buffered event; an error from it is fatal
    /// and shuts the pipeline down.
    pub fn spawn<I, E, F>(input: Arc<I>, mut on_event: F) -> Pipeline
    where
        I: Input + Send + Sync + 'static,
        E: std::fmt::Display,
        F: FnMut(&I) -> Result<(), E> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            hs: Mutex::new(Handshake {
                input_seq: 0,
                event_seq: 0,
                running: true,
            }),
            input_cv: Condvar::new(),
            event_cv: Condvar::new(),
        });

        let ingest = {
            let shared = Arc::clone(&shared);
            let input = Arc::clone(&input);
            std::thread::spawn(move || {
                info!("starting input loop");
                loop {
                    // Fetch an event, then wait until the buffered one is done.
                    match input.fetch() {
                        Ok(true) => {}
                        Ok(false) => {
                            if !shared.hs.lock().unwrap().running {
                                break;
                            }
                            std::thread::sleep(std::time::Duration::from_secs(1));
                            continue;
                        }
                        Err(e) => {
                            error!(error = %e, "input failed");
                            shared.hs.lock().unwrap().running = false;
                            break;
                        }
                    }
                    let mut hs = shared.hs.lock().unwrap();
                    while hs.input_seq != hs.event_seq && hs.running {
                        hs = shared.input_cv.wait(hs).unwrap();
                    }
                    if !hs.running {
                        break;
                    }

                    // Commit the fetched data and wake the event thread.
                    input.buffer();
                    hs.input_seq += 1;
                    drop(hs);
                    shared.event_cv.notify_one();
                }
                shared.event_cv.notify_one();
                info!("exited input loop");
            })
        };

        let consume = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                info!("starting event loop");
                loop {
                    let mut hs = shared.hs.lock().unwrap();
                    while hs.input_seq <= hs.event_seq && hs.running {
                        hs = shared.event_cv.wait(hs).unwrap();
                    }
                    if !hs.running {
                        break;
                    }

                    // Process the buffered event, then wake the input thread.
                    if let Err(e) = on_event(&input) {
                        error!(error = %e, "event processing failed");
                        hs.running = false;
                        drop(hs);
                        shared.input_cv.notify_one();
                        break;
                    }
                    hs.event_seq += 1;
                    drop(hs);
                    shared.input_cv.notify_one();
                }
                shared.input_cv.notify_one();
                info!("exited event loop");
            })
        };

        Pipeline {
            shared,
            ingest: Some(ingest),
            consume: Some(consume),
        }
    }

    /// Current `(input_seq, event_seq)`.
    pub fn seqs(&self) -> (u64, u64) {
        let hs = self.shared.hs.lock().unwrap();
        (hs.input_seq, hs.event_seq)
    }

    pub fn is_running(&self) -> bool {
        self.shared.hs.lock().unwrap().running
    }

    /// Clears the running flag and wakes both workers.
    pub fn stop(&self) {
        self.shared.hs.lock().unwrap().running = false;
        self.shared.input_cv.notify_one();
        self.shared.event_cv.notify_one();
    }

    /// Stops and joins both workers.
    pub fn join(mut self) {
        self.stop();
        if let Some(h) = self.ingest.take() {
            let _ = h.join();
        }
        if let Some(h) = self.consume.take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_input::MemoryInput;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn events(n: usize) -> MemoryInput {
        MemoryInput::from_u64(1, (0..n).map(|i| vec![vec![i as u64]]).collect())
    }

    #[test]
    fn consumes_every_event_in_order() {
        let input = Arc::new(events(100));
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = Arc::clone(&seen);
        let pipeline = Pipeline::spawn(input, move |input: &MemoryInput| -> Result<(), String> {
            let (v, _) = input.data(0);
            let i = seen2.fetch_add(1, Ordering::Relaxed);
            assert_eq!(v[0].u64(), i, "events must arrive in order");
            Ok(())
        });

        // The stream ends after 100 events; the ingest thread then naps.
        // Wait for the consumer to catch up, then shut down.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while seen.load(Ordering::Relaxed) < 100 {
            assert!(std::time::Instant::now() < deadline, "pipeline stalled");
            std::thread::yield_now();
        }
        pipeline.join();
        assert_eq!(seen.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn at_most_one_event_in_flight() {
        let input = Arc::new(events(1000));
        let pipeline = Pipeline::spawn(input, move |_: &MemoryInput| -> Result<(), String> {
            Ok(())
        });
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            let (i, e) = pipeline.seqs();
            assert!(i - e <= 1, "input_seq={i} event_seq={e}");
            if e >= 1000 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "pipeline stalled");
        }
        pipeline.join();
    }

    #[test]
    fn event_error_stops_the_run() {
        let input = Arc::new(events(10));
        let pipeline = Pipeline::spawn(input, move |_: &MemoryInput| -> Result<(), String> {
            Err("boom".to_string())
        });
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while pipeline.is_running() {
            assert!(std::time::Instant::now() < deadline, "pipeline did not stop");
            std::thread::yield_now();
        }
        pipeline.join();
    }

    #[test]
    fn stop_interrupts_an_idle_pipeline() {
        let input = Arc::new(events(0)); // immediate end-of-stream
        let pipeline = Pipeline::spawn(input, move |_: &MemoryInput| -> Result<(), String> {
            Ok(())
        });
        pipeline.join();
    }
}
