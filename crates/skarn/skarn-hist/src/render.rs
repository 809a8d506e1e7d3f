//! Render-side contracts: the renderer a front-end implements and the plot
//! registry the main loop drives.
//!
//! Pull model: once per frame the main thread walks the registered plots;
//! each plot latches its store (consuming a pending clear request) and hands
//! the snapshot to the renderer. Nothing render-side ever touches live bins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Axis, LinearTransform};

/// One fitted peak, in axis units.
#[derive(Clone, Copy, Debug)]
pub struct Peak {
    pub x: f64,
    pub offset: f64,
    pub amp: f64,
    pub std: f64,
}

/// What a rendering back-end must implement. Implementations run on the
/// main thread only.
pub trait Renderer {
    fn draw_hist1(
        &mut self,
        title: &str,
        axis: &Axis,
        transform: &LinearTransform,
        log_y: bool,
        contour: bool,
        data: &[u32],
        peaks: &[Peak],
    );

    #[allow(clippy::too_many_arguments)]
    fn draw_hist2(
        &mut self,
        title: &str,
        axis_x: &Axis,
        axis_y: &Axis,
        transform_x: &LinearTransform,
        transform_y: &LinearTransform,
        log_z: bool,
        data: &[u32],
    );

    #[allow(clippy::too_many_arguments)]
    fn draw_annular(
        &mut self,
        title: &str,
        axis_r: &Axis,
        r_min: f64,
        r_max: f64,
        axis_phi: &Axis,
        phi0: f64,
        log_z: bool,
        data: &[u32],
    );
}

/// A latchable, drawable store. Implemented by the histogram stores.
pub trait Plot: Send + Sync {
    fn title(&self) -> &str;
    /// Snapshots the store; `clear` wipes range, axis and slices first.
    fn latch(&self, now_ms: u64, clear: bool);
    fn draw(&self, renderer: &mut dyn Renderer);
}

struct Entry {
    plot: Arc<dyn Plot>,
    clear: AtomicBool,
}

/// Registry of every plot in the session, walked once per frame.
#[derive(Default)]
pub struct PlotSet {
    plots: Mutex<Vec<Entry>>,
}

impl PlotSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, plot: Arc<dyn Plot>) {
        self.plots.lock().unwrap().push(Entry {
            plot,
            clear: AtomicBool::new(false),
        });
    }

    pub fn len(&self) -> usize {
        self.plots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flags a plot for clearing; the next latch consumes it.
    pub fn request_clear(&self, title: &str) {
        for entry in self.plots.lock().unwrap().iter() {
            if entry.plot.title() == title {
                entry.clear.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Latches and draws every plot. Main thread, once per frame.
    pub fn draw_all(&self, renderer: &mut dyn Renderer, now_ms: u64) {
        for entry in self.plots.lock().unwrap().iter() {
            let clear = entry.clear.swap(false, Ordering::Relaxed);
            entry.plot.latch(now_ms, clear);
            entry.plot.draw(renderer);
        }
    }
}
