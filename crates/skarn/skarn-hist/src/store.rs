//! Time-sliced histogram stores for 1-D, 2-D and annular plots.
//!
//! Each store owns N bin-array slices, one of them active. Fills land in
//! the active slice; the active index advances (zeroing the new slice)
//! every slice period of wall time, so latched sums decay old counts
//! without per-fill bookkeeping.
//!
//! Concurrency: the consume thread prefills/fits/fills, the main thread
//! latches. Everything mutable sits behind one mutex per store; the data
//! thread keeps filling while the plotter figures out ranges, so the
//! latched copy is the only thing a renderer may look at.

use std::sync::Mutex;

use skarn_value::{Scalar, SigType, TypeMismatch};

use crate::fit::GaussFitter;
use crate::range::Range;
use crate::rebin::{rebin1, rebin2};
use crate::render::{Peak, Plot, Renderer};
use crate::snip::find_peaks;
use crate::{Axis, LinearTransform};

/// Ring of count slices with a wall-clock advance.
struct Slices {
    v: Vec<Vec<u32>>,
    active: usize,
    t_prev: u64,
}

impl Slices {
    fn new(n: usize) -> Self {
        Slices {
            v: (0..n.max(1)).map(|_| Vec::new()).collect(),
            active: 0,
            t_prev: 0,
        }
    }

    fn clear(&mut self) {
        for h in &mut self.v {
            h.clear();
        }
    }

    /// Throws away the oldest slice and starts filling it.
    fn advance(&mut self, slice_ms: u64, now_ms: u64) {
        if slice_ms == 0 {
            return;
        }
        if now_ms > self.t_prev + slice_ms {
            self.active = (self.active + 1) % self.v.len();
            let h = &mut self.v[self.active];
            h.fill(0);
            self.t_prev = now_ms;
        }
    }

    fn fill_at(&mut self, idx: usize) {
        let h = &mut self.v[self.active];
        if idx < h.len() {
            h[idx] += 1;
        }
    }

    /// Element-wise sum of all slices into `copy`.
    fn sum_into(&self, copy: &mut Vec<u32>) {
        copy.clear();
        copy.extend_from_slice(&self.v[0]);
        for h in &self.v[1..] {
            for (c, &x) in copy.iter_mut().zip(h) {
                *c += x;
            }
        }
    }
}

// ─── 1-D ────────────────────────────────────────────────────────────────────

struct Hist1State {
    range: Range,
    axis: Axis,
    slices: Slices,
    axis_copy: Axis,
    copy: Vec<u32>,
}

pub struct Hist1 {
    title: String,
    req_bins: u32,
    transform: LinearTransform,
    log_y: bool,
    contour: bool,
    slice_ms: u64,
    fitter: Option<Box<dyn GaussFitter>>,
    state: Mutex<Hist1State>,
}

impl Hist1 {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: &str,
        bins: u32,
        transform: LinearTransform,
        fitter: Option<Box<dyn GaussFitter>>,
        log_y: bool,
        contour: bool,
        drop_counts_s: f64,
        drop_counts_num: u32,
        drop_stats_s: f64,
    ) -> Self {
        Hist1 {
            title: title.to_string(),
            req_bins: bins,
            transform,
            log_y,
            contour,
            slice_ms: (1000.0 * drop_counts_s.max(0.0)) as u64,
            fitter,
            state: Mutex::new(Hist1State {
                range: Range::new(drop_stats_s),
                axis: Axis::default(),
                slices: Slices::new(drop_counts_num as usize),
                axis_copy: Axis::default(),
                copy: Vec::new(),
            }),
        }
    }

    pub fn prefill(&self, ty: SigType, x: Scalar, now_ms: u64) -> Result<(), TypeMismatch> {
        let mut st = self.state.lock().unwrap();
        st.range.add(ty, x, now_ms)
    }

    /// Re-fits the axis and rebins every slice when the observed range has
    /// escaped the current axis.
    pub fn fit(&self) {
        let mut guard = self.state.lock().unwrap();
        let Hist1State { range, axis, slices, .. } = &mut *guard;
        if !range.is_added() {
            return;
        }
        if range.min() >= axis.min && range.max() < axis.max {
            return;
        }
        let next = range.extents(self.req_bins);
        if next == *axis {
            return;
        }
        tracing::debug!(
            title = %self.title,
            bins = next.bins,
            min = next.min,
            max = next.max,
            "axis refit"
        );
        for h in &mut slices.v {
            *h = rebin1(
                h,
                axis.bins as usize,
                axis.min,
                axis.max,
                next.bins as usize,
                next.min,
                next.max,
            );
        }
        *axis = next;
    }

    pub fn fill(&self, ty: SigType, x: Scalar) {
        let mut guard = self.state.lock().unwrap();
        let Hist1State { axis, slices, .. } = &mut *guard;
        if let Some(i) = axis.bin(x.as_f64(ty)) {
            slices.fill_at(i as usize);
        }
    }
}

impl Plot for Hist1 {
    fn title(&self) -> &str {
        &self.title
    }

    fn latch(&self, now_ms: u64, clear: bool) {
        let mut guard = self.state.lock().unwrap();
        let Hist1State { range, axis, slices, axis_copy, copy } = &mut *guard;
        if clear {
            range.clear();
            axis.clear();
            slices.clear();
        }
        *axis_copy = *axis;
        slices.advance(self.slice_ms, now_ms);
        slices.sum_into(copy);
    }

    fn draw(&self, renderer: &mut dyn Renderer) {
        let st = self.state.lock().unwrap();
        if st.copy.is_empty() {
            return;
        }
        // Fitting at the frame rate is fine; it works on the copy.
        let peaks: Vec<Peak> = match &self.fitter {
            Some(f) => find_peaks(&st.copy, &st.axis_copy, f.as_ref()),
            None => Vec::new(),
        };
        renderer.draw_hist1(
            &self.title,
            &st.axis_copy,
            &self.transform,
            self.log_y,
            self.contour,
            &st.copy,
            &peaks,
        );
    }
}

// ─── 2-D ────────────────────────────────────────────────────────────────────

struct Hist2State {
    range_x: Range,
    range_y: Range,
    axis_x: Axis,
    axis_y: Axis,
    slices: Slices,
    axis_x_copy: Axis,
    axis_y_copy: Axis,
    copy: Vec<u32>,
    single_prev_ms: u64,
}

pub struct Hist2 {
    title: String,
    req_xb: u32,
    req_yb: u32,
    transform_x: LinearTransform,
    transform_y: LinearTransform,
    log_z: bool,
    slice_ms: u64,
    /// Single-event persistence: hold one event's content this long, then
    /// wipe and accept the next. `None` = plain accumulation.
    single_ms: Option<u64>,
    state: Mutex<Hist2State>,
}

impl Hist2 {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: &str,
        xb: u32,
        yb: u32,
        transform_x: LinearTransform,
        transform_y: LinearTransform,
        log_z: bool,
        drop_counts_s: f64,
        drop_counts_num: u32,
        drop_stats_s: f64,
        single_s: Option<f64>,
    ) -> Self {
        Hist2 {
            title: title.to_string(),
            req_xb: xb,
            req_yb: yb,
            transform_x,
            transform_y,
            log_z,
            slice_ms: (1000.0 * drop_counts_s.max(0.0)) as u64,
            single_ms: single_s.map(|s| (1000.0 * s.max(0.0)) as u64),
            state: Mutex::new(Hist2State {
                range_x: Range::new(drop_stats_s),
                range_y: Range::new(drop_stats_s),
                axis_x: Axis::default(),
                axis_y: Axis::default(),
                slices: Slices::new(drop_counts_num as usize),
                axis_x_copy: Axis::default(),
                axis_y_copy: Axis::default(),
                copy: Vec::new(),
                single_prev_ms: 0,
            }),
        }
    }

    /// In single-event mode: false while the held event is still on
    /// display; wipes the active slice and re-arms otherwise.
    pub fn is_writable(&self, now_ms: u64) -> bool {
        let Some(single_ms) = self.single_ms else {
            return true;
        };
        let mut st = self.state.lock().unwrap();
        if st.single_prev_ms + single_ms > now_ms {
            return false;
        }
        let active = st.slices.active;
        st.slices.v[active].fill(0);
        st.single_prev_ms = now_ms;
        true
    }

    pub fn prefill(
        &self,
        ty_x: SigType,
        x: Scalar,
        ty_y: SigType,
        y: Scalar,
        now_ms: u64,
    ) -> Result<(), TypeMismatch> {
        let mut st = self.state.lock().unwrap();
        st.range_x.add(ty_x, x, now_ms)?;
        st.range_y.add(ty_y, y, now_ms)
    }

    pub fn fit(&self) {
        let mut guard = self.state.lock().unwrap();
        let Hist2State { range_x, range_y, axis_x, axis_y, slices, .. } = &mut *guard;
        if !range_x.is_added() {
            return;
        }
        let inside = range_x.min() >= axis_x.min
            && range_x.max() < axis_x.max
            && range_y.min() >= axis_y.min
            && range_y.max() < axis_y.max;
        if inside {
            return;
        }
        let next_x = range_x.extents(self.req_xb);
        let next_y = range_y.extents(self.req_yb);
        if next_x == *axis_x && next_y == *axis_y {
            return;
        }
        for h in &mut slices.v {
            *h = rebin2(
                h,
                axis_x.bins as usize,
                axis_x.min,
                axis_x.max,
                axis_y.bins as usize,
                axis_y.min,
                axis_y.max,
                next_x.bins as usize,
                next_x.min,
                next_x.max,
                next_y.bins as usize,
                next_y.min,
                next_y.max,
            );
        }
        *axis_x = next_x;
        *axis_y = next_y;
    }

    pub fn fill(&self, ty_x: SigType, x: Scalar, ty_y: SigType, y: Scalar) {
        let mut guard = self.state.lock().unwrap();
        let Hist2State { axis_x, axis_y, slices, .. } = &mut *guard;
        let (Some(j), Some(i)) = (axis_x.bin(x.as_f64(ty_x)), axis_y.bin(y.as_f64(ty_y))) else {
            return;
        };
        slices.fill_at(i as usize * axis_x.bins as usize + j as usize);
    }
}

impl Plot for Hist2 {
    fn title(&self) -> &str {
        &self.title
    }

    fn latch(&self, now_ms: u64, clear: bool) {
        let mut guard = self.state.lock().unwrap();
        let Hist2State {
            range_x,
            range_y,
            axis_x,
            axis_y,
            slices,
            axis_x_copy,
            axis_y_copy,
            copy,
            ..
        } = &mut *guard;
        if clear {
            range_x.clear();
            range_y.clear();
            axis_x.clear();
            axis_y.clear();
            slices.clear();
        }
        *axis_x_copy = *axis_x;
        *axis_y_copy = *axis_y;
        slices.advance(self.slice_ms, now_ms);
        slices.sum_into(copy);
    }

    fn draw(&self, renderer: &mut dyn Renderer) {
        let st = self.state.lock().unwrap();
        if st.copy.is_empty() {
            return;
        }
        renderer.draw_hist2(
            &self.title,
            &st.axis_x_copy,
            &st.axis_y_copy,
            &self.transform_x,
            &self.transform_y,
            self.log_z,
            &st.copy,
        );
    }
}

// ─── Annular ────────────────────────────────────────────────────────────────

struct AnnularState {
    range_r: Range,
    range_p: Range,
    axis_r: Axis,
    axis_p: Axis,
    slices: Slices,
    axis_r_copy: Axis,
    axis_p_copy: Axis,
    copy: Vec<u32>,
}

/// Ring-shaped 2-D histogram: radius against azimuth angle.
pub struct Annular {
    title: String,
    r_min: f64,
    r_max: f64,
    phi0: f64,
    log_z: bool,
    slice_ms: u64,
    state: Mutex<AnnularState>,
}

impl Annular {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: &str,
        r_min: f64,
        r_max: f64,
        phi0: f64,
        log_z: bool,
        drop_counts_s: f64,
        drop_counts_num: u32,
        drop_stats_s: f64,
    ) -> Self {
        Annular {
            title: title.to_string(),
            r_min,
            r_max,
            phi0,
            log_z,
            slice_ms: (1000.0 * drop_counts_s.max(0.0)) as u64,
            state: Mutex::new(AnnularState {
                range_r: Range::new(drop_stats_s),
                range_p: Range::new(drop_stats_s),
                axis_r: Axis::default(),
                axis_p: Axis::default(),
                slices: Slices::new(drop_counts_num as usize),
                axis_r_copy: Axis::default(),
                axis_p_copy: Axis::default(),
                copy: Vec::new(),
            }),
        }
    }

    pub fn prefill(
        &self,
        ty_r: SigType,
        r: Scalar,
        ty_p: SigType,
        p: Scalar,
        now_ms: u64,
    ) -> Result<(), TypeMismatch> {
        let mut st = self.state.lock().unwrap();
        st.range_r.add(ty_r, r, now_ms)?;
        st.range_p.add(ty_p, p, now_ms)
    }

    pub fn fit(&self) {
        let mut guard = self.state.lock().unwrap();
        let AnnularState { range_r, range_p, axis_r, axis_p, slices, .. } = &mut *guard;
        if !range_r.is_added() {
            return;
        }
        let inside = range_r.min() >= axis_r.min
            && range_r.max() < axis_r.max
            && range_p.min() >= axis_p.min
            && range_p.max() < axis_p.max;
        if inside {
            return;
        }
        let next_r = range_r.extents(0);
        let next_p = range_p.extents(0);
        if next_r == *axis_r && next_p == *axis_p {
            return;
        }
        for h in &mut slices.v {
            *h = rebin2(
                h,
                axis_r.bins as usize,
                axis_r.min,
                axis_r.max,
                axis_p.bins as usize,
                axis_p.min,
                axis_p.max,
                next_r.bins as usize,
                next_r.min,
                next_r.max,
                next_p.bins as usize,
                next_p.min,
                next_p.max,
            );
        }
        *axis_r = next_r;
        *axis_p = next_p;
    }

    pub fn fill(&self, ty_r: SigType, r: Scalar, ty_p: SigType, p: Scalar) {
        let mut guard = self.state.lock().unwrap();
        let AnnularState { axis_r, axis_p, slices, .. } = &mut *guard;
        let (Some(j), Some(i)) = (axis_r.bin(r.as_f64(ty_r)), axis_p.bin(p.as_f64(ty_p))) else {
            return;
        };
        slices.fill_at(i as usize * axis_r.bins as usize + j as usize);
    }
}

impl Plot for Annular {
    fn title(&self) -> &str {
        &self.title
    }

    fn latch(&self, now_ms: u64, clear: bool) {
        let mut guard = self.state.lock().unwrap();
        let AnnularState {
            range_r,
            range_p,
            axis_r,
            axis_p,
            slices,
            axis_r_copy,
            axis_p_copy,
            copy,
        } = &mut *guard;
        if clear {
            range_r.clear();
            range_p.clear();
            axis_r.clear();
            axis_p.clear();
            slices.clear();
        }
        *axis_r_copy = *axis_r;
        *axis_p_copy = *axis_p;
        slices.advance(self.slice_ms, now_ms);
        slices.sum_into(copy);
    }

    fn draw(&self, renderer: &mut dyn Renderer) {
        let st = self.state.lock().unwrap();
        if st.copy.is_empty() {
            return;
        }
        renderer.draw_annular(
            &self.title,
            &st.axis_r_copy,
            self.r_min,
            self.r_max,
            &st.axis_p_copy,
            self.phi0,
            self.log_z,
            &st.copy,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> Scalar {
        Scalar::from_u64(v)
    }

    fn feed1(h: &Hist1, vals: &[u64], now: u64) {
        for &v in vals {
            h.prefill(SigType::U64, u(v), now).unwrap();
        }
        h.fit();
        for &v in vals {
            h.fill(SigType::U64, u(v));
        }
    }

    #[test]
    fn fill_after_fit_lands_every_sample() {
        let h = Hist1::new("t", 0, LinearTransform::default(), None, false, false, 0.0, 1, 0.0);
        feed1(&h, &[0, 1, 2, 3, 4, 5, 6, 7], 0);
        h.latch(0, false);
        let st = h.state.lock().unwrap();
        assert_eq!(st.copy.iter().sum::<u32>(), 8);
    }

    #[test]
    fn growing_range_rebins_and_conserves() {
        let h = Hist1::new("t", 0, LinearTransform::default(), None, false, false, 0.0, 1, 0.0);
        feed1(&h, &[0, 1, 2, 3], 0);
        // New samples far outside force a refit; old counts must survive.
        feed1(&h, &[1000], 0);
        h.latch(0, false);
        let st = h.state.lock().unwrap();
        assert_eq!(st.copy.iter().sum::<u32>(), 5);
    }

    #[test]
    fn decay_zeroes_after_a_full_window() {
        let h = Hist1::new("t", 0, LinearTransform::default(), None, false, false, 1.0, 4, 0.0);
        feed1(&h, &[1, 2, 3], 0);
        // Latch across more than four slice periods with no further fills.
        let mut t = 0;
        for _ in 0..6 {
            t += 1100;
            h.latch(t, false);
        }
        let st = h.state.lock().unwrap();
        assert_eq!(st.copy.iter().sum::<u32>(), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let h = Hist1::new("t", 0, LinearTransform::default(), None, false, false, 0.0, 1, 0.0);
        feed1(&h, &[5, 6, 7], 0);
        h.latch(0, true);
        let st = h.state.lock().unwrap();
        assert!(st.copy.is_empty());
        assert_eq!(st.axis.bins, 0);
        assert_eq!(st.range.max(), 0.0);
    }

    #[test]
    fn hist2_fill_is_row_major_by_y() {
        let h = Hist2::new(
            "t2",
            0,
            0,
            LinearTransform::default(),
            LinearTransform::default(),
            false,
            0.0,
            1,
            0.0,
            None,
        );
        for (x, y) in [(0u64, 0u64), (3, 0), (0, 3)] {
            h.prefill(SigType::U64, u(x), SigType::U64, u(y), 0).unwrap();
        }
        h.fit();
        for (x, y) in [(0u64, 0u64), (3, 0), (0, 3)] {
            h.fill(SigType::U64, u(x), SigType::U64, u(y));
        }
        h.latch(0, false);
        let st = h.state.lock().unwrap();
        assert_eq!(st.copy.iter().sum::<u32>(), 3);
        let xb = st.axis_x_copy.bins as usize;
        // (0,0) is bin 0; (3,0) stays in row 0; (0,3) starts a later row.
        assert_eq!(st.copy[0], 1);
        assert_eq!(st.copy[..xb].iter().sum::<u32>(), 2);
    }

    #[test]
    fn single_event_mode_holds_then_rearms() {
        let h = Hist2::new(
            "single",
            0,
            0,
            LinearTransform::default(),
            LinearTransform::default(),
            false,
            0.0,
            1,
            0.0,
            Some(1.0),
        );
        assert!(h.is_writable(1000));
        assert!(!h.is_writable(1500), "held event must block refills");
        assert!(h.is_writable(2500), "hold expires after the window");
    }
}
