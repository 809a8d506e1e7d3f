//! Auto-ranging statistics over a sliding time window.
//!
//! Guesses the kind of data and a sensible display range:
//! only integers? keep bins on integer multiples. A huge narrow peak?
//! forget about the tails.
//!
//! The window is a ring of ten slots; samples land in the current slot and
//! the ring advances when the slot outlives a tenth of the decay window.
//! Aggregates reduce across non-empty slots, which decays old extremes
//! without per-sample eviction.

use skarn_value::{Scalar, SigType, TypeMismatch};

use crate::Axis;

const SLOTS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Snap to the observed min/max.
    #[default]
    All,
    /// Prefer the sigma-3 window around the mean when it is much narrower
    /// than the full range.
    Stats,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    min: f64,
    max: f64,
    sum: f64,
    sum2: f64,
    num: u32,
    t_oldest: u64,
}

#[derive(Debug)]
pub struct Range {
    mode: Mode,
    ty: SigType,
    drop_stats_ms: u64,
    stat: [Slot; SLOTS],
    stat_i: usize,
}

impl Range {
    /// `drop_stats_s <= 0` disables decay; the window then grows forever.
    pub fn new(drop_stats_s: f64) -> Self {
        Range {
            mode: if drop_stats_s > 0.0 { Mode::Stats } else { Mode::All },
            ty: SigType::None,
            drop_stats_ms: if drop_stats_s < 0.0 {
                0
            } else {
                (1000.0 * drop_stats_s / SLOTS as f64) as u64
            },
            stat: [Slot::default(); SLOTS],
            stat_i: 0,
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn add(&mut self, ty: SigType, s: Scalar, now_ms: u64) -> Result<(), TypeMismatch> {
        if self.ty == SigType::None {
            self.ty = ty;
        } else if self.ty != ty {
            return Err(TypeMismatch { had: self.ty, got: ty });
        }

        let slot = &mut self.stat[self.stat_i];
        let v = s.as_f64(ty);
        if slot.num == 0 {
            slot.min = v;
            slot.max = v;
        } else {
            slot.min = slot.min.min(v);
            slot.max = slot.max.max(v);
        }
        slot.sum += v;
        slot.sum2 += v * v;
        if slot.num == 0 || slot.t_oldest == 0 {
            slot.t_oldest = now_ms;
        }
        slot.num += 1;

        if self.drop_stats_ms > 0 && slot.t_oldest + self.drop_stats_ms < now_ms {
            self.stat_i = (self.stat_i + 1) % SLOTS;
            self.stat[self.stat_i] = Slot::default();
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.stat = [Slot::default(); SLOTS];
        self.stat_i = 0;
    }

    /// Whether any sample has ever been added.
    pub fn is_added(&self) -> bool {
        self.ty != SigType::None
    }

    pub fn min(&self) -> f64 {
        let mut out: f64 = 0.0;
        let mut touched = false;
        for s in self.stat.iter().filter(|s| s.num > 0) {
            out = if touched { out.min(s.min) } else { s.min };
            touched = true;
        }
        out
    }

    pub fn max(&self) -> f64 {
        let mut out: f64 = 0.0;
        let mut touched = false;
        for s in self.stat.iter().filter(|s| s.num > 0) {
            out = if touched { out.max(s.max) } else { s.max };
            touched = true;
        }
        out
    }

    pub fn mean(&self) -> f64 {
        let mut sum = 0.0;
        let mut num = 0u64;
        for s in self.stat.iter().filter(|s| s.num > 0) {
            sum += s.sum;
            num += s.num as u64;
        }
        sum / num as f64
    }

    pub fn sigma(&self) -> f64 {
        let mut sum = 0.0;
        let mut sum2 = 0.0;
        let mut num = 0u64;
        for s in self.stat.iter().filter(|s| s.num > 0) {
            sum += s.sum;
            sum2 += s.sum2;
            num += s.num as u64;
        }
        let n = num as f64;
        ((sum2 - sum * sum / n) / n).sqrt()
    }

    /// Computes a display axis for `requested_bins` (0 = pick one).
    pub fn extents(&self, requested_bins: u32) -> Axis {
        let (mut l, mut r);
        match self.mode {
            Mode::All => {
                l = self.min();
                r = self.max();
                if self.ty.is_int() {
                    // For integers the right edge sits one past the max.
                    r += 1.0;
                }
                let mut d = r - l;
                if d.abs() < 1e-10 {
                    // Tiny numbers, or huge numbers whose diff cancels out.
                    d = (l.abs() * 1e-10).max(1e-20);
                    r = l + d;
                }
                // Floats and very wide integer ranges get a 10% margin.
                if !self.ty.is_int() || d > (1 << 16) as f64 {
                    l -= d * 0.1;
                    r += d * 0.1;
                }
            }
            Mode::Stats => {
                l = self.min();
                r = self.max();
                let d_ext = r - l;

                let mean = self.mean();
                let sigma = self.sigma();
                let peak_l = mean - 3.0 * sigma;
                let peak_r = mean + 3.0 * sigma;

                if peak_r - peak_l < 0.1 * d_ext {
                    // A narrow peak inside the range; zoom to it.
                    l = peak_l;
                    r = peak_r;
                }

                // Snap an edge to 0 when it is within one span of it.
                let d = r - l;
                if l > 0.0 && l < d {
                    l = 0.0;
                }
                if r < 0.0 && r > -d {
                    r = 0.0;
                }
                if l == r {
                    r = l + (l.abs() * 1e-10).max(1e-20);
                }
            }
        }

        // Choose bins, which may fudge the range.
        let bins;
        if self.ty.is_int() {
            if requested_bins > 0 {
                bins = requested_bins;
                // Round the span up to a whole multiple of the bin count so
                // every bin covers the same integer stride.
                let f = ((r - l) / bins as f64).ceil();
                l /= f;
                r /= f;
                let center = (l + r) / 2.0;
                l = center - bins as f64 / 2.0;
                r = l + bins as f64;
                l *= f;
                r *= f;
            } else {
                let mut b = (r - l).ceil() as u32;
                while b > 128 {
                    b /= 2;
                }
                bins = b.max(1);
            }
        } else {
            bins = if requested_bins > 0 { requested_bins } else { 200 };
        }

        Axis { bins, min: l, max: r }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(range: &mut Range, ty: SigType, vals: &[f64]) {
        for &v in vals {
            let s = match ty {
                SigType::U64 => Scalar::from_u64(v as u64),
                SigType::I64 => Scalar::from_i64(v as i64),
                _ => Scalar::from_f64(v),
            };
            range.add(ty, s, 0).unwrap();
        }
    }

    #[test]
    fn integer_extents_widen_past_max() {
        let mut r = Range::new(0.0);
        feed(&mut r, SigType::U64, &[0.0, 7.0]);
        let a = r.extents(0);
        assert!(a.min <= 0.0);
        assert!(a.max >= 8.0);
        assert!(a.bins >= 8);
        assert!(a.min < a.max);
    }

    #[test]
    fn free_bin_choice_halves_down_to_128() {
        let mut r = Range::new(0.0);
        feed(&mut r, SigType::U64, &[0.0, 1000.0]);
        let a = r.extents(0);
        assert!(a.bins <= 128);
        assert!(a.bins > 0);
    }

    #[test]
    fn float_extents_add_margin() {
        let mut r = Range::new(0.0);
        feed(&mut r, SigType::F64, &[0.0, 10.0]);
        let a = r.extents(0);
        assert!(a.min < 0.0);
        assert!(a.max > 10.0);
        assert_eq!(a.bins, 200);
    }

    #[test]
    fn degenerate_span_still_yields_a_valid_axis() {
        let mut r = Range::new(0.0);
        feed(&mut r, SigType::F64, &[5.0, 5.0, 5.0]);
        let a = r.extents(100);
        assert!(a.min < a.max);
        assert_eq!(a.bins, 100);
    }

    #[test]
    fn stats_mode_zooms_to_a_narrow_peak() {
        let mut r = Range::new(1.0);
        r.set_mode(Mode::Stats);
        // A tight cluster plus one far outlier.
        let mut vals: Vec<f64> = (0..1000).map(|i| 100.0 + (i % 10) as f64 * 0.01).collect();
        vals.push(100_000.0);
        feed(&mut r, SigType::F64, &vals);
        let a = r.extents(100);
        assert!(a.max < 10_000.0, "axis should ignore the outlier tail");
        assert!(a.min < a.max);
    }

    #[test]
    fn type_change_is_rejected() {
        let mut r = Range::new(0.0);
        r.add(SigType::U64, Scalar::from_u64(1), 0).unwrap();
        assert!(r.add(SigType::F64, Scalar::from_f64(1.0), 0).is_err());
    }

    #[test]
    fn decay_advances_the_ring() {
        let mut r = Range::new(1.0); // 100 ms per slot
        r.add(SigType::F64, Scalar::from_f64(1e9), 0).unwrap();
        // Enough later samples to rotate the extreme out of every slot.
        for i in 0..3 * SLOTS as u64 {
            r.add(SigType::F64, Scalar::from_f64(1.0), 200 * (i + 1)).unwrap();
        }
        assert!(r.max() < 1e9);
    }
}
