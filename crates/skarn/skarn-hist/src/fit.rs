//! Gaussian fit contract for the peak labels on 1-D histograms.
//!
//! The real non-linear fitter is an external collaborator; this module pins
//! the interface it must satisfy and ships a moments-based estimator that is
//! good enough for on-screen labels. Since this is an online monitor,
//! reasonable visualization ranks higher than correct decimals: the peak is
//! constrained by `max_y`, the histogram maximum in the window, and after
//! fitting `offset + amp` lands close to it.

/// Fit result over a window of bin indices; `mean`/`std` are in bin units.
#[derive(Clone, Copy, Debug, Default)]
pub struct GaussFit {
    pub offset: f64,
    pub amp: f64,
    pub mean: f64,
    pub std: f64,
}

pub trait GaussFitter: Send + Sync {
    /// Fits `offset + amp * exp(-(x-mean)^2 / (2 std^2))` against
    /// `hist[left..=right]`.
    fn fit(&self, hist: &[u32], max_y: f64, left: usize, right: usize) -> GaussFit;
}

/// Weighted-moments estimator: baseline from the window edges, mean and
/// sigma from the first two moments of the baseline-subtracted counts.
#[derive(Debug, Default)]
pub struct MomentsFitter;

impl GaussFitter for MomentsFitter {
    fn fit(&self, hist: &[u32], max_y: f64, left: usize, right: usize) -> GaussFit {
        let right = right.min(hist.len().saturating_sub(1));
        if left > right {
            return GaussFit::default();
        }
        let offset = (hist[left] as f64).min(hist[right] as f64);

        let mut w_sum = 0.0;
        let mut x_sum = 0.0;
        for i in left..=right {
            let w = (hist[i] as f64 - offset).max(0.0);
            w_sum += w;
            x_sum += w * i as f64;
        }
        if w_sum <= 0.0 {
            return GaussFit { offset, ..GaussFit::default() };
        }
        let mean = x_sum / w_sum;

        let mut var_sum = 0.0;
        for i in left..=right {
            let w = (hist[i] as f64 - offset).max(0.0);
            let d = i as f64 - mean;
            var_sum += w * d * d;
        }
        let std = (var_sum / w_sum).sqrt().max(1e-3);

        GaussFit {
            offset,
            amp: max_y - offset,
            mean,
            std,
        }
    }
}
