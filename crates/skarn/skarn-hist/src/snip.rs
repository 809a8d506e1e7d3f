//! SNIP background estimation and peak candidate search.
//!
//! The peak walk runs on the latched copy, never on the live store: find the
//! most significant bin above the SNIP background, step sideways along the
//! second differences to the shoulders, hand the window to the Gaussian
//! fitter, mask three sigmas, repeat. Up to 30 peaks with positive
//! amplitude survive.

use crate::fit::GaussFitter;
use crate::render::Peak;
use crate::Axis;

const MAX_PEAKS: usize = 30;

/// Iterative SNIP background: each pass clips every bin against the mean of
/// its neighbours at distance `p`, for `p = 1..=width`.
pub fn snip(hist: &[u32], width: u32) -> Vec<f32> {
    let n = hist.len();
    let mut b: Vec<f32> = hist.iter().map(|&c| c as f32).collect();
    let mut tmp = b.clone();
    for p in 1..=width as usize {
        if 2 * p >= n {
            break;
        }
        for i in p..n - p {
            tmp[i] = b[i].min((b[i - p] + b[i + p]) / 2.0);
        }
        b.copy_from_slice(&tmp);
    }
    b
}

/// Peak candidates over a latched 1-D histogram.
pub fn find_peaks(hist: &[u32], axis: &Axis, fitter: &dyn GaussFitter) -> Vec<Peak> {
    let n = hist.len();
    let mut peaks = Vec::new();
    if n < 4 {
        return peaks;
    }

    // Significance of each bin over the background.
    let bg = snip(hist, 4);
    let mut sig = vec![0.0f32; n];
    for i in 0..n {
        sig[i] = (hist[i] as f32 - bg[i]) / (bg[i] + 1.0).sqrt();
    }

    // 2nd diffs make peaks look like:
    // ___/\  /\___
    //      \/
    let mut d = vec![0.0f32; n];
    for i in 2..n {
        let f0 = hist[i - 2] as f32;
        let f1 = hist[i - 1] as f32;
        let f2 = hist[i] as f32;
        d[i - 1] = (f2 - f1) - (f1 - f0);
    }

    let mut mask = vec![false; n];
    let scale = axis.span() / n as f64;
    for _ in 0..MAX_PEAKS {
        if peaks.len() >= MAX_PEAKS {
            break;
        }
        // Most significant unmasked bin.
        let mut max_y = 0.0f32;
        let mut max_i = 0usize;
        for i in 0..n {
            if !mask[i] && sig[i] > max_y {
                max_y = sig[i];
                max_i = i;
            }
        }
        if max_y <= 0.0 {
            break;
        }
        let top = hist[max_i] as f64;

        // Step sideways in 2nd-diffs to find the shoulders, ie the dots:
        //    .    .
        // ___/\  /\___
        //      \/
        let mut left_i = max_i;
        let mut prev = f32::MIN;
        while left_i >= 1 {
            left_i -= 1;
            if d[left_i] < prev {
                break;
            }
            prev = d[left_i];
        }
        let mut right_i = max_i;
        prev = f32::MIN;
        while right_i + 1 < n {
            right_i += 1;
            if d[right_i] < prev {
                break;
            }
            prev = d[right_i];
        }

        let fit = fitter.fit(hist, top, left_i, right_i);
        // The fit ran on left bin edges; shift to bin centers.
        let mean = fit.mean + 0.5;
        let width = fit.std.max(1.0);
        left_i = (mean - 3.0 * width).floor().max(0.0) as usize;
        right_i = ((mean + 3.0 * width).ceil() as usize).min(n - 1);
        if fit.amp > 0.0 {
            peaks.push(Peak {
                x: axis.min + mean * scale,
                offset: fit.offset,
                amp: fit.amp,
                std: fit.std * scale,
            });
        }
        for m in mask.iter_mut().take(right_i + 1).skip(left_i) {
            *m = true;
        }
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::MomentsFitter;

    #[test]
    fn snip_hugs_a_flat_baseline() {
        let mut hist = vec![10u32; 64];
        hist[30] = 200;
        let bg = snip(&hist, 4);
        assert!((bg[10] - 10.0).abs() < 1e-3);
        assert!(bg[30] < 100.0, "peak bin must be clipped toward baseline");
    }

    #[test]
    fn finds_two_separated_peaks() {
        let mut hist = vec![5u32; 128];
        for (c, amp) in [(30usize, 300.0f64), (90, 200.0)] {
            for i in 0..128usize {
                let dx = i as f64 - c as f64;
                hist[i] += (amp * (-dx * dx / 8.0).exp()) as u32;
            }
        }
        let axis = Axis { bins: 128, min: 0.0, max: 128.0 };
        let peaks = find_peaks(&hist, &axis, &MomentsFitter);
        assert!(peaks.len() >= 2, "found {} peaks", peaks.len());
        let mut xs: Vec<f64> = peaks.iter().take(2).map(|p| p.x).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((xs[0] - 30.0).abs() < 3.0, "x0={}", xs[0]);
        assert!((xs[1] - 90.0).abs() < 3.0, "x1={}", xs[1]);
    }

    #[test]
    fn empty_histogram_has_no_peaks() {
        let hist = vec![0u32; 64];
        let axis = Axis { bins: 64, min: 0.0, max: 64.0 };
        assert!(find_peaks(&hist, &axis, &MomentsFitter).is_empty());
    }
}
