//! Polygon cuts shared across sinks by histogram title.
//!
//! A cut is a titled closed polygon drawn on a source histogram. While that
//! histogram prefills, it tests every (x,y) against the polygons drawn on
//! it and raises a per-event flag on a hit. Downstream the flag has two
//! consumers: `Cut` nodes turn it into a 0/1 value, and gated histograms
//! short-circuit their whole `process` when any of their cuts failed.
//! Flags are cleared at the start of every event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::node::{Graph, NodeId};
use crate::{EvalError, driver::EventCtx};

/// Closed polygon in (x,y) space, referencing its source histogram by title.
#[derive(Clone, Debug)]
pub struct CutPolygon {
    title: String,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl CutPolygon {
    pub fn new(title: &str, points: &[(f64, f64)]) -> Self {
        CutPolygon {
            title: title.to_string(),
            xs: points.iter().map(|p| p.0).collect(),
            ys: points.iter().map(|p| p.1).collect(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Even-odd membership test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.xs.len();
        let mut inside = false;
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let (xi, yi) = (self.xs[i], self.ys[i]);
            let (xj, yj) = (self.xs[j], self.ys[j]);
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// 1-D membership: inside the polygon's x projection. A vertical line
    /// always crosses a closed boundary an even number of times, so the
    /// even-odd rule degenerates to the projected span.
    pub fn contains_x(&self, x: f64) -> bool {
        let (lo, hi) = self
            .xs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        x >= lo && x <= hi
    }
}

/// Per-event boolean raised by the source histogram's prefill.
#[derive(Debug, Default)]
pub struct CutState {
    passed: AtomicBool,
}

impl CutState {
    pub fn reset(&self) {
        self.passed.store(false, Ordering::Relaxed);
    }

    pub fn raise(&self) {
        self.passed.store(true, Ordering::Relaxed);
    }

    pub fn passed(&self) -> bool {
        self.passed.load(Ordering::Relaxed)
    }
}

/// The producing side, owned by a cuttable sink: every polygon drawn on it,
/// with its flag.
#[derive(Debug, Default)]
pub struct CutProducer {
    entries: Vec<(Arc<CutPolygon>, Arc<CutState>)>,
}

impl CutProducer {
    pub fn register(&mut self, poly: Arc<CutPolygon>, state: Arc<CutState>) {
        self.entries.push((poly, state));
    }

    pub fn reset(&self) {
        for (_, state) in &self.entries {
            state.reset();
        }
    }

    /// Tests one 2-D sample against every polygon.
    pub fn test2(&self, x: f64, y: f64) {
        for (poly, state) in &self.entries {
            if poly.contains(x, y) {
                state.raise();
            }
        }
    }

    /// Tests one 1-D sample against every polygon's x projection.
    pub fn test1(&self, x: f64) {
        for (poly, state) in &self.entries {
            if poly.contains_x(x) {
                state.raise();
            }
        }
    }
}

/// The consuming side, owned by a gated sink: the source sinks whose cuts
/// gate this one, with the flags to check.
#[derive(Debug, Default)]
pub struct CutConsumer {
    entries: Vec<(NodeId, Arc<CutState>)>,
}

impl CutConsumer {
    pub fn register(&mut self, source: NodeId, state: Arc<CutState>) {
        self.entries.push((source, state));
    }

    /// Processes every source sink so its flags are up to date this event.
    pub fn process(&self, g: &Graph, evid: u64, ctx: &EventCtx) -> Result<(), EvalError> {
        for (source, _) in &self.entries {
            g.process(*source, evid, ctx)?;
        }
        Ok(())
    }

    /// True when every gating cut passed this event.
    pub fn is_ok(&self) -> bool {
        self.entries.iter().all(|(_, state)| state.passed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_odd_rule_on_a_square() {
        let p = CutPolygon::new("h", &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        assert!(p.contains(2.0, 2.0));
        assert!(!p.contains(5.0, 2.0));
        assert!(!p.contains(-1.0, -1.0));
    }

    #[test]
    fn concave_polygon_excludes_the_notch() {
        // A "U" shape: the middle of the opening is outside.
        let p = CutPolygon::new(
            "h",
            &[
                (0.0, 0.0),
                (6.0, 0.0),
                (6.0, 4.0),
                (4.0, 4.0),
                (4.0, 1.0),
                (2.0, 1.0),
                (2.0, 4.0),
                (0.0, 4.0),
            ],
        );
        assert!(p.contains(1.0, 2.0));
        assert!(p.contains(5.0, 2.0));
        assert!(!p.contains(3.0, 3.0), "the notch is outside");
    }

    #[test]
    fn x_projection_covers_the_span() {
        let p = CutPolygon::new("h", &[(1.0, 0.0), (3.0, 0.0), (3.0, 1.0), (1.0, 1.0)]);
        assert!(p.contains_x(2.0));
        assert!(!p.contains_x(0.5));
        assert!(!p.contains_x(3.5));
    }

    #[test]
    fn flags_reset_and_raise() {
        let state = Arc::new(CutState::default());
        let poly = Arc::new(CutPolygon::new(
            "h",
            &[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)],
        ));
        let mut producer = CutProducer::default();
        producer.register(poly, Arc::clone(&state));

        producer.test2(1.0, 1.0);
        assert!(state.passed());
        producer.reset();
        assert!(!state.passed());
        producer.test2(5.0, 5.0);
        assert!(!state.passed());
    }
}
