//! Pedestal estimation and subtraction.
//!
//! Every channel accumulates a running mean and variance (Welford) over a
//! calibration window: either the first N events, or, when a trigger
//! pattern node is given, exactly the events it selects. Each event emits
//! two values: the corrected hits (`v - mean`, kept when above the cutoff)
//! and the per-channel pedestal means.

use std::cell::RefCell;
use std::collections::BTreeMap;

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

#[derive(Clone, Copy, Debug, Default)]
struct Welford {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    fn add(&mut self, v: f64) {
        self.n += 1;
        let d = v - self.mean;
        self.mean += d / self.n as f64;
        self.m2 += d * (v - self.mean);
    }

    fn sigma(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        (self.m2 / self.n as f64).sqrt()
    }
}

#[derive(Default)]
pub struct PedState {
    chans: BTreeMap<u32, Welford>,
    events: u64,
}

pub struct PedestalNode {
    child: NodeId,
    cutoff: f64,
    tpat: Option<NodeId>,
    /// Calibration window in events, ignored when `tpat` selects instead.
    window: u64,
    state: RefCell<PedState>,
}

impl PedestalNode {
    pub(crate) fn new(child: NodeId, cutoff: f64, tpat: Option<NodeId>, window: u64) -> Self {
        PedestalNode {
            child,
            cutoff,
            tpat,
            window,
            state: RefCell::new(PedState::default()),
        }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.child, evid, ctx)?;

        let calibrating = match self.tpat {
            Some(tpat) => {
                g.process(tpat, evid, ctx)?;
                !g.value(tpat, 0).is_empty()
            }
            None => self.state.borrow().events < self.window,
        };

        let val = g.value(self.child, 0);
        let mut out = node.out.borrow_mut();
        let (corrected, pedestal) = out.split_at_mut(1);
        apply(
            &val,
            self.cutoff,
            calibrating,
            &mut self.state.borrow_mut(),
            &mut corrected[0],
            &mut pedestal[0],
        );
        Ok(())
    }
}

pub fn apply(
    val: &Value,
    cutoff: f64,
    calibrating: bool,
    state: &mut PedState,
    corrected: &mut Value,
    pedestal: &mut Value,
) {
    corrected.clear();
    pedestal.clear();
    let _ = corrected.set_type(SigType::F64);
    let _ = pedestal.set_type(SigType::F64);

    state.events += 1;

    for (ch, hits) in super::groups(val) {
        for &s in hits {
            let v = s.as_f64_signed(val.ty());
            if calibrating {
                state.chans.entry(ch).or_default().add(v);
            }
            let acc = state.chans.get(&ch).copied().unwrap_or_default();
            let corr = v - acc.mean;
            if corr > cutoff.max(acc.sigma()) {
                corrected.push(ch, Scalar::from_f64(corr));
            }
        }
    }

    for (&ch, acc) in &state.chans {
        pedestal.push(ch, Scalar::from_f64(acc.mean));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(hits: &[(u32, u64)]) -> Value {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_u64(x));
        }
        v
    }

    #[test]
    fn pedestal_converges_to_the_channel_mean() {
        let mut state = PedState::default();
        let mut corrected = Value::new();
        let mut pedestal = Value::new();
        // Channel 2 alternates 2/4 (mean 3), channel 5 is constant 10.
        for i in 0..1000u64 {
            let v = event(&[(2, 2 + 2 * (i % 2)), (5, 10)]);
            apply(&v, 0.1, true, &mut state, &mut corrected, &mut pedestal);
        }
        assert_eq!(pedestal.ids(), &[2, 5]);
        assert!((pedestal.hits()[0].f64() - 3.0).abs() < 0.01);
        assert!((pedestal.hits()[1].f64() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn correction_subtracts_and_suppresses() {
        let mut state = PedState::default();
        let mut corrected = Value::new();
        let mut pedestal = Value::new();
        // Calibrate on constant 10.
        for _ in 0..100 {
            let v = event(&[(1, 10)]);
            apply(&v, 0.5, true, &mut state, &mut corrected, &mut pedestal);
        }
        // Signal event, no longer calibrating: 60 - 10 = 50 passes.
        let v = event(&[(1, 60)]);
        apply(&v, 0.5, false, &mut state, &mut corrected, &mut pedestal);
        assert_eq!(corrected.ids(), &[1]);
        assert!((corrected.hits()[0].f64() - 50.0).abs() < 1e-9);

        // A pedestal-level event is fully suppressed.
        let v = event(&[(1, 10)]);
        apply(&v, 0.5, false, &mut state, &mut corrected, &mut pedestal);
        assert!(corrected.is_empty());
    }
}
