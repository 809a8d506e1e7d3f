//! Coarse/fine time composition.
//!
//! TDCs deliver a coarse counter plus a fine interpolation count whose full
//! scale is not fixed; the running per-channel maximum fine value is the
//! usual self-calibration. The composed time is
//! `coarse - fine * (range / max_fine)`.

use std::cell::RefCell;
use std::collections::HashMap;

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct CoarseFineNode {
    coarse: NodeId,
    fine: NodeId,
    range: f64,
    /// Running per-channel maximum of the fine counts.
    max_fine: RefCell<HashMap<u32, f64>>,
}

impl CoarseFineNode {
    pub(crate) fn new(coarse: NodeId, fine: NodeId, range: f64) -> Self {
        CoarseFineNode {
            coarse,
            fine,
            range,
            max_fine: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.coarse, evid, ctx)?;
        g.process(self.fine, evid, ctx)?;
        let coarse = g.value(self.coarse, 0);
        let fine = g.value(self.fine, 0);
        let mut out = node.out.borrow_mut();
        apply(
            &coarse,
            &fine,
            self.range,
            &mut self.max_fine.borrow_mut(),
            &mut out[0],
        );
        Ok(())
    }
}

pub fn apply(
    coarse: &Value,
    fine: &Value,
    range: f64,
    max_fine: &mut HashMap<u32, f64>,
    out: &mut Value,
) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    for (i, &ch) in coarse.ids().iter().enumerate() {
        let fine_hits = super::channel_hits(fine, ch);
        if fine_hits.is_empty() {
            continue;
        }
        let c_hits = coarse.group(i);
        let n = c_hits.len().min(fine_hits.len());
        for h in 0..n {
            let c = c_hits[h].as_f64_signed(coarse.ty());
            let f = fine_hits[h].as_f64_signed(fine.ty());
            let seen = max_fine.entry(ch).or_insert(1.0);
            if f > *seen {
                *seen = f;
            }
            out.push(ch, Scalar::from_f64(c - f * (range / *seen)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(ty: SigType, hits: &[(u32, u64)]) -> Value {
        let mut v = Value::new();
        v.set_type(ty).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_u64(x));
        }
        v
    }

    #[test]
    fn fine_count_scales_by_running_max() {
        let coarse = value(SigType::U64, &[(1, 100)]);
        let fine = value(SigType::U64, &[(1, 50)]);
        let mut max_fine = HashMap::new();
        max_fine.insert(1, 100.0);
        let mut out = Value::new();
        apply(&coarse, &fine, 10.0, &mut max_fine, &mut out);
        // 100 - 50 * (10 / 100) = 95.
        assert_eq!(out.ids(), &[1]);
        assert_eq!(out.hits()[0].f64(), 95.0);
    }

    #[test]
    fn maximum_tracks_upward() {
        let coarse = value(SigType::U64, &[(0, 10)]);
        let fine = value(SigType::U64, &[(0, 8)]);
        let mut max_fine = HashMap::new();
        let mut out = Value::new();
        apply(&coarse, &fine, 4.0, &mut max_fine, &mut out);
        // First fine value becomes the scale: 10 - 8 * (4/8) = 6.
        assert_eq!(out.hits()[0].f64(), 6.0);
        assert_eq!(max_fine[&0], 8.0);
    }

    #[test]
    fn channels_without_fine_are_dropped() {
        let coarse = value(SigType::U64, &[(0, 10), (1, 20)]);
        let fine = value(SigType::U64, &[(1, 2)]);
        let mut max_fine = HashMap::new();
        let mut out = Value::new();
        apply(&coarse, &fine, 4.0, &mut max_fine, &mut out);
        assert_eq!(out.ids(), &[1]);
    }
}
