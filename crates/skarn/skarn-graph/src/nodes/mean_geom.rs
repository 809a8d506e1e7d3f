//! Geometric mean of paired hits, per channel.
//!
//! Same pairing as the arithmetic two-argument mean; the reduction is
//! `(l*r)^(1/2)` for a full pair and the bare value when only one side has
//! the hit.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct MeanGeomNode {
    l: NodeId,
    r: NodeId,
}

impl MeanGeomNode {
    pub(crate) fn new(l: NodeId, r: NodeId) -> Self {
        MeanGeomNode { l, r }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.l, evid, ctx)?;
        g.process(self.r, evid, ctx)?;
        let l = g.value(self.l, 0);
        let r = g.value(self.r, 0);
        let mut out = node.out.borrow_mut();
        apply(&l, &r, &mut out[0]);
        Ok(())
    }
}

pub fn apply(l: &Value, r: &Value, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    let mut i_l = 0usize;
    let mut i_r = 0usize;
    loop {
        let ch_l = l.ids().get(i_l).copied();
        let ch_r = r.ids().get(i_r).copied();
        let ch = match (ch_l, ch_r) {
            (None, None) => break,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (Some(a), Some(b)) => a.min(b),
        };
        let on_l = ch_l == Some(ch);
        let on_r = ch_r == Some(ch);
        let hits_l = if on_l { l.group(i_l) } else { &[] };
        let hits_r = if on_r { r.group(i_r) } else { &[] };
        let n = hits_l.len().max(hits_r.len());
        for h in 0..n {
            let vl = hits_l.get(h).map(|s| s.as_f64_signed(l.ty()));
            let vr = hits_r.get(h).map(|s| s.as_f64_signed(r.ty()));
            let v = match (vl, vr) {
                (Some(a), Some(b)) => (a * b).sqrt(),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            if v.is_finite() {
                out.push(ch, Scalar::from_f64(v));
            }
        }
        if on_l {
            i_l += 1;
        }
        if on_r {
            i_r += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(hits: &[(u32, u64)]) -> Value {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_u64(x));
        }
        v
    }

    #[test]
    fn paired_hits_take_the_geometric_mean() {
        let l = value(&[(0, 4)]);
        let r = value(&[(0, 9)]);
        let mut out = Value::new();
        apply(&l, &r, &mut out);
        assert_eq!(out.hits()[0].f64(), 6.0);
    }

    #[test]
    fn negative_products_are_dropped() {
        let mut l = Value::new();
        l.set_type(SigType::I64).unwrap();
        l.push(0, Scalar::from_i64(-4));
        let r = value(&[(0, 9)]);
        let mut out = Value::new();
        apply(&l, &r, &mut out);
        assert!(out.is_empty(), "sqrt of a negative product is NaN");
    }
}
