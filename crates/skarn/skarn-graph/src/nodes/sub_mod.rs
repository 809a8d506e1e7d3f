//! Cyclic subtraction around zero.
//!
//! `(l, r, range) -> ((l - r + 1.5*range) mod range) - range/2`, the usual
//! way to difference wrapping counters (clock phases, ring TDC values) so
//! the result lands in `[-range/2, range/2)`.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

/// The wrap-around difference itself.
#[inline]
pub fn sub_mod(l: f64, r: f64, range: f64) -> f64 {
    (l - r + 1.5 * range).rem_euclid(range) - range / 2.0
}

pub struct SubModNode {
    l: NodeId,
    r: NodeId,
    range: f64,
}

impl SubModNode {
    pub(crate) fn new(l: NodeId, r: NodeId, range: f64) -> Self {
        SubModNode { l, r, range }
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
        apply(&l, &r, self.range, None, &mut out[0]);
        Ok(())
    }
}

/// Shared by `SubMod` and `TrigMap`; the latter passes per-channel offsets
/// added to the left side.
pub fn apply(
    l: &Value,
    r: &Value,
    range: f64,
    offsets: Option<&std::collections::HashMap<u32, f64>>,
    out: &mut Value,
) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    let mut i_l = 0usize;
    let mut i_r = 0usize;
    while i_l < l.ids().len() && i_r < r.ids().len() {
        let ch_l = l.ids()[i_l];
        let ch_r = r.ids()[i_r];
        if ch_l < ch_r {
            i_l += 1;
            continue;
        }
        if ch_r < ch_l {
            i_r += 1;
            continue;
        }
        let off = offsets
            .and_then(|m| m.get(&ch_l).copied())
            .unwrap_or(0.0);
        let hits_l = l.group(i_l);
        let hits_r = r.group(i_r);
        let n = hits_l.len().min(hits_r.len());
        for h in 0..n {
            let vl = hits_l[h].as_f64_signed(l.ty()) + off;
            let vr = hits_r[h].as_f64_signed(r.ty());
            out.push(ch_l, Scalar::from_f64(sub_mod(vl, vr, range)));
        }
        i_l += 1;
        i_r += 1;
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
    fn wraps_into_half_open_window() {
        assert_eq!(sub_mod(2.0, 1.0, 20.0), 1.0);
        assert_eq!(sub_mod(30.0, 2.0, 20.0), 8.0);
        assert_eq!(sub_mod(1.0, 2.0, 20.0), -1.0);
        assert_eq!(sub_mod(5.0, 5.0, 20.0), 0.0);
    }

    #[test]
    fn pairs_common_channels() {
        let l = value(&[(2, 2), (3, 30)]);
        let r = value(&[(2, 1), (3, 2), (3, 30)]);
        let mut out = Value::new();
        apply(&l, &r, 20.0, None, &mut out);

        assert_eq!(out.ids(), &[2, 3]);
        assert_eq!(out.ends(), &[1, 2]);
        assert_eq!(out.hits()[0].f64(), 1.0);
        assert_eq!(out.hits()[1].f64(), 8.0);
    }

    #[test]
    fn offsets_shift_the_left_side() {
        let l = value(&[(4, 10)]);
        let r = value(&[(4, 10)]);
        let mut offsets = std::collections::HashMap::new();
        offsets.insert(4u32, 3.0);
        let mut out = Value::new();
        apply(&l, &r, 20.0, Some(&offsets), &mut out);
        assert_eq!(out.hits()[0].f64(), 3.0);
    }
}
