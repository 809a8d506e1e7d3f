//! Pairs hits of channels present on both sides.
//!
//! For every channel both inputs carry, the first `min(nl, nr)` hits of
//! each side are emitted pairwise: output 0 holds the left halves, output 1
//! the right halves. Channels only one side saw are dropped.

use skarn_value::Value;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct MatchIdNode {
    l: NodeId,
    r: NodeId,
}

impl MatchIdNode {
    pub(crate) fn new(l: NodeId, r: NodeId) -> Self {
        MatchIdNode { l, r }
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
        let (out_l, out_r) = out.split_at_mut(1);
        apply(&l, &r, &mut out_l[0], &mut out_r[0]);
        Ok(())
    }
}

pub fn apply(l: &Value, r: &Value, out_l: &mut Value, out_r: &mut Value) {
    out_l.clear();
    out_r.clear();
    let _ = out_l.set_type(l.ty());
    let _ = out_r.set_type(r.ty());

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
        let hits_l = l.group(i_l);
        let hits_r = r.group(i_r);
        let n = hits_l.len().min(hits_r.len());
        for h in 0..n {
            out_l.push(ch_l, hits_l[h]);
            out_r.push(ch_l, hits_r[h]);
        }
        i_l += 1;
        i_r += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_value::{Scalar, SigType};

    fn value(hits: &[(u32, u64)]) -> Value {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_u64(x));
        }
        v
    }

    #[test]
    fn only_common_channels_survive() {
        let l = value(&[(1, 10), (2, 20), (4, 40)]);
        let r = value(&[(2, 21), (3, 31), (4, 41)]);
        let mut out_l = Value::new();
        let mut out_r = Value::new();
        apply(&l, &r, &mut out_l, &mut out_r);

        assert_eq!(out_l.ids(), &[2, 4]);
        assert_eq!(out_r.ids(), &[2, 4]);
        assert_eq!(out_l.hits()[0].u64(), 20);
        assert_eq!(out_r.hits()[0].u64(), 21);
    }

    #[test]
    fn multi_hit_pairs_up_to_the_shorter_side() {
        let l = value(&[(7, 1), (7, 2), (7, 3)]);
        let r = value(&[(7, 9), (7, 8)]);
        let mut out_l = Value::new();
        let mut out_r = Value::new();
        apply(&l, &r, &mut out_l, &mut out_r);

        assert_eq!(out_l.hits().len(), 2);
        assert_eq!(out_r.hits().len(), 2);
        assert_eq!(out_l.hits()[1].u64(), 2);
        assert_eq!(out_r.hits()[1].u64(), 8);
    }
}
