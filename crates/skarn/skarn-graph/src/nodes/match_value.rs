//! Greedy value matching within a cutoff.
//!
//! Within every channel both sides carry, hits pair greedily: a pair is
//! emitted when the values differ by at most the cutoff, otherwise the side
//! with the smaller value advances (the left side on ties).

use skarn_value::Value;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct MatchValueNode {
    l: NodeId,
    r: NodeId,
    cutoff: f64,
}

impl MatchValueNode {
    pub(crate) fn new(l: NodeId, r: NodeId, cutoff: f64) -> Self {
        MatchValueNode { l, r, cutoff }
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
        apply(&l, &r, self.cutoff, &mut out_l[0], &mut out_r[0]);
        Ok(())
    }
}

pub fn apply(l: &Value, r: &Value, cutoff: f64, out_l: &mut Value, out_r: &mut Value) {
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
        let mut h_l = 0usize;
        let mut h_r = 0usize;
        while h_l < hits_l.len() && h_r < hits_r.len() {
            let vl = hits_l[h_l].as_f64_signed(l.ty());
            let vr = hits_r[h_r].as_f64_signed(r.ty());
            if (vl - vr).abs() <= cutoff {
                out_l.push(ch_l, hits_l[h_l]);
                out_r.push(ch_l, hits_r[h_r]);
                h_l += 1;
                h_r += 1;
            } else if vl <= vr {
                h_l += 1;
            } else {
                h_r += 1;
            }
        }
        i_l += 1;
        i_r += 1;
    }
}
