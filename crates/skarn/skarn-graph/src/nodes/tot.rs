//! Time-over-threshold: pairs leading and trailing edges per channel.
//!
//! Edges arrive as wrapping counter values; a trailing edge belongs to the
//! preceding leading edge when their wrap-around difference is positive and
//! inside the counter range. Trailing edges with no leading partner are
//! skipped.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::nodes::sub_mod::sub_mod;
use crate::EvalError;

pub struct TotNode {
    leading: NodeId,
    trailing: NodeId,
    range: f64,
}

impl TotNode {
    pub(crate) fn new(leading: NodeId, trailing: NodeId, range: f64) -> Self {
        TotNode {
            leading,
            trailing,
            range,
        }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.leading, evid, ctx)?;
        g.process(self.trailing, evid, ctx)?;
        let lead = g.value(self.leading, 0);
        let trail = g.value(self.trailing, 0);
        let mut out = node.out.borrow_mut();
        apply(&lead, &trail, self.range, &mut out[0]);
        Ok(())
    }
}

pub fn apply(lead: &Value, trail: &Value, range: f64, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    let mut i_l = 0usize;
    let mut i_t = 0usize;
    while i_l < lead.ids().len() && i_t < trail.ids().len() {
        let ch_l = lead.ids()[i_l];
        let ch_t = trail.ids()[i_t];
        if ch_l < ch_t {
            i_l += 1;
            continue;
        }
        if ch_t < ch_l {
            i_t += 1;
            continue;
        }
        let hits_l = lead.group(i_l);
        let hits_t = trail.group(i_t);
        let mut h_l = 0usize;
        let mut h_t = 0usize;
        while h_l < hits_l.len() && h_t < hits_t.len() {
            let width = sub_mod(
                hits_t[h_t].as_f64_signed(trail.ty()),
                hits_l[h_l].as_f64_signed(lead.ty()),
                range,
            );
            if width > 0.0 {
                out.push(ch_l, Scalar::from_f64(width));
                h_l += 1;
                h_t += 1;
            } else {
                // Trailing edge before any leading edge; drop it.
                h_t += 1;
            }
        }
        i_l += 1;
        i_t += 1;
    }
}
