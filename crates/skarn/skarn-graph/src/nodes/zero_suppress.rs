//! Drops hits at or below a magnitude cutoff.

use skarn_value::Value;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct ZeroSuppressNode {
    child: NodeId,
    cutoff: f64,
}

impl ZeroSuppressNode {
    pub(crate) fn new(child: NodeId, cutoff: f64) -> Self {
        ZeroSuppressNode { child, cutoff }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.child, evid, ctx)?;
        let val = g.value(self.child, 0);
        let mut out = node.out.borrow_mut();
        apply(&val, self.cutoff, &mut out[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, cutoff: f64, out: &mut Value) {
    out.clear();
    let _ = out.set_type(val.ty());
    for (ch, hits) in super::groups(val) {
        for &s in hits {
            if s.as_f64_signed(val.ty()).abs() > cutoff {
                out.push(ch, s);
            }
        }
    }
}
