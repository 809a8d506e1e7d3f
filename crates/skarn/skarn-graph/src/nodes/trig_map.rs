//! Cyclic subtraction with per-channel offsets from a trigger map file.

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::nodes::sub_mod;
use crate::trig_map::Offsets;
use crate::EvalError;

pub struct TrigMapNode {
    l: NodeId,
    r: NodeId,
    range: f64,
    offsets: Offsets,
}

impl TrigMapNode {
    pub(crate) fn new(l: NodeId, r: NodeId, range: f64, offsets: Offsets) -> Self {
        TrigMapNode {
            l,
            r,
            range,
            offsets,
        }
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
        sub_mod::apply(&l, &r, self.range, Some(&self.offsets), &mut out[0]);
        Ok(())
    }
}
