//! Extracts a single hit and its channel from a compound value.

use skarn_value::Value;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct ArrayNode {
    child: NodeId,
    /// Group index to pick.
    i: u64,
    /// Hit index within the group.
    mhit_i: u64,
}

impl ArrayNode {
    pub(crate) fn new(child: NodeId, i: u64, mhit_i: u64) -> Self {
        ArrayNode { child, i, mhit_i }
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
        apply(&val, self.i, self.mhit_i, &mut out[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, i: u64, mhit_i: u64, out: &mut Value) {
    out.clear();
    let i = i as usize;
    if i >= val.ids().len() {
        return;
    }
    let hits = val.group(i);
    if let Some(&s) = hits.get(mhit_i as usize) {
        let _ = out.set_type(val.ty());
        out.push(val.ids()[i], s);
    }
}
