//! Per-channel hit count.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct LengthNode {
    child: NodeId,
}

impl LengthNode {
    pub(crate) fn new(child: NodeId) -> Self {
        LengthNode { child }
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
        apply(&val, &mut out[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::U64);
    for (ch, hits) in super::groups(val) {
        out.push(ch, Scalar::from_u64(hits.len() as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_hits_per_channel() {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        v.push(1, Scalar::from_u64(10));
        v.push(1, Scalar::from_u64(20));
        v.push(3, Scalar::from_u64(30));
        let mut out = Value::new();
        apply(&v, &mut out);
        assert_eq!(out.ids(), &[1, 3]);
        assert_eq!(out.hits()[0].u64(), 2);
        assert_eq!(out.hits()[1].u64(), 1);
    }
}
