//! Retains channels inside an inclusive id window.

use skarn_value::Value;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct SelectIdNode {
    child: NodeId,
    first: u32,
    last: u32,
}

impl SelectIdNode {
    pub(crate) fn new(child: NodeId, first: u32, last: u32) -> Self {
        SelectIdNode { child, first, last }
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
        apply(&val, self.first, self.last, &mut out[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, first: u32, last: u32, out: &mut Value) {
    out.clear();
    let _ = out.set_type(val.ty());
    for (ch, hits) in super::groups(val) {
        if ch < first || ch > last {
            continue;
        }
        for &s in hits {
            out.push(ch, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_value::{Scalar, SigType};

    #[test]
    fn keeps_only_the_window() {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        for ch in [0u32, 3, 5, 7, 9] {
            v.push(ch, Scalar::from_u64(ch as u64 * 10));
        }
        let mut out = Value::new();
        apply(&v, 3, 7, &mut out);
        assert_eq!(out.ids(), &[3, 5, 7]);
        assert_eq!(out.hits()[0].u64(), 30);
    }
}
