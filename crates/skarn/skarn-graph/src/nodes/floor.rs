//! Pointwise floor.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct FloorNode {
    child: NodeId,
}

impl FloorNode {
    pub(crate) fn new(child: NodeId) -> Self {
        FloorNode { child }
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
    let _ = out.set_type(SigType::F64);
    for (ch, hits) in super::groups(val) {
        for &s in hits {
            out.push(ch, Scalar::from_f64(s.as_f64_signed(val.ty()).floor()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_every_hit() {
        let mut v = Value::new();
        v.set_type(SigType::F64).unwrap();
        v.push(1, Scalar::from_f64(2.7));
        v.push(1, Scalar::from_f64(-0.5));
        v.push(4, Scalar::from_f64(3.0));
        let mut out = Value::new();
        apply(&v, &mut out);
        assert_eq!(out.ids(), &[1, 4]);
        assert_eq!(out.hits()[0].f64(), 2.0);
        assert_eq!(out.hits()[1].f64(), -1.0);
        assert_eq!(out.hits()[2].f64(), 3.0);
    }
}
