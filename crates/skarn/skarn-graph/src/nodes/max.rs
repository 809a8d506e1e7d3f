//! Per-channel maximum hit.

use skarn_value::Value;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct MaxNode {
    child: NodeId,
}

impl MaxNode {
    pub(crate) fn new(child: NodeId) -> Self {
        MaxNode { child }
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
    let _ = out.set_type(val.ty());
    for (ch, hits) in super::groups(val) {
        let best = hits
            .iter()
            .copied()
            .max_by(|a, b| {
                a.as_f64_signed(val.ty())
                    .partial_cmp(&b.as_f64_signed(val.ty()))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(s) = best {
            out.push(ch, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_value::{Scalar, SigType};

    #[test]
    fn keeps_the_single_largest_hit_per_channel() {
        let mut v = Value::new();
        v.set_type(SigType::I64).unwrap();
        v.push(2, Scalar::from_i64(-5));
        v.push(2, Scalar::from_i64(3));
        v.push(2, Scalar::from_i64(1));
        v.push(9, Scalar::from_i64(-7));
        let mut out = Value::new();
        apply(&v, &mut out);
        assert_eq!(out.ids(), &[2, 9]);
        assert_eq!(out.hits()[0].i64(), 3);
        assert_eq!(out.hits()[1].i64(), -7);
    }
}
