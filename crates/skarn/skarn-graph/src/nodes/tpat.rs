//! Trigger-pattern gate.
//!
//! Emits a single 1 when any hit of the pattern word intersects the mask,
//! nothing otherwise. Downstream consumers treat a non-empty value as "this
//! event was selected".

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct TpatNode {
    child: NodeId,
    mask: u32,
}

impl TpatNode {
    pub(crate) fn new(child: NodeId, mask: u32) -> Self {
        TpatNode { child, mask }
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
        apply(&val, self.mask, &mut out[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, mask: u32, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::U64);
    let selected = val
        .hits()
        .iter()
        .any(|s| (s.u64() as u32) & mask != 0);
    if selected {
        out.push(0, Scalar::from_u64(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(v: u64) -> Value {
        let mut out = Value::new();
        out.set_type(SigType::U64).unwrap();
        out.push(0, Scalar::from_u64(v));
        out
    }

    #[test]
    fn disjoint_mask_blocks() {
        let mut out = Value::new();
        apply(&word(0x8), 0x6, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn overlapping_mask_selects() {
        let mut out = Value::new();
        apply(&word(0x2), 0x6, &mut out);
        assert_eq!(out.ids(), &[0]);
        assert_eq!(out.ends(), &[1]);
        assert_eq!(out.hits()[0].u64(), 1);
    }
}
