//! Packs sub-values LSB-first into one integer per event.

use skarn_value::{Scalar, SigType, Value};
use tracing::warn;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct BitfieldNode {
    /// `(source, width_bits)`, first entry in the least significant bits.
    fields: Vec<(NodeId, u32)>,
}

impl BitfieldNode {
    pub(crate) fn new(fields: Vec<(NodeId, u32)>) -> Self {
        BitfieldNode { fields }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        for &(src, _) in &self.fields {
            g.process(src, evid, ctx)?;
        }
        let mut out = node.out.borrow_mut();
        let out = &mut out[0];
        out.clear();
        let _ = out.set_type(SigType::U64);

        let mut packed = 0u64;
        let mut shift = 0u32;
        for &(src, bits) in &self.fields {
            let val = g.value(src, 0);
            let Some(&first) = val.hits().first() else {
                // An absent field means no word this event.
                return Ok(());
            };
            if !val.ty().is_int() {
                warn!(loc = %node.loc, "bitfield over non-integer value");
                return Ok(());
            }
            let v = first.u64();
            let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
            if v > mask {
                warn!(loc = %node.loc, value = v, bits, "bitfield value exceeds its width");
                return Ok(());
            }
            packed |= v << shift;
            shift += bits;
        }
        out.push(0, Scalar::from_u64(packed));
        Ok(())
    }
}
