//! Composes a value from separate id/end/v streams.
//!
//! The inverse of `Member`: where the input format delivers the parts of a
//! compound signal as plain streams, this node reassembles them into one
//! multi-hit value.

use skarn_value::SigType;
use tracing::warn;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct SignalUserNode {
    id: NodeId,
    end: Option<NodeId>,
    v: NodeId,
}

impl SignalUserNode {
    pub(crate) fn new(id: NodeId, end: Option<NodeId>, v: NodeId) -> Self {
        SignalUserNode { id, end, v }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.id, evid, ctx)?;
        g.process(self.v, evid, ctx)?;
        if let Some(end) = self.end {
            g.process(end, evid, ctx)?;
        }

        let mut out = node.out.borrow_mut();
        let out = &mut out[0];
        out.clear();

        let id_val = g.value(self.id, 0);
        if !id_val.ty().is_int() && id_val.ty() != SigType::None {
            return Err(EvalError::Node {
                loc: node.loc.clone(),
                msg: "id stream must be integer typed".to_string(),
            });
        }
        let v_val = g.value(self.v, 0);
        out.set_type(v_val.ty()).map_err(|source| EvalError::Type {
            loc: node.loc.clone(),
            source,
        })?;

        let ids = id_val.hits();
        let vs = v_val.hits();

        if let Some(end) = self.end {
            let end_val = g.value(end, 0);
            if !end_val.ty().is_int() && end_val.ty() != SigType::None {
                return Err(EvalError::Node {
                    loc: node.loc.clone(),
                    msg: "end stream must be integer typed".to_string(),
                });
            }
            let ends = end_val.hits();
            if ids.len() != ends.len() {
                warn!(loc = %node.loc, "id and end size mismatch ({} vs {})", ids.len(), ends.len());
                return Ok(());
            }
            let mut vi = 0usize;
            for i in 0..ids.len() {
                let ch = ids[i].u64() as u32;
                let end_i = (ends[i].u64() as usize).min(vs.len());
                while vi < end_i {
                    out.push(ch, vs[vi]);
                    vi += 1;
                }
            }
        } else {
            if ids.len() != vs.len() {
                warn!(loc = %node.loc, "id and data size mismatch ({} vs {})", ids.len(), vs.len());
                return Ok(());
            }
            for i in 0..ids.len() {
                out.push(ids[i].u64() as u32, vs[i]);
            }
        }
        Ok(())
    }
}
