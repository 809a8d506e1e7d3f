//! Merges same-type streams by channel.
//!
//! K-way walk over the sources' channel lists: for each successive minimum
//! channel, every source holding that channel appends its hits in source
//! order, so per-channel hit order follows the declaration order of the
//! source list. Mixing concrete types is a construction mistake surfaced as
//! a fatal event error.

use skarn_value::{SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct MergeNode {
    sources: Vec<NodeId>,
}

impl MergeNode {
    pub(crate) fn new(sources: Vec<NodeId>) -> Self {
        MergeNode { sources }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        for &src in &self.sources {
            g.process(src, evid, ctx)?;
        }
        let vals: Vec<_> = self.sources.iter().map(|&s| g.value(s, 0)).collect();
        let refs: Vec<&Value> = vals.iter().map(|v| &**v).collect();
        let mut out = node.out.borrow_mut();
        apply(&refs, &mut out[0]).map_err(|source| EvalError::Type {
            loc: node.loc.clone(),
            source,
        })
    }
}

pub fn apply(sources: &[&Value], out: &mut Value) -> Result<(), skarn_value::TypeMismatch> {
    out.clear();

    let mut ty = SigType::None;
    for v in sources {
        let vt = v.ty();
        if ty != SigType::None && vt != SigType::None && vt != ty {
            return Err(skarn_value::TypeMismatch { had: ty, got: vt });
        }
        if vt != SigType::None {
            ty = vt;
        }
    }
    if ty == SigType::None {
        return Ok(());
    }
    out.set_type(ty)?;

    let mut group_i = vec![0usize; sources.len()];
    loop {
        let mut min_ch = u32::MAX;
        let mut any = false;
        for (k, v) in sources.iter().enumerate() {
            if let Some(&ch) = v.ids().get(group_i[k]) {
                min_ch = min_ch.min(ch);
                any = true;
            }
        }
        if !any {
            break;
        }
        for (k, v) in sources.iter().enumerate() {
            let Some(&ch) = v.ids().get(group_i[k]) else {
                continue;
            };
            if ch != min_ch {
                continue;
            }
            for &s in v.group(group_i[k]) {
                out.push(min_ch, s);
            }
            group_i[k] += 1;
        }
    }
    Ok(())
}
