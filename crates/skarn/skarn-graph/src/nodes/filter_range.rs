//! Per-channel range gate.
//!
//! Conditions and arguments are hit-aligned within each channel: a hit
//! index passes when every condition node's hit at that channel and index
//! lies inside its interval, and then every argument's hit at that position
//! is forwarded to the matching output.

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

/// One interval condition with open/closed end flags.
#[derive(Clone, Copy, Debug)]
pub struct FilterCond {
    pub node: NodeId,
    pub lower: f64,
    pub lower_le: bool,
    pub upper: f64,
    pub upper_le: bool,
}

impl FilterCond {
    fn holds(&self, v: f64) -> bool {
        let lo = if self.lower_le { v >= self.lower } else { v > self.lower };
        let hi = if self.upper_le { v <= self.upper } else { v < self.upper };
        lo && hi
    }
}

pub struct FilterRangeNode {
    conds: Vec<FilterCond>,
    args: Vec<NodeId>,
}

impl FilterRangeNode {
    pub(crate) fn new(conds: Vec<FilterCond>, args: Vec<NodeId>) -> Self {
        FilterRangeNode { conds, args }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        for cond in &self.conds {
            g.process(cond.node, evid, ctx)?;
        }
        for &arg in &self.args {
            g.process(arg, evid, ctx)?;
        }

        let cond_vals: Vec<_> = self.conds.iter().map(|c| g.value(c.node, 0)).collect();
        let arg_vals: Vec<_> = self.args.iter().map(|&a| g.value(a, 0)).collect();

        let mut out = node.out.borrow_mut();
        for (k, arg_val) in arg_vals.iter().enumerate() {
            out[k].clear();
            let _ = out[k].set_type(arg_val.ty());
        }

        let Some(first) = cond_vals.first() else {
            return Ok(());
        };
        for &ch in first.ids() {
            let cond_hits: Vec<&[_]> = cond_vals
                .iter()
                .map(|v| super::channel_hits(v, ch))
                .collect();
            if cond_hits.iter().any(|h| h.is_empty()) {
                continue;
            }
            let n = cond_hits.iter().map(|h| h.len()).min().unwrap();
            for h in 0..n {
                let pass = self
                    .conds
                    .iter()
                    .zip(&cond_hits)
                    .zip(&cond_vals)
                    .all(|((cond, hits), val)| cond.holds(hits[h].as_f64_signed(val.ty())));
                if !pass {
                    continue;
                }
                for (k, arg_val) in arg_vals.iter().enumerate() {
                    let hits = super::channel_hits(arg_val, ch);
                    if let Some(&s) = hits.get(h) {
                        out[k].push(ch, s);
                    }
                }
            }
        }
        Ok(())
    }
}
