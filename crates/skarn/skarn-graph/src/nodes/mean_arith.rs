//! Arithmetic mean, in two shapes.
//!
//! Two-argument: per-channel mean of paired hits, walking both channel
//! lists in step; a hit missing on one side means the other side's hit
//! passes through as its own mean.
//!
//! One-argument: reduction across channels at the same hit index, emitted
//! under channel 0; hit index n of the output is the mean of every
//! channel's n-th hit.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct MeanArithNode {
    l: NodeId,
    r: Option<NodeId>,
}

impl MeanArithNode {
    pub(crate) fn new(l: NodeId, r: Option<NodeId>) -> Self {
        MeanArithNode { l, r }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.l, evid, ctx)?;
        let l = g.value(self.l, 0);
        let mut out = node.out.borrow_mut();
        match self.r {
            Some(r) => {
                g.process(r, evid, ctx)?;
                let r = g.value(r, 0);
                apply_pair(&l, &r, &mut out[0]);
            }
            None => apply_across(&l, &mut out[0]),
        }
        Ok(())
    }
}

/// Mean across channels of the n-th hit in each.
pub fn apply_across(l: &Value, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    for dvi in 0.. {
        let mut sum = 0.0;
        let mut num = 0u32;
        for i in 0..l.ids().len() {
            let start = l.group_start(i) as usize;
            let end = l.ends()[i] as usize;
            if start + dvi < end {
                sum += l.get_f64(start + dvi, false);
                num += 1;
            }
        }
        if num == 0 {
            break;
        }
        out.push(0, Scalar::from_f64(sum / num as f64));
    }
}

/// Per-channel mean of paired hits across two inputs.
pub fn apply_pair(l: &Value, r: &Value, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    let mut i_l = 0usize;
    let mut i_r = 0usize;
    let mut h_l = 0usize;
    let mut h_r = 0usize;
    loop {
        let ch_l = l.ids().get(i_l).copied();
        let ch_r = r.ids().get(i_r).copied();
        let ch = match (ch_l, ch_r) {
            (None, None) => break,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (Some(a), Some(b)) => a.min(b),
        };
        let on_l = ch_l == Some(ch);
        let on_r = ch_r == Some(ch);
        let hits_l = if on_l { l.group(i_l) } else { &[] };
        let hits_r = if on_r { r.group(i_r) } else { &[] };
        loop {
            let mut sum = 0.0;
            let mut num = 0u32;
            if on_l && h_l < hits_l.len() {
                sum += hits_l[h_l].as_f64_signed(l.ty());
                h_l += 1;
                num += 1;
            }
            if on_r && h_r < hits_r.len() {
                sum += hits_r[h_r].as_f64_signed(r.ty());
                h_r += 1;
                num += 1;
            }
            if num == 0 {
                break;
            }
            out.push(ch, Scalar::from_f64(sum / num as f64));
        }
        if on_l {
            i_l += 1;
            h_l = 0;
        }
        if on_r {
            i_r += 1;
            h_r = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(hits: &[(u32, u64)]) -> Value {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_u64(x));
        }
        v
    }

    #[test]
    fn paired_channels_average() {
        let l = value(&[(0, 4)]);
        let r = value(&[(0, 6)]);
        let mut out = Value::new();
        apply_pair(&l, &r, &mut out);
        assert_eq!(out.ids(), &[0]);
        assert_eq!(out.hits()[0].f64(), 5.0);
    }

    #[test]
    fn lone_channels_pass_through() {
        let l = value(&[(0, 4), (2, 8)]);
        let r = value(&[(2, 10), (5, 7)]);
        let mut out = Value::new();
        apply_pair(&l, &r, &mut out);
        assert_eq!(out.ids(), &[0, 2, 5]);
        assert_eq!(out.hits()[0].f64(), 4.0);
        assert_eq!(out.hits()[1].f64(), 9.0);
        assert_eq!(out.hits()[2].f64(), 7.0);
    }

    #[test]
    fn across_mode_reduces_per_hit_index() {
        // Channel 1: [2, 4]; channel 3: [6]. Index 0 -> (2+6)/2, index 1 -> 4.
        let l = value(&[(1, 2), (1, 4), (3, 6)]);
        let mut out = Value::new();
        apply_across(&l, &mut out);
        assert_eq!(out.ids(), &[0]);
        assert_eq!(out.hits().len(), 2);
        assert_eq!(out.hits()[0].f64(), 4.0);
        assert_eq!(out.hits()[1].f64(), 4.0);
    }
}
