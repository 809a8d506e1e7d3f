//! Arithmetic and transcendental expressions over one or two values.
//!
//! Channel-aligned pairing when both operands are nodes; a missing operand
//! is the constant `d`. Results are always f64 and NaN/Inf results are
//! dropped, so a division by zero simply loses the hit instead of poisoning
//! a histogram axis.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MExprOp {
    Add,
    Sub,
    Mul,
    Div,
    Cos,
    Sin,
    Tan,
    Acos,
    Asin,
    Atan,
    Sqrt,
    Exp,
    Log,
    Abs,
    Pow,
}

impl MExprOp {
    pub fn tag(self) -> &'static str {
        match self {
            MExprOp::Add => "add",
            MExprOp::Sub => "sub",
            MExprOp::Mul => "mul",
            MExprOp::Div => "div",
            MExprOp::Cos => "cos",
            MExprOp::Sin => "sin",
            MExprOp::Tan => "tan",
            MExprOp::Acos => "acos",
            MExprOp::Asin => "asin",
            MExprOp::Atan => "atan",
            MExprOp::Sqrt => "sqrt",
            MExprOp::Exp => "exp",
            MExprOp::Log => "log",
            MExprOp::Abs => "abs",
            MExprOp::Pow => "pow",
        }
    }
}

pub struct MExprNode {
    l: Option<NodeId>,
    r: Option<NodeId>,
    d: f64,
    op: MExprOp,
}

impl MExprNode {
    pub(crate) fn new(l: Option<NodeId>, r: Option<NodeId>, d: f64, op: MExprOp) -> Self {
        MExprNode { l, r, d, op }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        if let Some(l) = self.l {
            g.process(l, evid, ctx)?;
        }
        if let Some(r) = self.r {
            g.process(r, evid, ctx)?;
        }
        let l = self.l.map(|l| g.value(l, 0));
        let r = self.r.map(|r| g.value(r, 0));
        let mut out = node.out.borrow_mut();
        apply(l.as_deref(), r.as_deref(), self.d, self.op, &mut out[0]);
        Ok(())
    }
}

pub fn apply(l: Option<&Value>, r: Option<&Value>, d: f64, op: MExprOp, out: &mut Value) {
    out.clear();
    let _ = out.set_type(SigType::F64);

    if let Some(l) = l {
        if l.ty() == SigType::None || l.ids().is_empty() {
            return;
        }
    }
    if let Some(r) = r {
        if r.ty() == SigType::None || r.ids().is_empty() {
            return;
        }
    }

    // Which operands are nodes: both, left only, or right only.
    enum Mix<'a> {
        Both(&'a Value, &'a Value),
        Left(&'a Value),
        Right(&'a Value),
    }
    let mix = match (l, r) {
        (Some(l), Some(r)) => Mix::Both(l, r),
        (Some(l), None) => Mix::Left(l),
        (None, Some(r)) => Mix::Right(r),
        (None, None) => return,
    };

    let mut emit = |ch: u32, lv: f64, rv: f64| {
        let v = match op {
            MExprOp::Add => lv + rv,
            MExprOp::Sub => lv - rv,
            MExprOp::Mul => lv * rv,
            MExprOp::Div => lv / rv,
            MExprOp::Cos => lv.cos(),
            MExprOp::Sin => lv.sin(),
            MExprOp::Tan => lv.tan(),
            MExprOp::Acos => lv.acos(),
            MExprOp::Asin => lv.asin(),
            MExprOp::Atan => lv.atan(),
            MExprOp::Sqrt => lv.sqrt(),
            MExprOp::Exp => lv.exp(),
            // With a node on the right, d is the base.
            MExprOp::Log => match mix_is_right(l, r) {
                false => lv.ln(),
                true => rv.ln() / d.ln(),
            },
            MExprOp::Abs => lv.abs(),
            MExprOp::Pow => lv.powf(rv),
        };
        if v.is_finite() {
            out.push(ch, Scalar::from_f64(v));
        }
    };

    match mix {
        Mix::Both(l, r) => {
            let mut i_l = 0usize;
            let mut i_r = 0usize;
            while i_l < l.ids().len() && i_r < r.ids().len() {
                let ch_l = l.ids()[i_l];
                let ch_r = r.ids()[i_r];
                if ch_l < ch_r {
                    i_l += 1;
                    continue;
                }
                if ch_r < ch_l {
                    i_r += 1;
                    continue;
                }
                let hits_l = l.group(i_l);
                let hits_r = r.group(i_r);
                let n = hits_l.len().min(hits_r.len());
                for h in 0..n {
                    emit(
                        ch_l,
                        hits_l[h].as_f64_signed(l.ty()),
                        hits_r[h].as_f64_signed(r.ty()),
                    );
                }
                i_l += 1;
                i_r += 1;
            }
        }
        Mix::Left(l) => {
            for (ch, hits) in super::groups(l) {
                for &s in hits {
                    emit(ch, s.as_f64_signed(l.ty()), d);
                }
            }
        }
        Mix::Right(r) => {
            for (ch, hits) in super::groups(r) {
                for &s in hits {
                    emit(ch, d, s.as_f64_signed(r.ty()));
                }
            }
        }
    }
}

fn mix_is_right(l: Option<&Value>, r: Option<&Value>) -> bool {
    l.is_none() && r.is_some()
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

    fn fvalue(hits: &[(u32, f64)]) -> Value {
        let mut v = Value::new();
        v.set_type(SigType::F64).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_f64(x));
        }
        v
    }

    fn run(l: Option<&Value>, r: Option<&Value>, d: f64, op: MExprOp) -> Value {
        let mut out = Value::new();
        apply(l, r, d, op, &mut out);
        out
    }

    #[test]
    fn constant_on_either_side() {
        let v = value(&[(2, 4), (3, 5)]);
        let out = run(Some(&v), None, 3.0, MExprOp::Add);
        assert_eq!(out.ids(), &[2, 3]);
        assert_eq!(out.hits()[0].f64(), 7.0);
        assert_eq!(out.hits()[1].f64(), 8.0);

        let out = run(None, Some(&v), 3.0, MExprOp::Sub);
        assert_eq!(out.hits()[0].f64(), -1.0);
        assert_eq!(out.hits()[1].f64(), -2.0);
    }

    #[test]
    fn channel_aligned_binary_ops() {
        let l = value(&[(2, 4), (3, 5)]);
        let r = value(&[(2, 6), (2, 7), (3, 8)]);
        let out = run(Some(&l), Some(&r), 0.0, MExprOp::Add);
        // Channel 2 pairs one hit, channel 3 pairs one hit.
        assert_eq!(out.ids(), &[2, 3]);
        assert_eq!(out.hits()[0].f64(), 10.0);
        assert_eq!(out.hits()[1].f64(), 13.0);
    }

    #[test]
    fn unary_ops_apply_pointwise() {
        let v = fvalue(&[(0, 0.25)]);
        assert_eq!(run(Some(&v), None, 0.0, MExprOp::Sqrt).hits()[0].f64(), 0.5);
        assert_eq!(run(Some(&v), None, 0.0, MExprOp::Abs).hits()[0].f64(), 0.25);
        let c = run(Some(&v), None, 0.0, MExprOp::Cos).hits()[0].f64();
        assert!((c - 0.25f64.cos()).abs() < 1e-15);
    }

    #[test]
    fn log_with_right_node_uses_d_as_base() {
        let v = fvalue(&[(0, 8.0)]);
        let out = run(None, Some(&v), 2.0, MExprOp::Log);
        assert!((out.hits()[0].f64() - 3.0).abs() < 1e-12);

        let out = run(Some(&v), None, 0.0, MExprOp::Log);
        assert!((out.hits()[0].f64() - 8.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn non_finite_results_are_dropped() {
        let l = fvalue(&[(0, 1.0), (0, 2.0)]);
        let r = fvalue(&[(0, 0.0), (0, 1.0)]);
        let out = run(Some(&l), Some(&r), 0.0, MExprOp::Div);
        // 1/0 is dropped, 2/1 survives.
        assert_eq!(out.hits().len(), 1);
        assert_eq!(out.hits()[0].f64(), 2.0);

        let v = fvalue(&[(0, -1.0)]);
        let out = run(Some(&v), None, 0.0, MExprOp::Sqrt);
        assert!(out.is_empty());
    }

    #[test]
    fn pow_pairs_hits() {
        let l = value(&[(1, 2)]);
        let r = value(&[(1, 10)]);
        let out = run(Some(&l), Some(&r), 0.0, MExprOp::Pow);
        assert_eq!(out.hits()[0].f64(), 1024.0);
    }
}
