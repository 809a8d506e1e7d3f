//! Projects one member stream of a compound value.
//!
//! `id` yields the channel identifiers, `end` the group end offsets, `v`
//! the flat hits; all emitted as a simple array under channel 0.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberSel {
    Id,
    End,
    V,
}

impl MemberSel {
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "id" => Some(MemberSel::Id),
            "end" => Some(MemberSel::End),
            "v" => Some(MemberSel::V),
            _ => None,
        }
    }
}

pub struct MemberNode {
    child: NodeId,
    sel: MemberSel,
}

impl MemberNode {
    pub(crate) fn new(child: NodeId, sel: MemberSel) -> Self {
        MemberNode { child, sel }
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
        apply(&val, self.sel, &mut out[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, sel: MemberSel, out: &mut Value) {
    out.clear();
    match sel {
        MemberSel::Id => {
            let _ = out.set_type(SigType::U64);
            for &ch in val.ids() {
                out.push(0, Scalar::from_u64(ch as u64));
            }
        }
        MemberSel::End => {
            let _ = out.set_type(SigType::U64);
            for &e in val.ends() {
                out.push(0, Scalar::from_u64(e as u64));
            }
        }
        MemberSel::V => {
            let _ = out.set_type(val.ty());
            for &s in val.hits() {
                out.push(0, s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Value {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        v.push(1, Scalar::from_u64(2));
        v.push(2, Scalar::from_u64(3));
        v.push(3, Scalar::from_u64(4));
        v
    }

    #[test]
    fn id_projection_lists_channels() {
        let mut out = Value::new();
        apply(&input(), MemberSel::Id, &mut out);
        assert_eq!(out.ids(), &[0]);
        assert_eq!(out.ends(), &[3]);
        let ids: Vec<u64> = out.hits().iter().map(|s| s.u64()).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn v_projection_lists_hits() {
        let mut out = Value::new();
        apply(&input(), MemberSel::V, &mut out);
        assert_eq!(out.ids(), &[0]);
        let vs: Vec<u64> = out.hits().iter().map(|s| s.u64()).collect();
        assert_eq!(vs, [2, 3, 4]);
    }
}
