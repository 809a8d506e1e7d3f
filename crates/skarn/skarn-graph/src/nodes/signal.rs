//! Signal leaf: copies input buffers into a value of the right arity.
//!
//! Three shapes, decided by which members the input bound:
//! - `id` + `end` + `v`: multi-hit array, groups spanned by the end offsets;
//! - `id` + `v`: single-hit array, one hit per listed channel;
//! - `v` only: scalar or simple array, everything under channel 0.
//!
//! NaN/Inf hits are dropped on float buffers. Buffers whose lengths
//! disagree are a data error: the signal reads empty for that event and a
//! warning names the offending lengths.

use std::cell::RefCell;

use skarn_value::SigType;
use tracing::warn;

use crate::driver::EventCtx;
use crate::node::{Graph, Node};
use crate::EvalError;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Member {
    pub buffer_id: usize,
    pub ty: SigType,
}

#[derive(Default)]
struct Members {
    id: Option<Member>,
    end: Option<Member>,
    v: Option<Member>,
}

pub struct SignalNode {
    name: String,
    members: RefCell<Members>,
}

impl SignalNode {
    pub(crate) fn new(name: &str) -> Self {
        SignalNode {
            name: name.to_string(),
            members: RefCell::new(Members::default()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Binds one member buffer. Returns false when it was already bound.
    pub(crate) fn bind(&self, member: MemberSlot, m: Member) -> bool {
        let mut members = self.members.borrow_mut();
        let slot = match member {
            MemberSlot::Id => &mut members.id,
            MemberSlot::End => &mut members.end,
            MemberSlot::V => &mut members.v,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(m);
        true
    }

    pub(crate) fn unbind(&self) {
        *self.members.borrow_mut() = Members::default();
    }

    pub(crate) fn process(
        &self,
        _g: &Graph,
        node: &Node,
        _evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        let mut out = node.out.borrow_mut();
        let out = &mut out[0];
        out.clear();

        let members = self.members.borrow();

        macro_rules! length_check {
            ($l:expr, $op:tt, $r:expr) => {
                if !($l $op $r) {
                    warn!(
                        loc = %node.loc,
                        signal = %self.name,
                        concat!("signal check failed: ", stringify!($l), " ",
                            stringify!($op), " ", stringify!($r), " ({} vs {})"),
                        $l, $r
                    );
                    return Ok(());
                }
            };
        }

        if let Some(end) = members.end {
            // Multi-hit array.
            let (Some(id), Some(v)) = (members.id, members.v) else {
                return Ok(());
            };
            let (p_id, _) = ctx.input.data(id.buffer_id);
            let (p_end, _) = ctx.input.data(end.buffer_id);
            let (p_v, _) = ctx.input.data(v.buffer_id);
            if p_id.is_empty() {
                return Ok(());
            }
            length_check!(p_id.len(), ==, p_end.len());
            length_check!(p_id.len(), <=, p_v.len());
            out.set_type(v.ty).map_err(|source| EvalError::Type {
                loc: node.loc.clone(),
                source,
            })?;
            let mut v_i = 0usize;
            for i in 0..p_id.len() {
                let ch = p_id[i].u64() as u32;
                let end_i = (p_end[i].u64() as usize).min(p_v.len());
                while v_i < end_i {
                    let s = p_v[v_i];
                    if s.is_finite(v.ty) {
                        out.push(ch, s);
                    }
                    v_i += 1;
                }
            }
        } else if let Some(id) = members.id {
            // Single-hit array.
            let Some(v) = members.v else {
                return Ok(());
            };
            let (p_id, _) = ctx.input.data(id.buffer_id);
            let (p_v, _) = ctx.input.data(v.buffer_id);
            if p_id.is_empty() {
                return Ok(());
            }
            length_check!(p_id.len(), ==, p_v.len());
            out.set_type(v.ty).map_err(|source| EvalError::Type {
                loc: node.loc.clone(),
                source,
            })?;
            for i in 0..p_id.len() {
                let s = p_v[i];
                if s.is_finite(v.ty) {
                    out.push(p_id[i].u64() as u32, s);
                }
            }
        } else if let Some(v) = members.v {
            // Scalar or simple array.
            let (p_v, _) = ctx.input.data(v.buffer_id);
            if p_v.is_empty() {
                return Ok(());
            }
            out.set_type(v.ty).map_err(|source| EvalError::Type {
                loc: node.loc.clone(),
                source,
            })?;
            for &s in p_v {
                if s.is_finite(v.ty) {
                    out.push(0, s);
                }
            }
        }
        // No member bound: the input never served this signal, it reads
        // empty every event.
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MemberSlot {
    Id,
    End,
    V,
}
