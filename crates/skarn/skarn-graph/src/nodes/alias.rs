//! Identity node for late binding of parser identifiers.
//!
//! An identifier can be used before it is assigned; the alias stands in and
//! its source is patched once the assignment (or the implicit-signal pass)
//! resolves it. `Graph::value` looks straight through alias chains, so an
//! alias never copies.

use std::cell::Cell;

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct AliasNode {
    source: Cell<Option<NodeId>>,
    ret_i: Cell<usize>,
}

impl AliasNode {
    pub(crate) fn new() -> Self {
        AliasNode {
            source: Cell::new(None),
            ret_i: Cell::new(0),
        }
    }

    pub(crate) fn source(&self) -> Option<NodeId> {
        self.source.get()
    }

    pub(crate) fn ret_i(&self) -> usize {
        self.ret_i.get()
    }

    pub(crate) fn bind(&self, source: NodeId, ret_i: usize) {
        self.source.set(Some(source));
        self.ret_i.set(ret_i);
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        _node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        match self.source.get() {
            Some(src) => g.process(src, evid, ctx),
            None => Ok(()),
        }
    }
}
