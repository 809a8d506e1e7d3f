//! Cut node: exposes a histogram's polygon-cut flag as a 0/1 value.
//!
//! The polygon's source histogram is resolved by title after parsing; until
//! then the node sits unbound. Processing the node processes the source
//! sink first, so the flag is up to date within the event.

use std::cell::Cell;
use std::sync::Arc;

use skarn_value::{Scalar, SigType};

use crate::cut::{CutPolygon, CutState};
use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct CutNode {
    poly: Arc<CutPolygon>,
    state: Arc<CutState>,
    source: Cell<Option<NodeId>>,
}

impl CutNode {
    pub(crate) fn new(poly: Arc<CutPolygon>) -> Self {
        CutNode {
            poly,
            state: Arc::new(CutState::default()),
            source: Cell::new(None),
        }
    }

    pub(crate) fn poly(&self) -> &Arc<CutPolygon> {
        &self.poly
    }

    pub(crate) fn state(&self) -> &Arc<CutState> {
        &self.state
    }

    pub(crate) fn bind_source(&self, source: NodeId) {
        self.source.set(Some(source));
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        // Run the source sink before touching our own output: its prefill
        // writes the flag this node reports.
        if let Some(source) = self.source.get() {
            g.process(source, evid, ctx)?;
        }

        let mut out = node.out.borrow_mut();
        let out = &mut out[0];
        out.clear();
        let _ = out.set_type(SigType::U64);
        if self.source.get().is_some() {
            out.push(0, Scalar::from_u64(self.state.passed() as u64));
        }
        Ok(())
    }
}
