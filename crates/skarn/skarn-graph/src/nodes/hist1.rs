//! 1-D histogram sink.
//!
//! Two-pass fill protocol per event: *prefill* feeds the axis fitter and
//! tests every sample against the polygons drawn on this histogram, *fit*
//! re-bins if the axis moved, *fill* increments the active slice. A gated
//! histogram short-circuits the whole event when any of its cuts failed.

use std::sync::Arc;

use skarn_hist::Hist1;
use skarn_output::Var;

use crate::cut::{CutConsumer, CutProducer};
use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId, SharedOutput};
use crate::EvalError;

pub struct Hist1Node {
    x: NodeId,
    store: Arc<Hist1>,
    pub(crate) producer: CutProducer,
    pub(crate) consumer: CutConsumer,
    output: Option<(SharedOutput, Var)>,
}

impl Hist1Node {
    pub(crate) fn new(
        x: NodeId,
        store: Arc<Hist1>,
        output: Option<(SharedOutput, Var)>,
    ) -> Self {
        Hist1Node {
            x,
            store,
            producer: CutProducer::default(),
            consumer: CutConsumer::default(),
            output,
        }
    }

    pub(crate) fn cut_reset(&self) {
        self.producer.reset();
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        self.consumer.process(g, evid, ctx)?;
        if !self.consumer.is_ok() {
            return Ok(());
        }
        g.process(self.x, evid, ctx)?;
        let val = g.value(self.x, 0);
        let now = ctx.clock.now_ms();

        for &s in val.hits() {
            self.producer.test1(s.as_f64(val.ty()));
            self.store
                .prefill(val.ty(), s, now)
                .map_err(|source| EvalError::Type {
                    loc: node.loc.clone(),
                    source,
                })?;
        }
        self.store.fit();
        for (i, &s) in val.hits().iter().enumerate() {
            if let Some((output, var)) = &self.output {
                output.lock().unwrap().fill(*var, val.get_f64(i, true));
            }
            self.store.fill(val.ty(), s);
        }
        Ok(())
    }
}
