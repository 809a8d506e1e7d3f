//! Annular histogram sink: radius against azimuth, index-aligned pairs.

use std::sync::Arc;

use skarn_hist::Annular;
use skarn_output::Var;

use crate::cut::{CutConsumer, CutProducer};
use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId, SharedOutput};
use crate::EvalError;

pub struct AnnularNode {
    r: NodeId,
    phi: NodeId,
    store: Arc<Annular>,
    pub(crate) producer: CutProducer,
    pub(crate) consumer: CutConsumer,
    output: Option<(SharedOutput, Var, Var)>,
}

impl AnnularNode {
    pub(crate) fn new(
        r: NodeId,
        phi: NodeId,
        store: Arc<Annular>,
        output: Option<(SharedOutput, Var, Var)>,
    ) -> Self {
        AnnularNode {
            r,
            phi,
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
        g.process(self.r, evid, ctx)?;
        g.process(self.phi, evid, ctx)?;

        let val_r = g.value(self.r, 0);
        let val_phi = g.value(self.phi, 0);
        let rs = val_r.hits();
        let ps = val_phi.hits();
        let n = rs.len().min(ps.len());
        let now = ctx.clock.now_ms();

        for i in 0..n {
            self.producer
                .test2(rs[i].as_f64(val_r.ty()), ps[i].as_f64(val_phi.ty()));
            self.store
                .prefill(val_r.ty(), rs[i], val_phi.ty(), ps[i], now)
                .map_err(|source| EvalError::Type {
                    loc: node.loc.clone(),
                    source,
                })?;
        }
        self.store.fit();
        for i in 0..n {
            if let Some((output, var_r, var_p)) = &self.output {
                let mut out = output.lock().unwrap();
                out.fill(*var_r, val_r.get_f64(i, true));
                out.fill(*var_p, val_phi.get_f64(i, true));
            }
            self.store.fill(val_r.ty(), rs[i], val_phi.ty(), ps[i]);
        }
        Ok(())
    }
}
