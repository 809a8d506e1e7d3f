//! 2-D histogram sink.
//!
//! Three shapes:
//! - paired: y hits against x hits, index-aligned over the flat hit
//!   vectors, until either side runs out;
//! - all-pairs: every y against every x;
//! - single input: hit value against its channel id.
//!
//! The same two-pass prefill/fit/fill protocol as the 1-D sink, with the
//! polygon tests running on the (x,y) samples. Optionally holds a single
//! event's content for a configured time before accepting the next.

use std::sync::Arc;

use skarn_hist::Hist2;
use skarn_output::Var;
use skarn_value::{Scalar, SigType};

use crate::cut::{CutConsumer, CutProducer};
use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId, SharedOutput};
use crate::EvalError;

pub struct Hist2Node {
    x: NodeId,
    y: Option<NodeId>,
    permutate: bool,
    store: Arc<Hist2>,
    pub(crate) producer: CutProducer,
    pub(crate) consumer: CutConsumer,
    output: Option<(SharedOutput, Var, Var)>,
}

impl Hist2Node {
    pub(crate) fn new(
        x: NodeId,
        y: Option<NodeId>,
        permutate: bool,
        store: Arc<Hist2>,
        output: Option<(SharedOutput, Var, Var)>,
    ) -> Self {
        Hist2Node {
            x,
            y,
            permutate,
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
        if let Some(y) = self.y {
            g.process(y, evid, ctx)?;
        }
        if !self.store.is_writable(ctx.clock.now_ms()) {
            return Ok(());
        }

        let now = ctx.clock.now_ms();
        let val_x = g.value(self.x, 0);
        match self.y {
            None => {
                // Hit value against channel id.
                for (ch, hits) in crate::nodes::groups(&val_x) {
                    let x = Scalar::from_u64(ch as u64);
                    for &y in hits {
                        self.producer
                            .test2(x.as_f64(SigType::U64), y.as_f64(val_x.ty()));
                        self.store
                            .prefill(SigType::U64, x, val_x.ty(), y, now)
                            .map_err(|source| EvalError::Type {
                                loc: node.loc.clone(),
                                source,
                            })?;
                    }
                }
                self.store.fit();
                for (ch, hits) in crate::nodes::groups(&val_x) {
                    let x = Scalar::from_u64(ch as u64);
                    for &y in hits {
                        self.store.fill(SigType::U64, x, val_x.ty(), y);
                    }
                }
            }
            Some(y) => {
                let val_y = g.value(y, 0);
                let xs = val_x.hits();
                let ys = val_y.hits();
                if self.permutate {
                    for &y in ys {
                        for &x in xs {
                            self.producer
                                .test2(x.as_f64(val_x.ty()), y.as_f64(val_y.ty()));
                            self.store
                                .prefill(val_x.ty(), x, val_y.ty(), y, now)
                                .map_err(|source| EvalError::Type {
                                    loc: node.loc.clone(),
                                    source,
                                })?;
                        }
                    }
                    self.store.fit();
                    for (yi, &y) in ys.iter().enumerate() {
                        for (xi, &x) in xs.iter().enumerate() {
                            self.fill_output(
                                val_x.get_f64(xi, true),
                                val_y.get_f64(yi, true),
                            );
                            self.store.fill(val_x.ty(), x, val_y.ty(), y);
                        }
                    }
                } else {
                    let n = xs.len().min(ys.len());
                    for i in 0..n {
                        self.producer
                            .test2(xs[i].as_f64(val_x.ty()), ys[i].as_f64(val_y.ty()));
                        self.store
                            .prefill(val_x.ty(), xs[i], val_y.ty(), ys[i], now)
                            .map_err(|source| EvalError::Type {
                                loc: node.loc.clone(),
                                source,
                            })?;
                    }
                    self.store.fit();
                    for i in 0..n {
                        self.fill_output(val_x.get_f64(i, true), val_y.get_f64(i, true));
                        self.store.fill(val_x.ty(), xs[i], val_y.ty(), ys[i]);
                    }
                }
            }
        }
        Ok(())
    }

    fn fill_output(&self, x: f64, y: f64) {
        if let Some((output, var_x, var_y)) = &self.output {
            let mut out = output.lock().unwrap();
            out.fill(*var_x, x);
            out.fill(*var_y, y);
        }
    }
}
