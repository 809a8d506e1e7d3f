//! Per-event execution: clock-match throttling, cut-state reset, sink
//! evaluation in declaration order.

use std::sync::Arc;

use skarn_input::Input;
use skarn_pipeline::Clock;
use skarn_value::SigType;
use tracing::warn;

use crate::node::{Graph, NodeId, SharedOutput};
use crate::EvalError;

/// Everything a node may reach during one event. Threaded explicitly; there
/// are no process-wide globals.
pub struct EventCtx<'a> {
    pub input: &'a dyn Input,
    pub clock: &'a dyn Clock,
}

/// Clock-matcher bookkeeping across events.
struct ClockMatch {
    node: NodeId,
    s_per_tick: f64,
    ts_prev: Option<u64>,
    ts_prev_f: Option<f64>,
    ts0: f64,
    t0_ms: Option<u64>,
}

/// Owns the graph on the consume thread and advances the event counter.
pub struct EventDriver {
    graph: Graph,
    clock: Arc<dyn Clock>,
    output: Option<SharedOutput>,
    clock_match: Option<ClockMatch>,
    evid: u64,
}

impl EventDriver {
    pub fn new(graph: Graph, clock: Arc<dyn Clock>) -> Self {
        let output = graph.output.clone();
        let clock_match = graph.clock_match_config().map(|(node, s_per_tick)| ClockMatch {
            node,
            s_per_tick,
            ts_prev: None,
            ts_prev_f: None,
            ts0: 0.0,
            t0_ms: None,
        });
        EventDriver {
            graph,
            clock,
            output,
            clock_match,
            evid: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn event_id(&self) -> u64 {
        self.evid
    }

    /// Runs one event against `input`.
    pub fn do_event(&mut self, input: &dyn Input) -> Result<(), EvalError> {
        let ctx = EventCtx {
            input,
            clock: self.clock.as_ref(),
        };

        if let Some(cm) = &mut self.clock_match {
            throttle(&self.graph, cm, self.evid, &ctx)?;
        }

        self.graph.cut_reset();
        for &sink in self.graph.cuttables() {
            self.graph.process(sink, self.evid, &ctx)?;
        }

        if let Some(output) = &self.output {
            output.lock().unwrap().finish_event();
        }
        self.evid += 1;
        Ok(())
    }
}

/// Matches the virtual event rate against the timestamp signal: computes
/// the virtual elapsed time, compares to wall clock, and sleeps off any
/// lead. Timestamps must be strictly monotonic; a regression is fatal.
fn throttle(
    graph: &Graph,
    cm: &mut ClockMatch,
    evid: u64,
    ctx: &EventCtx,
) -> Result<(), EvalError> {
    graph.process(cm.node, evid, ctx)?;

    let dts;
    {
        let val = graph.value(cm.node, 0);
        if val.is_empty() {
            return Ok(());
        }
        let loc = graph.loc_of(cm.node);
        match val.ty() {
            SigType::U64 | SigType::I64 => {
                let ts = val.hits()[0].u64();
                if let Some(prev) = cm.ts_prev {
                    if ts <= prev {
                        return Err(EvalError::NonMonotonicClock {
                            loc: loc.to_string(),
                            prev: prev as f64,
                            curr: ts as f64,
                        });
                    }
                }
                cm.ts_prev = Some(ts);
                if cm.ts0 == 0.0 {
                    cm.ts0 = ts as f64;
                }
                dts = cm.s_per_tick * (ts as f64 - cm.ts0);
            }
            SigType::F64 => {
                let ts = val.hits()[0].f64();
                if let Some(prev) = cm.ts_prev_f {
                    if ts <= prev {
                        return Err(EvalError::NonMonotonicClock {
                            loc: loc.to_string(),
                            prev,
                            curr: ts,
                        });
                    }
                }
                cm.ts_prev_f = Some(ts);
                if cm.ts0 == 0.0 {
                    cm.ts0 = ts;
                }
                dts = cm.s_per_tick * (ts - cm.ts0);
            }
            SigType::None => {
                warn!(loc, "clock-match signal has no type, skipping throttle");
                return Ok(());
            }
        }
    }

    let t0 = *cm.t0_ms.get_or_insert_with(|| ctx.clock.now_ms());
    let dt = (ctx.clock.now_ms() - t0) as f64 * 1e-3;
    if dts > dt {
        ctx.clock.sleep_ms((1e3 * (dts - dt)) as u64);
    }
    Ok(())
}
