//! Shared fixtures for the skarn benches: a synthetic multi-hit event
//! stream and a representative analysis graph over it.

use skarn_graph::{Graph, Hist1Opts, Hist2Opts, MExprOp};
use skarn_input::{MemberKind, MemoryInput, SignalBinder};
use skarn_value::SigType;

/// Channels per synthetic event.
pub const CHANNELS: u64 = 64;

/// Builds a looped input with `n_events` distinct multi-hit events on the
/// buffers `(id, end, v)`.
pub fn synthetic_input(n_events: u64) -> MemoryInput {
    let events = (0..n_events)
        .map(|ev| {
            let mut ids = Vec::new();
            let mut ends = Vec::new();
            let mut vs = Vec::new();
            // A cheap deterministic spread: every third channel fires, hit
            // count and amplitude vary with the event number.
            for ch in (0..CHANNELS).step_by(3) {
                let hits = 1 + (ev + ch) % 3;
                ids.push(ch);
                ends.push(vs.len() as u64 + hits);
                for h in 0..hits {
                    vs.push(100 + (ev * 37 + ch * 13 + h * 7) % 4000);
                }
            }
            vec![ids, ends, vs]
        })
        .collect();
    MemoryInput::from_u64(3, events).looped()
}

/// A graph exercising the common node mix: zero suppression, clustering,
/// arithmetic, and both histogram shapes.
pub fn analysis_graph() -> Graph {
    let mut graph = Graph::new("bench");
    graph.add_signal("det", "det_id", "det_end", "det_v");
    let det = graph.alias_ref("det");
    let zs = graph.add_zero_suppress(det, 150.0);
    let clu = graph.add_cluster(zs);
    let clu_e = graph.add_alias("clu_e", clu, 0);
    let scaled = graph.add_mexpr(Some(clu_e), None, 0.25, MExprOp::Mul);
    graph
        .add_hist1("cluster energy", scaled, Hist1Opts::default())
        .unwrap();
    graph
        .add_hist2("det map", det, None, Hist2Opts::default())
        .unwrap();
    graph.finish().unwrap();

    graph.bind("det", MemberKind::Id, 0, SigType::U64).unwrap();
    graph.bind("det", MemberKind::End, 1, SigType::U64).unwrap();
    graph.bind("det", MemberKind::V, 2, SigType::U64).unwrap();
    graph
}
