//! The typed node arena and per-event evaluation machinery.
//!
//! All nodes live in one owning vector; inter-node references are opaque
//! indices. Evaluation runs on the consume thread only, so per-node mutable
//! state (outputs, epochs, running calibrations) sits behind `Cell`s and
//! `RefCell`s rather than locks; the histogram stores, which the render
//! thread also touches, carry their own mutexes.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use skarn_hist::PlotSet;
use skarn_input::SignalRequest;
use skarn_output::Output;
use skarn_value::Value;

use crate::cut::CutPolygon;
use crate::driver::EventCtx;
use crate::nodes::alias::AliasNode;
use crate::nodes::annular::AnnularNode;
use crate::nodes::array::ArrayNode;
use crate::nodes::bitfield::BitfieldNode;
use crate::nodes::cluster::ClusterNode;
use crate::nodes::coarse_fine::CoarseFineNode;
use crate::nodes::cut::CutNode;
use crate::nodes::filter_range::FilterRangeNode;
use crate::nodes::floor::FloorNode;
use crate::nodes::hist1::Hist1Node;
use crate::nodes::hist2::Hist2Node;
use crate::nodes::length::LengthNode;
use crate::nodes::match_id::MatchIdNode;
use crate::nodes::match_value::MatchValueNode;
use crate::nodes::max::MaxNode;
use crate::nodes::mean_arith::MeanArithNode;
use crate::nodes::mean_geom::MeanGeomNode;
use crate::nodes::member::MemberNode;
use crate::nodes::merge::MergeNode;
use crate::nodes::mexpr::MExprNode;
use crate::nodes::pedestal::PedestalNode;
use crate::nodes::select_id::SelectIdNode;
use crate::nodes::signal::SignalNode;
use crate::nodes::signal_user::SignalUserNode;
use crate::nodes::sub_mod::SubModNode;
use crate::nodes::tot::TotNode;
use crate::nodes::tpat::TpatNode;
use crate::nodes::trig_map::TrigMapNode;
use crate::nodes::zero_suppress::ZeroSuppressNode;
use crate::trig_map::TrigMapCache;
use crate::EvalError;

/// Stable handle to a node for the lifetime of its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output sink shared between the driver and the histogram nodes.
pub type SharedOutput = Arc<Mutex<Box<dyn Output>>>;

/// The node catalogue as a tagged variant.
pub enum NodeKind {
    Signal(SignalNode),
    Alias(AliasNode),
    Array(ArrayNode),
    Bitfield(BitfieldNode),
    Cluster(ClusterNode),
    CoarseFine(CoarseFineNode),
    Cut(CutNode),
    FilterRange(FilterRangeNode),
    Floor(FloorNode),
    Hist1(Hist1Node),
    Hist2(Hist2Node),
    Annular(AnnularNode),
    Length(LengthNode),
    MatchId(MatchIdNode),
    MatchValue(MatchValueNode),
    Max(MaxNode),
    MeanArith(MeanArithNode),
    MeanGeom(MeanGeomNode),
    Member(MemberNode),
    MExpr(MExprNode),
    Merge(MergeNode),
    Pedestal(PedestalNode),
    SelectId(SelectIdNode),
    SignalUser(SignalUserNode),
    SubMod(SubModNode),
    Tot(TotNode),
    Tpat(TpatNode),
    TrigMap(TrigMapNode),
    ZeroSuppress(ZeroSuppressNode),
}

impl NodeKind {
    fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        match self {
            NodeKind::Signal(n) => n.process(g, node, evid, ctx),
            NodeKind::Alias(n) => n.process(g, node, evid, ctx),
            NodeKind::Array(n) => n.process(g, node, evid, ctx),
            NodeKind::Bitfield(n) => n.process(g, node, evid, ctx),
            NodeKind::Cluster(n) => n.process(g, node, evid, ctx),
            NodeKind::CoarseFine(n) => n.process(g, node, evid, ctx),
            NodeKind::Cut(n) => n.process(g, node, evid, ctx),
            NodeKind::FilterRange(n) => n.process(g, node, evid, ctx),
            NodeKind::Floor(n) => n.process(g, node, evid, ctx),
            NodeKind::Hist1(n) => n.process(g, node, evid, ctx),
            NodeKind::Hist2(n) => n.process(g, node, evid, ctx),
            NodeKind::Annular(n) => n.process(g, node, evid, ctx),
            NodeKind::Length(n) => n.process(g, node, evid, ctx),
            NodeKind::MatchId(n) => n.process(g, node, evid, ctx),
            NodeKind::MatchValue(n) => n.process(g, node, evid, ctx),
            NodeKind::Max(n) => n.process(g, node, evid, ctx),
            NodeKind::MeanArith(n) => n.process(g, node, evid, ctx),
            NodeKind::MeanGeom(n) => n.process(g, node, evid, ctx),
            NodeKind::Member(n) => n.process(g, node, evid, ctx),
            NodeKind::MExpr(n) => n.process(g, node, evid, ctx),
            NodeKind::Merge(n) => n.process(g, node, evid, ctx),
            NodeKind::Pedestal(n) => n.process(g, node, evid, ctx),
            NodeKind::SelectId(n) => n.process(g, node, evid, ctx),
            NodeKind::SignalUser(n) => n.process(g, node, evid, ctx),
            NodeKind::SubMod(n) => n.process(g, node, evid, ctx),
            NodeKind::Tot(n) => n.process(g, node, evid, ctx),
            NodeKind::Tpat(n) => n.process(g, node, evid, ctx),
            NodeKind::TrigMap(n) => n.process(g, node, evid, ctx),
            NodeKind::ZeroSuppress(n) => n.process(g, node, evid, ctx),
        }
    }
}

/// One graph vertex: source location for diagnostics, the evaluation epoch
/// (last event id this node ran at), its output values, and the kind.
pub struct Node {
    pub(crate) loc: String,
    pub(crate) epoch: Cell<u64>,
    pub(crate) out: RefCell<Vec<Value>>,
    pub(crate) kind: NodeKind,
}

/// Epoch sentinel: never processed.
const EPOCH_NEVER: u64 = u64::MAX;

impl Node {
    pub(crate) fn new(loc: String, kind: NodeKind, outputs: Vec<Value>) -> Self {
        Node {
            loc,
            epoch: Cell::new(EPOCH_NEVER),
            out: RefCell::new(outputs),
            kind,
        }
    }
}

/// The graph: the arena plus everything construction accumulates.
pub struct Graph {
    pub(crate) path: String,
    pub(crate) line: u32,
    pub(crate) col: u32,
    pub(crate) nodes: Vec<Node>,
    /// Structural deduplication of `add_*` calls.
    pub(crate) dedup: HashMap<String, NodeId>,
    /// Parser identifiers; unbound ones become implicit signals.
    pub(crate) alias_map: HashMap<String, NodeId>,
    pub(crate) signal_descs: Vec<SignalRequest>,
    pub(crate) signal_desc_names: HashMap<String, usize>,
    pub(crate) signal_map: HashMap<String, NodeId>,
    /// Cut nodes pending source resolution.
    pub(crate) cut_nodes: Vec<NodeId>,
    /// Cuttable sinks in declaration order; the event evaluation order.
    pub(crate) cuttables: Vec<NodeId>,
    pub(crate) cuttable_map: HashMap<String, NodeId>,
    /// Polygons declared since the last histogram, bound to the next one.
    pub(crate) pending_polys: Vec<CutPolygon>,
    /// Gated-by links, resolved by title after parsing.
    pub(crate) cut_refs: Vec<(String, Vec<CutPolygon>)>,
    /// Linear display calibrations by name.
    pub(crate) calibs: HashMap<String, (f64, f64)>,
    pub(crate) trig_maps: TrigMapCache,
    pub(crate) clock_match: Option<(NodeId, f64)>,
    pub(crate) ui_rate: u32,
    pub(crate) pedestal_events: u64,
    pub(crate) plots: Arc<PlotSet>,
    pub(crate) output: Option<SharedOutput>,
}

impl Graph {
    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.idx()]
    }

    pub fn loc_of(&self, id: NodeId) -> &str {
        &self.node(id).loc
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cuttable sinks in declaration order.
    pub fn cuttables(&self) -> &[NodeId] {
        &self.cuttables
    }

    pub fn plots(&self) -> Arc<PlotSet> {
        Arc::clone(&self.plots)
    }

    pub fn ui_rate(&self) -> u32 {
        self.ui_rate
    }

    pub fn clock_match_config(&self) -> Option<(NodeId, f64)> {
        self.clock_match
    }

    /// Runs a node for `evid`, at most once per event: a second call in the
    /// same event returns immediately.
    pub fn process(&self, id: NodeId, evid: u64, ctx: &EventCtx) -> Result<(), EvalError> {
        let node = self.node(id);
        if node.epoch.replace(evid) == evid {
            return Ok(());
        }
        node.kind.process(self, node, evid, ctx)
    }

    /// Shared borrow of a node's output value, resolving alias chains.
    ///
    /// Consumers use it inside their own `process` and must not hold the
    /// borrow across calls back into the graph for the same node.
    pub fn value(&self, id: NodeId, out_i: usize) -> Ref<'_, Value> {
        let mut id = id;
        let mut out_i = out_i;
        loop {
            let node = self.node(id);
            if let NodeKind::Alias(a) = &node.kind {
                if let Some(src) = a.source() {
                    debug_assert_eq!(out_i, 0, "aliases have a single output");
                    out_i = a.ret_i();
                    id = src;
                    continue;
                }
            }
            return Ref::map(node.out.borrow(), |v| &v[out_i]);
        }
    }

    /// Clears per-event cut state on every cuttable sink.
    pub fn cut_reset(&self) {
        for &id in &self.cuttables {
            match &self.node(id).kind {
                NodeKind::Hist1(n) => n.cut_reset(),
                NodeKind::Hist2(n) => n.cut_reset(),
                NodeKind::Annular(n) => n.cut_reset(),
                _ => {}
            }
        }
    }

    /// Drops input bindings from every signal leaf.
    pub fn unbind_signals(&self) {
        for &id in self.signal_map.values() {
            if let NodeKind::Signal(n) = &self.node(id).kind {
                n.unbind();
            }
        }
    }
}
