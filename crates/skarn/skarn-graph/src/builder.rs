//! Graph construction: append-only `add_*` calls with structural
//! deduplication, alias late binding, and the post-parse cut resolution.
//!
//! Every constructor computes a canonical key from its kind tag, child
//! indices and scalar parameters; an identical call returns the existing
//! node. Identifiers live in a name table as alias nodes; any alias still
//! unbound when construction finishes becomes an implicit signal the input
//! must deliver. Cuts reference histograms by title and resolve in a single
//! pass at the end.

use std::sync::Arc;

use skarn_hist::{Annular, GaussFitter, Hist1, Hist2, LinearTransform, MomentsFitter, PlotSet};
use skarn_input::{InputError, MemberKind, SignalBinder, SignalRequest};
use skarn_value::{SigType, Value};
use tracing::info;

use crate::cut::{CutConsumer, CutPolygon, CutProducer, CutState};
use crate::node::{Graph, Node, NodeId, NodeKind, SharedOutput};
use crate::nodes::alias::AliasNode;
use crate::nodes::annular::AnnularNode;
use crate::nodes::array::ArrayNode;
use crate::nodes::bitfield::BitfieldNode;
use crate::nodes::cluster::ClusterNode;
use crate::nodes::coarse_fine::CoarseFineNode;
use crate::nodes::cut::CutNode;
use crate::nodes::filter_range::{FilterCond, FilterRangeNode};
use crate::nodes::floor::FloorNode;
use crate::nodes::hist1::Hist1Node;
use crate::nodes::hist2::Hist2Node;
use crate::nodes::length::LengthNode;
use crate::nodes::match_id::MatchIdNode;
use crate::nodes::match_value::MatchValueNode;
use crate::nodes::max::MaxNode;
use crate::nodes::mean_arith::MeanArithNode;
use crate::nodes::mean_geom::MeanGeomNode;
use crate::nodes::member::{MemberNode, MemberSel};
use crate::nodes::merge::MergeNode;
use crate::nodes::mexpr::{MExprNode, MExprOp};
use crate::nodes::pedestal::PedestalNode;
use crate::nodes::select_id::SelectIdNode;
use crate::nodes::signal::SignalNode;
use crate::nodes::signal_user::SignalUserNode;
use crate::nodes::sub_mod::SubModNode;
use crate::nodes::tot::TotNode;
use crate::nodes::tpat::TpatNode;
use crate::nodes::trig_map::TrigMapNode;
use crate::nodes::zero_suppress::ZeroSuppressNode;
use crate::GraphError;

const DEFAULT_UI_RATE: u32 = 20;
const DEFAULT_PEDESTAL_EVENTS: u64 = 10_000;

/// Options for a 1-D histogram declaration.
pub struct Hist1Opts {
    pub bins: u32,
    pub calib: Option<String>,
    pub fit_peaks: bool,
    pub log_y: bool,
    pub contour: bool,
    pub drop_counts_s: f64,
    pub drop_counts_num: u32,
    pub drop_stats_s: f64,
}

impl Default for Hist1Opts {
    fn default() -> Self {
        Hist1Opts {
            bins: 0,
            calib: None,
            fit_peaks: false,
            log_y: false,
            contour: false,
            drop_counts_s: 0.0,
            drop_counts_num: 1,
            drop_stats_s: 0.0,
        }
    }
}

/// Options for a 2-D histogram declaration.
pub struct Hist2Opts {
    pub bins_x: u32,
    pub bins_y: u32,
    pub calib_x: Option<String>,
    pub calib_y: Option<String>,
    pub log_z: bool,
    pub drop_counts_s: f64,
    pub drop_counts_num: u32,
    pub drop_stats_s: f64,
    /// Hold one event's content this many seconds, then overwrite.
    pub single_s: Option<f64>,
    /// Plot all x/y combinations instead of index-aligned pairs.
    pub permutate: bool,
}

impl Default for Hist2Opts {
    fn default() -> Self {
        Hist2Opts {
            bins_x: 0,
            bins_y: 0,
            calib_x: None,
            calib_y: None,
            log_z: false,
            drop_counts_s: 0.0,
            drop_counts_num: 1,
            drop_stats_s: 0.0,
            single_s: None,
            permutate: false,
        }
    }
}

/// Options for an annular histogram declaration.
pub struct AnnularOpts {
    pub r_min: f64,
    pub r_max: f64,
    pub phi0: f64,
    pub log_z: bool,
    pub drop_counts_s: f64,
    pub drop_counts_num: u32,
    pub drop_stats_s: f64,
}

impl Default for AnnularOpts {
    fn default() -> Self {
        AnnularOpts {
            r_min: 0.0,
            r_max: 1.0,
            phi0: 0.0,
            log_z: false,
            drop_counts_s: 0.0,
            drop_counts_num: 1,
            drop_stats_s: 0.0,
        }
    }
}

impl Graph {
    pub fn new(path: &str) -> Self {
        Graph {
            path: path.to_string(),
            line: 0,
            col: 0,
            nodes: Vec::new(),
            dedup: Default::default(),
            alias_map: Default::default(),
            signal_descs: Vec::new(),
            signal_desc_names: Default::default(),
            signal_map: Default::default(),
            cut_nodes: Vec::new(),
            cuttables: Vec::new(),
            cuttable_map: Default::default(),
            pending_polys: Vec::new(),
            cut_refs: Vec::new(),
            calibs: Default::default(),
            trig_maps: Default::default(),
            clock_match: None,
            ui_rate: DEFAULT_UI_RATE,
            pedestal_events: DEFAULT_PEDESTAL_EVENTS,
            plots: Arc::new(PlotSet::new()),
            output: None,
        }
    }

    /// Updates the source location attached to subsequently created nodes.
    pub fn set_loc(&mut self, line: u32, col: u32) {
        self.line = line;
        self.col = col;
    }

    pub fn loc(&self) -> String {
        format!("{}:{}:{}", self.path, self.line, self.col)
    }

    /// Attaches the per-event scalar output; histograms declared afterwards
    /// register their axis variables on it.
    pub fn set_output(&mut self, output: SharedOutput) {
        self.output = Some(output);
    }

    pub fn set_ui_rate(&mut self, rate: u32) {
        self.ui_rate = rate.min(DEFAULT_UI_RATE);
    }

    /// Calibration window for pedestal nodes declared afterwards.
    pub fn set_pedestal_events(&mut self, events: u64) {
        self.pedestal_events = events;
    }

    /// Paces event processing so `signal * s_per_tick` tracks wall time.
    pub fn set_clock_match(&mut self, node: NodeId, s_per_tick: f64) {
        self.clock_match = Some((node, s_per_tick));
    }

    fn insert(&mut self, kind: NodeKind, n_out: usize) -> NodeId {
        self.insert_at(self.loc(), kind, n_out)
    }

    fn insert_at(&mut self, loc: String, kind: NodeKind, n_out: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let outputs = (0..n_out).map(|_| Value::new()).collect();
        self.nodes.push(Node::new(loc, kind, outputs));
        id
    }

    fn deduped(&mut self, key: String, make: impl FnOnce(&mut Self) -> NodeId) -> NodeId {
        if let Some(&id) = self.dedup.get(&key) {
            return id;
        }
        let id = make(self);
        self.dedup.insert(key, id);
        id
    }

    // ─── Signals and aliases ────────────────────────────────────────────

    /// Declares a compound signal by its member names; the input resolves
    /// them to buffers at construction.
    pub fn add_signal(&mut self, name: &str, id: &str, end: &str, v: &str) {
        if self.signal_desc_names.contains_key(name) {
            return;
        }
        self.signal_desc_names
            .insert(name.to_string(), self.signal_descs.len());
        self.signal_descs.push(SignalRequest {
            loc: self.loc(),
            name: name.to_string(),
            id: id.to_string(),
            end: end.to_string(),
            v: v.to_string(),
        });
    }

    /// Returns the alias node for an identifier, creating an unbound one on
    /// first use.
    pub fn alias_ref(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.alias_map.get(name) {
            return id;
        }
        let id = self.insert(NodeKind::Alias(AliasNode::new()), 1);
        self.alias_map.insert(name.to_string(), id);
        id
    }

    /// Assigns an identifier to output `ret_i` of `value`.
    pub fn add_alias(&mut self, name: &str, value: NodeId, ret_i: usize) -> NodeId {
        let key = format!("alias,{name},{value},{ret_i}");
        self.deduped(key, |g| {
            let alias = g.alias_ref(name);
            if let NodeKind::Alias(a) = &g.node(alias).kind {
                a.bind(value, ret_i);
            }
            alias
        })
    }

    // ─── Transforms ─────────────────────────────────────────────────────

    pub fn add_array(&mut self, child: NodeId, i: u64, mhit_i: u64) -> NodeId {
        let key = format!("array,{child},{i},{mhit_i}");
        self.deduped(key, |g| {
            g.insert(NodeKind::Array(ArrayNode::new(child, i, mhit_i)), 1)
        })
    }

    pub fn add_bitfield(&mut self, fields: Vec<(NodeId, u32)>) -> NodeId {
        let mut key = String::from("bitfield");
        for (node, bits) in &fields {
            key.push_str(&format!(",{node},{bits}"));
        }
        self.deduped(key, |g| {
            g.insert(NodeKind::Bitfield(BitfieldNode::new(fields)), 1)
        })
    }

    pub fn add_cluster(&mut self, child: NodeId) -> NodeId {
        let key = format!("cluster,{child}");
        self.deduped(key, |g| {
            g.insert(NodeKind::Cluster(ClusterNode::new(child)), 2)
        })
    }

    pub fn add_coarse_fine(&mut self, coarse: NodeId, fine: NodeId, range: f64) -> NodeId {
        let key = format!("coarse_fine,{coarse},{fine},{range}");
        self.deduped(key, |g| {
            g.insert(
                NodeKind::CoarseFine(CoarseFineNode::new(coarse, fine, range)),
                1,
            )
        })
    }

    pub fn add_cut(&mut self, poly: CutPolygon) -> NodeId {
        // Not deduplicated: each cut reference owns its flag.
        let id = self.insert(NodeKind::Cut(CutNode::new(Arc::new(poly))), 1);
        self.cut_nodes.push(id);
        id
    }

    pub fn add_filter_range(&mut self, conds: Vec<FilterCond>, args: Vec<NodeId>) -> NodeId {
        let mut key = String::from("filter_range");
        for c in &conds {
            key.push_str(&format!(
                ",{},{},{},{},{}",
                c.node, c.lower, c.lower_le, c.upper, c.upper_le
            ));
        }
        for a in &args {
            key.push_str(&format!(",{a}"));
        }
        let n_out = args.len();
        self.deduped(key, |g| {
            g.insert(
                NodeKind::FilterRange(FilterRangeNode::new(conds, args)),
                n_out,
            )
        })
    }

    pub fn add_floor(&mut self, child: NodeId) -> NodeId {
        let key = format!("floor,{child}");
        self.deduped(key, |g| g.insert(NodeKind::Floor(FloorNode::new(child)), 1))
    }

    pub fn add_length(&mut self, child: NodeId) -> NodeId {
        let key = format!("length,{child}");
        self.deduped(key, |g| {
            g.insert(NodeKind::Length(LengthNode::new(child)), 1)
        })
    }

    pub fn add_match_id(&mut self, l: NodeId, r: NodeId) -> NodeId {
        let key = format!("match_id,{l},{r}");
        self.deduped(key, |g| {
            g.insert(NodeKind::MatchId(MatchIdNode::new(l, r)), 2)
        })
    }

    pub fn add_match_value(&mut self, l: NodeId, r: NodeId, cutoff: f64) -> NodeId {
        let key = format!("match_value,{l},{r},{cutoff}");
        self.deduped(key, |g| {
            g.insert(NodeKind::MatchValue(MatchValueNode::new(l, r, cutoff)), 2)
        })
    }

    pub fn add_max(&mut self, child: NodeId) -> NodeId {
        let key = format!("max,{child}");
        self.deduped(key, |g| g.insert(NodeKind::Max(MaxNode::new(child)), 1))
    }

    pub fn add_mean_arith(&mut self, l: NodeId, r: Option<NodeId>) -> NodeId {
        let key = match r {
            Some(r) => format!("mean_arith,{l},{r}"),
            None => format!("mean_arith,{l}"),
        };
        self.deduped(key, |g| {
            g.insert(NodeKind::MeanArith(MeanArithNode::new(l, r)), 1)
        })
    }

    pub fn add_mean_geom(&mut self, l: NodeId, r: NodeId) -> NodeId {
        let key = format!("mean_geom,{l},{r}");
        self.deduped(key, |g| {
            g.insert(NodeKind::MeanGeom(MeanGeomNode::new(l, r)), 1)
        })
    }

    pub fn add_member(&mut self, child: NodeId, sel: MemberSel) -> NodeId {
        let key = format!("member,{child},{sel:?}");
        self.deduped(key, |g| {
            g.insert(NodeKind::Member(MemberNode::new(child, sel)), 1)
        })
    }

    pub fn add_mexpr(
        &mut self,
        l: Option<NodeId>,
        r: Option<NodeId>,
        d: f64,
        op: MExprOp,
    ) -> NodeId {
        let fmt = |n: Option<NodeId>| n.map(|n| n.to_string()).unwrap_or_default();
        let key = format!("mexpr,{},{},{d},{}", fmt(l), fmt(r), op.tag());
        self.deduped(key, |g| {
            g.insert(NodeKind::MExpr(MExprNode::new(l, r, d, op)), 1)
        })
    }

    pub fn add_merge(&mut self, sources: Vec<NodeId>) -> NodeId {
        let mut key = String::from("merge");
        for s in &sources {
            key.push_str(&format!(",{s}"));
        }
        self.deduped(key, |g| {
            g.insert(NodeKind::Merge(MergeNode::new(sources)), 1)
        })
    }

    pub fn add_pedestal(&mut self, child: NodeId, cutoff: f64, tpat: Option<NodeId>) -> NodeId {
        let fmt = |n: Option<NodeId>| n.map(|n| n.to_string()).unwrap_or_default();
        let key = format!("pedestal,{child},{cutoff},{}", fmt(tpat));
        let window = self.pedestal_events;
        self.deduped(key, |g| {
            g.insert(
                NodeKind::Pedestal(PedestalNode::new(child, cutoff, tpat, window)),
                2,
            )
        })
    }

    pub fn add_select_id(&mut self, child: NodeId, first: u32, last: u32) -> NodeId {
        let key = format!("select_id,{child},{first},{last}");
        self.deduped(key, |g| {
            g.insert(NodeKind::SelectId(SelectIdNode::new(child, first, last)), 1)
        })
    }

    pub fn add_signal_user(&mut self, id: NodeId, end: Option<NodeId>, v: NodeId) -> NodeId {
        let fmt = |n: Option<NodeId>| n.map(|n| n.to_string()).unwrap_or_default();
        let key = format!("signal_user,{id},{},{v}", fmt(end));
        self.deduped(key, |g| {
            g.insert(NodeKind::SignalUser(SignalUserNode::new(id, end, v)), 1)
        })
    }

    pub fn add_sub_mod(&mut self, l: NodeId, r: NodeId, range: f64) -> NodeId {
        let key = format!("sub_mod,{l},{r},{range}");
        self.deduped(key, |g| {
            g.insert(NodeKind::SubMod(SubModNode::new(l, r, range)), 1)
        })
    }

    pub fn add_tot(&mut self, leading: NodeId, trailing: NodeId, range: f64) -> NodeId {
        let key = format!("tot,{leading},{trailing},{range}");
        self.deduped(key, |g| {
            g.insert(NodeKind::Tot(TotNode::new(leading, trailing, range)), 1)
        })
    }

    pub fn add_tpat(&mut self, child: NodeId, mask: u32) -> NodeId {
        let key = format!("tpat,{child},{mask}");
        self.deduped(key, |g| {
            g.insert(NodeKind::Tpat(TpatNode::new(child, mask)), 1)
        })
    }

    pub fn add_trig_map(
        &mut self,
        path: &str,
        prefix: &str,
        l: NodeId,
        r: NodeId,
        range: f64,
    ) -> Result<NodeId, GraphError> {
        let key = format!("trig_map,{path},{prefix},{l},{r},{range}");
        if let Some(&id) = self.dedup.get(&key) {
            return Ok(id);
        }
        let offsets = self.trig_maps.load_prefix(path, prefix)?;
        let id = self.insert(
            NodeKind::TrigMap(TrigMapNode::new(l, r, range, offsets)),
            1,
        );
        self.dedup.insert(key, id);
        Ok(id)
    }

    pub fn add_zero_suppress(&mut self, child: NodeId, cutoff: f64) -> NodeId {
        let key = format!("zero_suppress,{child},{cutoff}");
        self.deduped(key, |g| {
            g.insert(
                NodeKind::ZeroSuppress(ZeroSuppressNode::new(child, cutoff)),
                1,
            )
        })
    }

    // ─── Calibrations and cuts ──────────────────────────────────────────

    /// Registers a named linear display calibration.
    pub fn add_calib(&mut self, name: &str, k: f64, m: f64) -> Result<(), GraphError> {
        if self.calibs.contains_key(name) {
            return Err(GraphError::DuplicateCalibration {
                loc: self.loc(),
                name: name.to_string(),
            });
        }
        self.calibs.insert(name.to_string(), (k, m));
        Ok(())
    }

    fn calib(&self, name: &Option<String>) -> Result<LinearTransform, GraphError> {
        match name {
            None => Ok(LinearTransform::default()),
            Some(name) => match self.calibs.get(name) {
                Some(&(k, m)) => Ok(LinearTransform::new(k, m)),
                None => Err(GraphError::UnknownCalibration {
                    loc: self.loc(),
                    name: name.clone(),
                }),
            },
        }
    }

    /// Queues a polygon; it gates the next histogram declared.
    pub fn hist_cut_add(&mut self, poly: CutPolygon) {
        self.pending_polys.push(poly);
    }

    fn check_drop_opts(
        &self,
        title: &str,
        drop_counts_s: f64,
        drop_counts_num: u32,
        drop_stats_s: f64,
    ) -> Result<u32, GraphError> {
        if drop_counts_s > 0.0 && drop_stats_s > 0.0 {
            return Err(GraphError::Histogram {
                loc: self.loc(),
                msg: format!("{title}: can only drop one of counts and stats"),
            });
        }
        if drop_counts_num > 5 {
            return Err(GraphError::Histogram {
                loc: self.loc(),
                msg: format!("{title}: cannot allow more than 5 drop-counts slices"),
            });
        }
        Ok(drop_counts_num.max(1))
    }

    fn register_cuttable(&mut self, title: &str, id: NodeId) -> Result<(), GraphError> {
        if let Some(&prev) = self.cuttable_map.get(title) {
            return Err(GraphError::DuplicateTitle {
                loc: self.loc(),
                title: title.to_string(),
                prev_loc: self.loc_of(prev).to_string(),
            });
        }
        self.cuttable_map.insert(title.to_string(), id);
        self.cuttables.push(id);
        // Bind the queued polygons to this histogram via its title.
        let polys = std::mem::take(&mut self.pending_polys);
        if !polys.is_empty() {
            self.cut_refs.push((title.to_string(), polys));
        }
        Ok(())
    }

    // ─── Sinks ──────────────────────────────────────────────────────────

    pub fn add_hist1(&mut self, title: &str, x: NodeId, opts: Hist1Opts) -> Result<(), GraphError> {
        let transform = self.calib(&opts.calib)?;
        let slices =
            self.check_drop_opts(title, opts.drop_counts_s, opts.drop_counts_num, opts.drop_stats_s)?;
        let fitter: Option<Box<dyn GaussFitter>> = if opts.fit_peaks {
            Some(Box::new(MomentsFitter))
        } else {
            None
        };
        let store = Arc::new(Hist1::new(
            title,
            opts.bins,
            transform,
            fitter,
            opts.log_y,
            opts.contour,
            opts.drop_counts_s,
            slices,
            opts.drop_stats_s,
        ));
        self.plots.add(store.clone());
        let output = self.output.as_ref().map(|o| {
            let var = o.lock().unwrap().add(&format!("{title}_x"));
            (Arc::clone(o), var)
        });
        let id = self.insert(NodeKind::Hist1(Hist1Node::new(x, store, output)), 0);
        self.register_cuttable(title, id)
    }

    pub fn add_hist2(
        &mut self,
        title: &str,
        x: NodeId,
        y: Option<NodeId>,
        opts: Hist2Opts,
    ) -> Result<(), GraphError> {
        let transform_x = self.calib(&opts.calib_x)?;
        let transform_y = self.calib(&opts.calib_y)?;
        let slices =
            self.check_drop_opts(title, opts.drop_counts_s, opts.drop_counts_num, opts.drop_stats_s)?;
        let store = Arc::new(Hist2::new(
            title,
            opts.bins_x,
            opts.bins_y,
            transform_x,
            transform_y,
            opts.log_z,
            opts.drop_counts_s,
            slices,
            opts.drop_stats_s,
            opts.single_s,
        ));
        self.plots.add(store.clone());
        let output = self.output.as_ref().map(|o| {
            let mut out = o.lock().unwrap();
            let var_x = out.add(&format!("{title}_x"));
            let var_y = out.add(&format!("{title}_y"));
            drop(out);
            (Arc::clone(o), var_x, var_y)
        });
        let id = self.insert(
            NodeKind::Hist2(Hist2Node::new(x, y, opts.permutate, store, output)),
            0,
        );
        self.register_cuttable(title, id)
    }

    pub fn add_annular(
        &mut self,
        title: &str,
        r: NodeId,
        phi: NodeId,
        opts: AnnularOpts,
    ) -> Result<(), GraphError> {
        let slices =
            self.check_drop_opts(title, opts.drop_counts_s, opts.drop_counts_num, opts.drop_stats_s)?;
        let store = Arc::new(Annular::new(
            title,
            opts.r_min,
            opts.r_max,
            opts.phi0,
            opts.log_z,
            opts.drop_counts_s,
            slices,
            opts.drop_stats_s,
        ));
        self.plots.add(store.clone());
        let output = self.output.as_ref().map(|o| {
            let mut out = o.lock().unwrap();
            let var_r = out.add(&format!("{title}_r"));
            let var_p = out.add(&format!("{title}_p"));
            drop(out);
            (Arc::clone(o), var_r, var_p)
        });
        let id = self.insert(
            NodeKind::Annular(AnnularNode::new(r, phi, store, output)),
            0,
        );
        self.register_cuttable(title, id)
    }

    // ─── Late resolution ────────────────────────────────────────────────

    /// Seals construction: turns unbound aliases into implicit signals and
    /// resolves every cut reference by title.
    pub fn finish(&mut self) -> Result<(), GraphError> {
        // Unassigned aliases must come from the input.
        let unbound: Vec<(String, String)> = self
            .alias_map
            .iter()
            .filter_map(|(name, &id)| match &self.node(id).kind {
                NodeKind::Alias(a) if a.source().is_none() => {
                    Some((name.clone(), self.loc_of(id).to_string()))
                }
                _ => None,
            })
            .collect();
        for (name, loc) in unbound {
            if !self.signal_desc_names.contains_key(&name) {
                self.signal_desc_names
                    .insert(name.clone(), self.signal_descs.len());
                self.signal_descs.push(SignalRequest {
                    loc,
                    name: name.clone(),
                    id: String::new(),
                    end: String::new(),
                    v: String::new(),
                });
            }
        }

        // Create signal leaves and bind their aliases.
        for i in 0..self.signal_descs.len() {
            let name = self.signal_descs[i].name.clone();
            if self.signal_map.contains_key(&name) {
                continue;
            }
            let loc = self.signal_descs[i].loc.clone();
            let id = self.insert_at(loc, NodeKind::Signal(SignalNode::new(&name)), 1);
            if let Some(&alias) = self.alias_map.get(&name) {
                if let NodeKind::Alias(a) = &self.node(alias).kind {
                    if a.source().is_none() {
                        a.bind(id, 0);
                    }
                }
            }
            self.signal_map.insert(name.clone(), id);
            info!(signal = %name, "registered input signal");
        }

        if !self.pending_polys.is_empty() {
            return Err(GraphError::Histogram {
                loc: self.loc(),
                msg: "cut polygons declared after the last histogram".to_string(),
            });
        }

        // Cut nodes: bind the direct reference to the source histogram and
        // register the flag on its producer.
        for i in 0..self.cut_nodes.len() {
            let cut_id = self.cut_nodes[i];
            let (poly, state, loc) = match &self.node(cut_id).kind {
                NodeKind::Cut(c) => (
                    Arc::clone(c.poly()),
                    Arc::clone(c.state()),
                    self.loc_of(cut_id).to_string(),
                ),
                _ => continue,
            };
            let Some(&src) = self.cuttable_map.get(poly.title()) else {
                return Err(GraphError::UnknownCuttable {
                    loc,
                    title: poly.title().to_string(),
                });
            };
            if let NodeKind::Cut(c) = &self.node(cut_id).kind {
                c.bind_source(src);
            }
            if let Some(producer) = self.sink_producer_mut(src) {
                producer.register(poly, state);
            }
        }

        // Gated-by declarations: register the bidirectional cut edge.
        let cut_refs = std::mem::take(&mut self.cut_refs);
        for (dst_title, polys) in cut_refs {
            let dst = self.cuttable_map[&dst_title];
            for poly in polys {
                let Some(&src) = self.cuttable_map.get(poly.title()) else {
                    return Err(GraphError::UnknownCuttable {
                        loc: self.loc_of(dst).to_string(),
                        title: poly.title().to_string(),
                    });
                };
                let state = Arc::new(CutState::default());
                let poly = Arc::new(poly);
                if let Some(producer) = self.sink_producer_mut(src) {
                    producer.register(poly, Arc::clone(&state));
                }
                if let Some(consumer) = self.sink_consumer_mut(dst) {
                    consumer.register(src, state);
                }
            }
        }
        Ok(())
    }

    fn sink_producer_mut(&mut self, id: NodeId) -> Option<&mut CutProducer> {
        match &mut self.nodes[id.idx()].kind {
            NodeKind::Hist1(n) => Some(&mut n.producer),
            NodeKind::Hist2(n) => Some(&mut n.producer),
            NodeKind::Annular(n) => Some(&mut n.producer),
            _ => None,
        }
    }

    fn sink_consumer_mut(&mut self, id: NodeId) -> Option<&mut CutConsumer> {
        match &mut self.nodes[id.idx()].kind {
            NodeKind::Hist1(n) => Some(&mut n.consumer),
            NodeKind::Hist2(n) => Some(&mut n.consumer),
            NodeKind::Annular(n) => Some(&mut n.consumer),
            _ => None,
        }
    }
}

impl SignalBinder for Graph {
    fn requests(&self) -> Vec<SignalRequest> {
        self.signal_descs.clone()
    }

    fn bind(
        &self,
        name: &str,
        member: MemberKind,
        buffer_id: usize,
        ty: SigType,
    ) -> Result<(), InputError> {
        use crate::nodes::signal::{Member, MemberSlot};

        let Some(&id) = self.signal_map.get(name) else {
            return Err(InputError::UnknownSignal {
                loc: String::new(),
                name: name.to_string(),
            });
        };
        let node = self.node(id);
        let NodeKind::Signal(signal) = &node.kind else {
            return Err(InputError::UnknownSignal {
                loc: node.loc.clone(),
                name: name.to_string(),
            });
        };
        let slot = match member {
            MemberKind::Id => MemberSlot::Id,
            MemberKind::End => MemberSlot::End,
            MemberKind::V => MemberSlot::V,
        };
        if matches!(member, MemberKind::Id | MemberKind::End) && !ty.is_int() {
            return Err(InputError::NonIntegerMember {
                loc: node.loc.clone(),
                name: name.to_string(),
            });
        }
        if !signal.bind(slot, Member { buffer_id, ty }) {
            return Err(InputError::MemberRebound {
                loc: node.loc.clone(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}
