//! End-to-end graph tests: signals in through a canned input, values and
//! histogram contents out.

use std::sync::Arc;

use skarn_graph::{
    AnnularOpts, CutPolygon, EventCtx, EventDriver, FilterCond, Graph, GraphError, Hist1Opts,
    Hist2Opts, MExprOp,
};
use skarn_hist::{Axis, LinearTransform, Peak, Renderer};
use skarn_input::{Input, MemberKind, MemoryInput, SignalBinder};
use skarn_pipeline::FakeClock;
use skarn_value::SigType;

/// Renderer that records the latched data per title.
#[derive(Default)]
struct TestRenderer {
    hist1: std::collections::HashMap<String, Vec<u32>>,
    hist2: std::collections::HashMap<String, Vec<u32>>,
    annular: std::collections::HashMap<String, Vec<u32>>,
}

impl Renderer for TestRenderer {
    fn draw_hist1(
        &mut self,
        title: &str,
        _axis: &Axis,
        _transform: &LinearTransform,
        _log_y: bool,
        _contour: bool,
        data: &[u32],
        _peaks: &[Peak],
    ) {
        self.hist1.insert(title.to_string(), data.to_vec());
    }

    fn draw_hist2(
        &mut self,
        title: &str,
        _axis_x: &Axis,
        _axis_y: &Axis,
        _tx: &LinearTransform,
        _ty: &LinearTransform,
        _log_z: bool,
        data: &[u32],
    ) {
        self.hist2.insert(title.to_string(), data.to_vec());
    }

    fn draw_annular(
        &mut self,
        title: &str,
        _axis_r: &Axis,
        _r_min: f64,
        _r_max: f64,
        _axis_phi: &Axis,
        _phi0: f64,
        _log_z: bool,
        data: &[u32],
    ) {
        self.annular.insert(title.to_string(), data.to_vec());
    }
}

fn step(input: &MemoryInput) {
    assert!(input.fetch().unwrap());
    input.buffer();
}

#[test]
fn signal_leaf_copies_a_multi_hit_array() {
    let mut graph = Graph::new("test.conf");
    graph.add_signal("s", "sid", "send", "sv");
    let s = graph.alias_ref("s");
    graph.finish().unwrap();

    // Buffers: 0 = id, 1 = end, 2 = v.
    graph.bind("s", MemberKind::Id, 0, SigType::U64).unwrap();
    graph.bind("s", MemberKind::End, 1, SigType::U64).unwrap();
    graph.bind("s", MemberKind::V, 2, SigType::U64).unwrap();

    let input = MemoryInput::from_u64(3, vec![vec![
        vec![1, 3],
        vec![2, 3],
        vec![10, 20, 30],
    ]]);
    step(&input);

    let clock = FakeClock::new(0);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(s, 0, &ctx).unwrap();

    let val = graph.value(s, 0);
    assert_eq!(val.ty(), SigType::U64);
    assert_eq!(val.ids(), &[1, 3]);
    assert_eq!(val.ends(), &[2, 3]);
    let vs: Vec<u64> = val.hits().iter().map(|s| s.u64()).collect();
    assert_eq!(vs, [10, 20, 30]);
}

#[test]
fn late_bound_identifier_resolves_after_assignment() {
    let mut graph = Graph::new("test.conf");
    // Use "x" before it is assigned.
    let x = graph.alias_ref("x");
    let doubled = graph.add_mexpr(Some(x), None, 2.0, MExprOp::Mul);
    // Now assign x = raw + 1.
    let raw = graph.alias_ref("raw");
    let plus = graph.add_mexpr(Some(raw), None, 1.0, MExprOp::Add);
    graph.add_alias("x", plus, 0);
    graph.finish().unwrap();

    // "raw" became an implicit signal.
    assert!(graph.requests().iter().any(|r| r.name == "raw"));
    graph.bind("raw", MemberKind::V, 0, SigType::U64).unwrap();

    let input = MemoryInput::from_u64(1, vec![vec![vec![5]]]);
    step(&input);
    let clock = FakeClock::new(0);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(doubled, 0, &ctx).unwrap();

    let val = graph.value(doubled, 0);
    assert_eq!(val.hits()[0].f64(), 12.0);
}

#[test]
fn structural_deduplication_reuses_nodes() {
    let mut graph = Graph::new("test.conf");
    let s = graph.alias_ref("s");
    let a = graph.add_zero_suppress(s, 2.0);
    let before = graph.len();
    let b = graph.add_zero_suppress(s, 2.0);
    assert_eq!(a, b);
    assert_eq!(graph.len(), before);
    let c = graph.add_zero_suppress(s, 3.0);
    assert_ne!(a, c);
}

#[test]
fn duplicate_histogram_titles_are_fatal() {
    let mut graph = Graph::new("test.conf");
    let s = graph.alias_ref("s");
    graph.add_hist1("h", s, Hist1Opts::default()).unwrap();
    let err = graph.add_hist1("h", s, Hist1Opts::default()).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateTitle { .. }));
}

#[test]
fn unknown_cut_source_is_fatal_at_finish() {
    let mut graph = Graph::new("test.conf");
    let s = graph.alias_ref("s");
    let poly = CutPolygon::new("no-such-histogram", &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
    graph.hist_cut_add(poly);
    graph.add_hist1("h", s, Hist1Opts::default()).unwrap();
    let err = graph.finish().unwrap_err();
    assert!(matches!(err, GraphError::UnknownCuttable { .. }));
}

#[test]
fn cut_gates_a_downstream_histogram() {
    let mut graph = Graph::new("test.conf");
    let x = graph.alias_ref("x");
    let y = graph.alias_ref("y");
    graph
        .add_hist2("xy", x, Some(y), Hist2Opts::default())
        .unwrap();
    // "gated" only fills while (x,y) lies inside the square drawn on "xy".
    graph.hist_cut_add(CutPolygon::new(
        "xy",
        &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
    ));
    graph.add_hist1("gated", x, Hist1Opts::default()).unwrap();
    graph.finish().unwrap();

    graph.bind("x", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("y", MemberKind::V, 1, SigType::U64).unwrap();

    let plots = graph.plots();
    let clock = Arc::new(FakeClock::new(0));
    let mut driver = EventDriver::new(graph, clock);

    // One event inside the cut, one outside.
    let input = MemoryInput::from_u64(2, vec![
        vec![vec![5], vec![5]],
        vec![vec![50], vec![50]],
    ]);
    for _ in 0..2 {
        step(&input);
        driver.do_event(&input).unwrap();
    }

    let mut renderer = TestRenderer::default();
    plots.draw_all(&mut renderer, 0);

    // The source histogram saw both samples exactly once each (the gated
    // consumer re-processes it, which must memoise, not double-fill).
    assert_eq!(renderer.hist2["xy"].iter().sum::<u32>(), 2);
    // The gated histogram saw only the inside event.
    assert_eq!(renderer.hist1["gated"].iter().sum::<u32>(), 1);
}

#[test]
fn clock_match_throttles_and_rejects_regressions() {
    let mut graph = Graph::new("test.conf");
    let ts = graph.alias_ref("ts");
    graph.set_clock_match(ts, 1.0);
    let x = graph.alias_ref("x");
    graph.add_hist1("h", x, Hist1Opts::default()).unwrap();
    graph.finish().unwrap();
    graph.bind("ts", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("x", MemberKind::V, 1, SigType::U64).unwrap();

    let clock = Arc::new(FakeClock::new(0));
    let mut driver = EventDriver::new(graph, clock.clone());

    // Timestamps two virtual seconds apart; wall clock stands still, so
    // the driver must sleep the difference off.
    let input = MemoryInput::from_u64(2, vec![
        vec![vec![10], vec![1]],
        vec![vec![12], vec![2]],
        vec![vec![11], vec![3]],
    ]);
    step(&input);
    driver.do_event(&input).unwrap();
    assert_eq!(clock.slept_ms(), 0, "first event sets the epoch");

    step(&input);
    driver.do_event(&input).unwrap();
    assert!(
        clock.slept_ms() >= 1900,
        "expected ~2s throttle, slept {}ms",
        clock.slept_ms()
    );

    // Timestamp going backwards is fatal.
    step(&input);
    let err = driver.do_event(&input).unwrap_err();
    assert!(err.to_string().contains("non-monotonic"));
}

#[test]
fn missing_signals_read_empty_and_histograms_stay_unfilled() {
    let mut graph = Graph::new("test.conf");
    let x = graph.alias_ref("missing");
    graph.add_hist1("h", x, Hist1Opts::default()).unwrap();
    graph.finish().unwrap();
    // Never bound: the input has no such signal.

    let plots = graph.plots();
    let clock = Arc::new(FakeClock::new(0));
    let mut driver = EventDriver::new(graph, clock);

    let input = MemoryInput::from_u64(1, vec![vec![vec![1, 2, 3]]]);
    step(&input);
    driver.do_event(&input).unwrap();

    let mut renderer = TestRenderer::default();
    plots.draw_all(&mut renderer, 0);
    // Latched copy stays empty: nothing was ever prefilled.
    assert!(!renderer.hist1.contains_key("h"));
}

#[test]
fn filter_range_passes_hits_only_when_all_conditions_hold() {
    let mut graph = Graph::new("test.conf");
    let cond = graph.alias_ref("tdc");
    let arg = graph.alias_ref("adc");
    let filtered = graph.add_filter_range(
        vec![FilterCond {
            node: cond,
            lower: 5.0,
            lower_le: true,
            upper: 10.0,
            upper_le: false,
        }],
        vec![arg],
    );
    graph.finish().unwrap();
    graph.bind("tdc", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("adc", MemberKind::V, 1, SigType::U64).unwrap();

    // Event 0: tdc in [5,10) -> adc passes. Event 1: out of range.
    let input = MemoryInput::from_u64(2, vec![
        vec![vec![7], vec![1000]],
        vec![vec![20], vec![2000]],
    ]);
    let clock = FakeClock::new(0);

    step(&input);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(filtered, 0, &ctx).unwrap();
    {
        let val = graph.value(filtered, 0);
        assert_eq!(val.hits().len(), 1);
        assert_eq!(val.hits()[0].u64(), 1000);
    }

    step(&input);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(filtered, 1, &ctx).unwrap();
    assert!(graph.value(filtered, 0).is_empty());
}

#[test]
fn bitfield_packs_lsb_first_and_rejects_overflow() {
    let mut graph = Graph::new("test.conf");
    let lo = graph.alias_ref("lo");
    let hi = graph.alias_ref("hi");
    let packed = graph.add_bitfield(vec![(lo, 3), (hi, 4)]);
    graph.finish().unwrap();
    graph.bind("lo", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("hi", MemberKind::V, 1, SigType::U64).unwrap();

    let input = MemoryInput::from_u64(2, vec![
        vec![vec![3], vec![5]],
        vec![vec![9], vec![5]], // 9 does not fit in 3 bits
    ]);
    let clock = FakeClock::new(0);

    step(&input);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(packed, 0, &ctx).unwrap();
    assert_eq!(graph.value(packed, 0).hits()[0].u64(), 3 | (5 << 3));

    step(&input);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(packed, 1, &ctx).unwrap();
    assert!(graph.value(packed, 0).is_empty());
}

#[test]
fn signal_user_composes_id_and_value_streams() {
    let mut graph = Graph::new("test.conf");
    let ids = graph.alias_ref("ids");
    let vs = graph.alias_ref("vs");
    let composed = graph.add_signal_user(ids, None, vs);
    graph.finish().unwrap();
    graph.bind("ids", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("vs", MemberKind::V, 1, SigType::U64).unwrap();

    let input = MemoryInput::from_u64(2, vec![vec![vec![2, 3], vec![7, 8]]]);
    step(&input);
    let clock = FakeClock::new(0);
    let ctx = EventCtx { input: &input, clock: &clock };
    graph.process(composed, 0, &ctx).unwrap();

    let val = graph.value(composed, 0);
    assert_eq!(val.ids(), &[2, 3]);
    assert_eq!(val.hits()[0].u64(), 7);
    assert_eq!(val.hits()[1].u64(), 8);
}

#[test]
fn cut_node_exposes_the_membership_flag_as_a_value() {
    let mut graph = Graph::new("test.conf");
    let x = graph.alias_ref("x");
    let y = graph.alias_ref("y");
    graph
        .add_hist2("xy", x, Some(y), Hist2Opts::default())
        .unwrap();
    let flag = graph.add_cut(CutPolygon::new(
        "xy",
        &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
    ));
    graph.add_hist1("flag", flag, Hist1Opts::default()).unwrap();
    graph.finish().unwrap();
    graph.bind("x", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("y", MemberKind::V, 1, SigType::U64).unwrap();

    let clock = Arc::new(FakeClock::new(0));
    let mut driver = EventDriver::new(graph, clock);
    let input = MemoryInput::from_u64(2, vec![
        vec![vec![5], vec![5]],
        vec![vec![50], vec![50]],
    ]);

    step(&input);
    driver.do_event(&input).unwrap();
    assert_eq!(driver.graph().value(flag, 0).hits()[0].u64(), 1);

    step(&input);
    driver.do_event(&input).unwrap();
    assert_eq!(driver.graph().value(flag, 0).hits()[0].u64(), 0);
}

#[test]
fn annular_histogram_fills_paired_samples() {
    let mut graph = Graph::new("test.conf");
    let r = graph.alias_ref("r");
    let phi = graph.alias_ref("phi");
    graph
        .add_annular(
            "ring",
            r,
            phi,
            AnnularOpts {
                r_min: 0.0,
                r_max: 100.0,
                ..AnnularOpts::default()
            },
        )
        .unwrap();
    graph.finish().unwrap();
    graph.bind("r", MemberKind::V, 0, SigType::U64).unwrap();
    graph.bind("phi", MemberKind::V, 1, SigType::U64).unwrap();

    let plots = graph.plots();
    let clock = Arc::new(FakeClock::new(0));
    let mut driver = EventDriver::new(graph, clock);

    let input = MemoryInput::from_u64(2, vec![vec![vec![10, 20], vec![90, 180]]]);
    step(&input);
    driver.do_event(&input).unwrap();

    let mut renderer = TestRenderer::default();
    plots.draw_all(&mut renderer, 0);
    assert_eq!(renderer.annular["ring"].iter().sum::<u32>(), 2);
}
