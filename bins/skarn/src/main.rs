//! skarn: online monitor for experimental event data.
//!
//! Wires the pieces together: settings file in, framed event stream in,
//! node graph over the signals, histograms latched to a renderer at a
//! capped rate. Usage: `skarn <config.toml>`.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use skarn_config::SkarnConfig;
use skarn_graph::{AnnularOpts, EventDriver, Graph, Hist1Opts, Hist2Opts};
use skarn_hist::{Axis, LinearTransform, Peak, Renderer};
use skarn_input::StreamInput;
use skarn_output::{Output, TableOutput};
use skarn_pipeline::{MonoClock, Pipeline, now_ms};
use tracing::info;
use tracing_subscriber::EnvFilter;

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn on_sigint(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

/// Renderer that reports plot summaries to the log; stands in until a
/// graphical or HTTP front-end is attached.
struct LogRenderer;

impl Renderer for LogRenderer {
    fn draw_hist1(
        &mut self,
        title: &str,
        axis: &Axis,
        _transform: &LinearTransform,
        _log_y: bool,
        _contour: bool,
        data: &[u32],
        peaks: &[Peak],
    ) {
        let counts: u64 = data.iter().map(|&c| c as u64).sum();
        tracing::debug!(
            title,
            bins = axis.bins,
            min = axis.min,
            max = axis.max,
            counts,
            peaks = peaks.len(),
            "hist1"
        );
    }

    fn draw_hist2(
        &mut self,
        title: &str,
        axis_x: &Axis,
        axis_y: &Axis,
        _tx: &LinearTransform,
        _ty: &LinearTransform,
        _log_z: bool,
        data: &[u32],
    ) {
        let counts: u64 = data.iter().map(|&c| c as u64).sum();
        tracing::debug!(
            title,
            bins_x = axis_x.bins,
            bins_y = axis_y.bins,
            counts,
            "hist2"
        );
    }

    fn draw_annular(
        &mut self,
        title: &str,
        axis_r: &Axis,
        _r_min: f64,
        _r_max: f64,
        _axis_phi: &Axis,
        _phi0: f64,
        _log_z: bool,
        data: &[u32],
    ) {
        let counts: u64 = data.iter().map(|&c| c as u64).sum();
        tracing::debug!(title, bins_r = axis_r.bins, counts, "annular");
    }
}

fn build_graph(config: &SkarnConfig) -> Result<Graph, Box<dyn std::error::Error>> {
    let mut graph = Graph::new("config");
    graph.set_ui_rate(config.ui_rate);
    graph.set_pedestal_events(config.pedestal_events);

    if let Some(path) = &config.output {
        let table = TableOutput::create(path)?;
        graph.set_output(Arc::new(Mutex::new(Box::new(table) as Box<dyn Output>)));
    }

    for h in &config.hist1 {
        let x = graph.alias_ref(&h.signal);
        graph.add_hist1(
            &h.title,
            x,
            Hist1Opts {
                bins: h.bins,
                log_y: h.log_y,
                fit_peaks: h.fit_peaks,
                drop_counts_s: h.drop_counts_s,
                drop_counts_num: h.drop_counts_num,
                drop_stats_s: h.drop_stats_s,
                ..Hist1Opts::default()
            },
        )?;
    }
    for h in &config.hist2 {
        let x = graph.alias_ref(&h.x);
        let y = h.y.as_ref().map(|y| graph.alias_ref(y));
        graph.add_hist2(
            &h.title,
            x,
            y,
            Hist2Opts {
                bins_x: h.bins_x,
                bins_y: h.bins_y,
                log_z: h.log_z,
                drop_counts_s: h.drop_counts_s,
                drop_counts_num: h.drop_counts_num,
                drop_stats_s: h.drop_stats_s,
                ..Hist2Opts::default()
            },
        )?;
    }
    for h in &config.annular {
        let r = graph.alias_ref(&h.r);
        let phi = graph.alias_ref(&h.phi);
        graph.add_annular(
            &h.title,
            r,
            phi,
            AnnularOpts {
                r_min: h.r_min,
                r_max: h.r_max,
                phi0: h.phi0,
                log_z: h.log_z,
                drop_counts_s: h.drop_counts_s,
                drop_counts_num: h.drop_counts_num,
                drop_stats_s: h.drop_stats_s,
            },
        )?;
    }
    if let Some(cm) = &config.clock_match {
        let node = graph.alias_ref(&cm.signal);
        graph.set_clock_match(node, cm.s_per_tick);
    }
    graph.finish()?;
    Ok(graph)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .ok_or("usage: skarn <config.toml>")?;
    let config = SkarnConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }

    let graph = build_graph(&config)?;
    let plots = graph.plots();
    let ui_rate = graph.ui_rate().max(1);

    let input = Arc::new(StreamInput::open(&config.input, &graph)?);

    info!(
        input = %config.input,
        plots = plots.len(),
        "SKARN: monitoring event stream"
    );

    let mut driver = EventDriver::new(graph, Arc::new(MonoClock));
    let pipeline = Pipeline::spawn(Arc::clone(&input), move |input: &StreamInput| {
        driver.do_event(input)
    });

    let mut renderer = LogRenderer;
    let frame_ms = 1000 / ui_rate as u64;
    let mut rate_t0 = now_ms();
    let mut rate_ev0 = 0u64;
    while RUNNING.load(Ordering::Relaxed) && pipeline.is_running() {
        let t = now_ms();
        plots.draw_all(&mut renderer, t);

        // Event-rate sample twice a second.
        if t > rate_t0 + 500 {
            let (_, ev) = pipeline.seqs();
            let rate = (ev - rate_ev0) as f64 * 1000.0 / (t - rate_t0) as f64;
            tracing::debug!(events = ev, "event rate {rate:.0}/s");
            rate_t0 = t;
            rate_ev0 = ev;
        }

        std::thread::sleep(std::time::Duration::from_millis(frame_ms));
    }

    info!("shutting down");
    pipeline.join();
    Ok(())
}
