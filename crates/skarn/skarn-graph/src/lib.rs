//! The node-graph evaluation engine.
//!
//! A configuration declares a DAG of transform nodes over the input's
//! signals, terminating in histogram sinks. The graph owns every node in
//! one arena; nodes reference each other by index. Evaluation is per-event,
//! dependency-driven and memoised: the driver processes each cuttable sink
//! in declaration order, and every sink pulls its transitive inputs lazily,
//! at most once per event.
//!
//! Construction is append-only with structural deduplication, identifiers
//! late-bind through alias nodes, and cut references resolve by histogram
//! title in a single pass after parsing.

pub mod builder;
pub mod cut;
pub mod driver;
pub mod node;
pub mod nodes;
pub mod trig_map;

pub use builder::{AnnularOpts, Hist1Opts, Hist2Opts};
pub use cut::CutPolygon;
pub use driver::{EventCtx, EventDriver};
pub use node::{Graph, NodeId, SharedOutput};
pub use nodes::filter_range::FilterCond;
pub use nodes::member::MemberSel;
pub use nodes::mexpr::MExprOp;

use skarn_value::TypeMismatch;

/// Construction-time failures. All fatal, all carrying a source location.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("{loc}: histogram '{title}' does not exist")]
    UnknownCuttable { loc: String, title: String },

    #[error("{loc}: histogram title '{title}' already used at {prev_loc}")]
    DuplicateTitle {
        loc: String,
        title: String,
        prev_loc: String,
    },

    #[error("{loc}: calibration '{name}' already exists")]
    DuplicateCalibration { loc: String, name: String },

    #[error("{loc}: calibration '{name}' must be defined before the histogram")]
    UnknownCalibration { loc: String, name: String },

    #[error("{loc}: {msg}")]
    Histogram { loc: String, msg: String },

    #[error("failed to read trigger map '{path}'")]
    TrigMapRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("trigger map '{path}':{line}: cannot parse entry")]
    TrigMapParse { path: String, line: usize },
}

/// Per-event failures that abort the run. Recoverable per-event issues are
/// logged and skipped instead, they never surface here.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{loc}: {source}")]
    Type {
        loc: String,
        #[source]
        source: TypeMismatch,
    },

    #[error("{loc}: non-monotonic timestamp for rate-matching (prev={prev} curr={curr})")]
    NonMonotonicClock { loc: String, prev: f64, curr: f64 },

    #[error("{loc}: {msg}")]
    Node { loc: String, msg: String },
}
