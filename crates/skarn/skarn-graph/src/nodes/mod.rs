//! The transform-node catalogue.
//!
//! Each node declares a fixed fan-in and fan-out and computes its output
//! values from its input values for the current event. Pure transforms keep
//! their computation in a free kernel function so tests can drive them with
//! hand-built values; the `process` methods wire the kernels into the
//! arena.

pub mod alias;
pub mod annular;
pub mod array;
pub mod bitfield;
pub mod cluster;
pub mod coarse_fine;
pub mod cut;
pub mod filter_range;
pub mod floor;
pub mod hist1;
pub mod hist2;
pub mod length;
pub mod match_id;
pub mod match_value;
pub mod max;
pub mod mean_arith;
pub mod mean_geom;
pub mod member;
pub mod merge;
pub mod mexpr;
pub mod pedestal;
pub mod select_id;
pub mod signal;
pub mod signal_user;
pub mod sub_mod;
pub mod tot;
pub mod tpat;
pub mod trig_map;
pub mod zero_suppress;

use skarn_value::{Scalar, Value};

/// Iterates `(channel, hits)` over a value's groups.
pub(crate) fn groups(val: &Value) -> impl Iterator<Item = (u32, &[Scalar])> + '_ {
    val.ids().iter().enumerate().map(|(i, &ch)| (ch, val.group(i)))
}

/// Hits of `channel` in `val`, empty when absent. Linear scan; group counts
/// per event are small.
pub(crate) fn channel_hits<'a>(val: &'a Value, channel: u32) -> &'a [Scalar] {
    for (i, &ch) in val.ids().iter().enumerate() {
        if ch == channel {
            return val.group(i);
        }
    }
    &[]
}
