//! Greedy neighbour-merge clustering on consecutive channel ids.
//!
//! Runs of adjacent channels merge into one cluster; each cluster emits a
//! centre of gravity (channel weighted by the first hit per channel) and
//! its summed energy. Output is sorted by descending sum; the `eta` output
//! carries the fractional part of the centre, useful for position
//! interpolation across strips.

use skarn_value::{Scalar, SigType, Value};

use crate::driver::EventCtx;
use crate::node::{Graph, Node, NodeId};
use crate::EvalError;

pub struct ClusterNode {
    child: NodeId,
}

impl ClusterNode {
    pub(crate) fn new(child: NodeId) -> Self {
        ClusterNode { child }
    }

    pub(crate) fn process(
        &self,
        g: &Graph,
        node: &Node,
        evid: u64,
        ctx: &EventCtx,
    ) -> Result<(), EvalError> {
        g.process(self.child, evid, ctx)?;
        let val = g.value(self.child, 0);
        let mut out = node.out.borrow_mut();
        let (clu, eta) = out.split_at_mut(1);
        apply(&val, &mut clu[0], &mut eta[0]);
        Ok(())
    }
}

pub fn apply(val: &Value, clu: &mut Value, eta: &mut Value) {
    clu.clear();
    eta.clear();
    let _ = clu.set_type(SigType::F64);
    let _ = eta.set_type(SigType::F64);

    if val.ids().is_empty() {
        return;
    }

    struct Entry {
        x: f64,
        e: f64,
    }
    let mut entries: Vec<Entry> = Vec::new();
    let mut flush = |sum_x: f64, sum_e: f64| {
        if sum_e > 0.0 {
            entries.push(Entry { x: sum_x / sum_e, e: sum_e });
        }
    };

    let mut prev: Option<u32> = None;
    let mut sum_x = 0.0;
    let mut sum_e = 0.0;
    for (i, &ch) in val.ids().iter().enumerate() {
        if prev.is_some_and(|p| p + 1 != ch) {
            flush(sum_x, sum_e);
            sum_x = 0.0;
            sum_e = 0.0;
        }
        // The first hit of the channel carries the cluster weight.
        let start = val.group_start(i) as usize;
        let v = val.get_f64(start, false);
        sum_x += ch as f64 * v;
        sum_e += v;
        prev = Some(ch);
    }
    flush(sum_x, sum_e);

    entries.sort_by(|a, b| b.e.partial_cmp(&a.e).unwrap_or(std::cmp::Ordering::Equal));
    for entry in &entries {
        let ch = entry.x as u32;
        clu.push(ch, Scalar::from_f64(entry.e));
        eta.push(ch, Scalar::from_f64(entry.x - entry.x.floor()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(hits: &[(u32, u64)]) -> Value {
        let mut v = Value::new();
        v.set_type(SigType::U64).unwrap();
        for &(ch, x) in hits {
            v.push(ch, Scalar::from_u64(x));
        }
        v
    }

    #[test]
    fn adjacent_channels_merge_and_sort_by_sum() {
        // {0,1,2} sums to 4 with CoG 1.0; {5} sums to 7 and ranks first.
        let val = value(&[(0, 1), (1, 2), (2, 1), (5, 7)]);
        let mut clu = Value::new();
        let mut eta = Value::new();
        apply(&val, &mut clu, &mut eta);

        assert_eq!(clu.ids(), &[5, 1]);
        assert_eq!(clu.hits()[0].f64(), 7.0);
        assert_eq!(clu.hits()[1].f64(), 4.0);
        assert_eq!(eta.hits()[0].f64(), 0.0);
        assert_eq!(eta.hits()[1].f64(), 0.0);
    }

    #[test]
    fn fractional_centre_lands_in_eta() {
        // Channels 3,4 with weights 1,3: CoG = (3 + 12)/4 = 3.75.
        let val = value(&[(3, 1), (4, 3)]);
        let mut clu = Value::new();
        let mut eta = Value::new();
        apply(&val, &mut clu, &mut eta);

        assert_eq!(clu.ids(), &[3]);
        assert_eq!(clu.hits()[0].f64(), 4.0);
        assert!((eta.hits()[0].f64() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_input_empty_output() {
        let val = Value::new();
        let mut clu = Value::new();
        let mut eta = Value::new();
        apply(&val, &mut clu, &mut eta);
        assert!(clu.is_empty());
        assert!(eta.is_empty());
    }
}
