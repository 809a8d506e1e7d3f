//! Per-channel trigger-offset maps, read once at construction.
//!
//! A map file is whitespace-separated text, one entry per line:
//!
//! ```text
//! # prefix  channel  offset
//! los       3        1324.5
//! tofd      17       -12.25
//! ```
//!
//! `#` starts a comment. Each file is parsed once and cached; nodes share
//! the per-prefix tables through `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::GraphError;

pub type Offsets = Arc<HashMap<u32, f64>>;

#[derive(Default)]
pub struct TrigMapCache {
    files: HashMap<String, HashMap<String, HashMap<u32, f64>>>,
}

impl TrigMapCache {
    /// Offsets for one prefix of one map file. Unknown prefixes yield an
    /// empty table; channels without an entry get offset 0 downstream.
    pub fn load_prefix(&mut self, path: &str, prefix: &str) -> Result<Offsets, GraphError> {
        if !self.files.contains_key(path) {
            self.files.insert(path.to_string(), parse(path)?);
        }
        let by_prefix = &self.files[path];
        let table = by_prefix.get(prefix).cloned().unwrap_or_default();
        info!(path, prefix, entries = table.len(), "loaded trigger map");
        Ok(Arc::new(table))
    }
}

fn parse(path: &str) -> Result<HashMap<String, HashMap<u32, f64>>, GraphError> {
    let text = std::fs::read_to_string(path).map_err(|source| GraphError::TrigMapRead {
        path: path.to_string(),
        source,
    })?;
    let mut out: HashMap<String, HashMap<u32, f64>> = HashMap::new();
    for (line_i, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut it = line.split_whitespace();
        let entry = (|| {
            let prefix = it.next()?;
            let channel: u32 = it.next()?.parse().ok()?;
            let offset: f64 = it.next()?.parse().ok()?;
            Some((prefix, channel, offset))
        })();
        let Some((prefix, channel, offset)) = entry else {
            return Err(GraphError::TrigMapParse {
                path: path.to_string(),
                line: line_i + 1,
            });
        };
        out.entry(prefix.to_string())
            .or_default()
            .insert(channel, offset);
    }
    Ok(out)
}
