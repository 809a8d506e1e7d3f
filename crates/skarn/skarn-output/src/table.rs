//! Tab-separated table writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::{Output, OutputError, Var};

pub struct TableOutput {
    path: String,
    out: BufWriter<File>,
    /// Column names collected until the first fill freezes the layout.
    pending: Vec<String>,
    values: Vec<f64>,
    /// Set once any column was filled this event; empty events write no row.
    touched: bool,
}

impl TableOutput {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, OutputError> {
        let path_str = path.as_ref().display().to_string();
        let file = File::create(&path).map_err(|source| OutputError::Create {
            path: path_str.clone(),
            source,
        })?;
        info!(path = %path_str, "created output table");
        Ok(TableOutput {
            path: path_str,
            out: BufWriter::new(file),
            pending: Vec::new(),
            values: Vec::new(),
            touched: false,
        })
    }

    fn freeze(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let header = self.pending.join("\t");
        if let Err(e) = writeln!(self.out, "# {header}") {
            warn!(path = %self.path, error = %e, "failed to write header");
        }
        self.values = vec![0.0; self.pending.len()];
        self.pending.clear();
    }

    /// Column names are sanitised for the table: anything that is not
    /// alphanumeric becomes an underscore.
    fn clean_name(name: &str) -> String {
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl Output for TableOutput {
    fn add(&mut self, name: &str) -> Var {
        let id = (self.pending.len() + self.values.len()) as u32;
        self.pending.push(Self::clean_name(name));
        Var { id }
    }

    fn fill(&mut self, var: Var, value: f64) {
        self.freeze();
        if let Some(slot) = self.values.get_mut(var.id as usize) {
            *slot = value;
            self.touched = true;
        }
    }

    fn finish_event(&mut self) {
        if !self.touched {
            return;
        }
        self.touched = false;
        let mut first = true;
        for v in &self.values {
            let sep = if first { "" } else { "\t" };
            if let Err(e) = write!(self.out, "{sep}{v}") {
                warn!(path = %self.path, error = %e, "failed to write row");
                break;
            }
            first = false;
        }
        let _ = writeln!(self.out);
        for v in &mut self.values {
            *v = 0.0;
        }
    }
}

impl Drop for TableOutput {
    fn drop(&mut self) {
        info!(path = %self.path, "closing output table");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        {
            let mut out = TableOutput::create(&path).unwrap();
            let a = out.add("h1_x");
            let b = out.add("h2 y");
            out.fill(a, 1.5);
            out.fill(b, 2.0);
            out.finish_event();
            out.fill(b, 3.0);
            out.finish_event();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# h1_x\th2_y");
        assert_eq!(lines[1], "1.5\t2");
        assert_eq!(lines[2], "0\t3");
    }

    #[test]
    fn empty_events_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        {
            let mut out = TableOutput::create(&path).unwrap();
            let _ = out.add("x");
            out.finish_event();
            out.finish_event();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.is_empty());
    }
}
