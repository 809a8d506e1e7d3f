use serde::Deserialize;
use std::path::Path;

/// Runtime settings for the monitor binary, including the declarative plot
/// list the graph is built from.
#[derive(Deserialize, Debug)]
pub struct SkarnConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// UI frame-rate cap in Hz.
    #[serde(default = "defaults::ui_rate")]
    pub ui_rate: u32,
    /// Event stream path; "-" reads stdin.
    #[serde(default = "defaults::input")]
    pub input: String,
    /// Optional per-event scalar table.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default = "defaults::pedestal_events")]
    pub pedestal_events: u64,
    #[serde(default)]
    pub clock_match: Option<ClockMatchConfig>,
    #[serde(default)]
    pub hist1: Vec<Hist1Config>,
    #[serde(default)]
    pub hist2: Vec<Hist2Config>,
    #[serde(default)]
    pub annular: Vec<AnnularConfig>,
}

#[derive(Deserialize, Debug)]
pub struct ClockMatchConfig {
    pub signal: String,
    pub s_per_tick: f64,
}

#[derive(Deserialize, Debug)]
pub struct Hist1Config {
    pub title: String,
    pub signal: String,
    #[serde(default)]
    pub bins: u32,
    #[serde(default)]
    pub log_y: bool,
    #[serde(default)]
    pub fit_peaks: bool,
    #[serde(default)]
    pub drop_counts_s: f64,
    #[serde(default = "defaults::drop_counts_num")]
    pub drop_counts_num: u32,
    #[serde(default)]
    pub drop_stats_s: f64,
}

#[derive(Deserialize, Debug)]
pub struct Hist2Config {
    pub title: String,
    pub x: String,
    /// Omitted: plot the signal's values against its channel ids.
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub bins_x: u32,
    #[serde(default)]
    pub bins_y: u32,
    #[serde(default)]
    pub log_z: bool,
    #[serde(default)]
    pub drop_counts_s: f64,
    #[serde(default = "defaults::drop_counts_num")]
    pub drop_counts_num: u32,
    #[serde(default)]
    pub drop_stats_s: f64,
}

#[derive(Deserialize, Debug)]
pub struct AnnularConfig {
    pub title: String,
    pub r: String,
    pub phi: String,
    pub r_min: f64,
    pub r_max: f64,
    #[serde(default)]
    pub phi0: f64,
    #[serde(default)]
    pub log_z: bool,
    #[serde(default)]
    pub drop_counts_s: f64,
    #[serde(default = "defaults::drop_counts_num")]
    pub drop_counts_num: u32,
    #[serde(default)]
    pub drop_stats_s: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn ui_rate() -> u32 {
        20
    }

    pub fn input() -> String {
        "-".into()
    }

    pub fn pedestal_events() -> u64 {
        10_000
    }

    pub fn drop_counts_num() -> u32 {
        1
    }
}

impl SkarnConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: SkarnConfig = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_in() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[hist1]]
title = "adc spectrum"
signal = "adc"
bins = 256

[[hist2]]
title = "map"
x = "adc"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = SkarnConfig::load(file.path().display().to_string()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.ui_rate, 20);
        assert_eq!(config.input, "-");
        assert_eq!(config.pedestal_events, 10_000);
        assert_eq!(config.hist1.len(), 1);
        assert_eq!(config.hist1[0].bins, 256);
        assert!(config.hist2[0].y.is_none());
    }

    #[test]
    fn read_error_carries_the_path() {
        let err = SkarnConfig::load("/no/such/file.toml").unwrap_err();
        assert!(err.to_string().contains("/no/such/file.toml"));
    }
}
