pub mod config;

pub use config::{
    AnnularConfig, ClockMatchConfig, ConfigError, Hist1Config, Hist2Config, SkarnConfig,
};
