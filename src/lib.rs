mod common;

pub mod classify;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod probe_engine;
pub mod report;
pub mod runtime;
pub mod settings;
pub mod threshold;

pub use common::duration::parse_duration;
pub use common::net::parse_target_url;
