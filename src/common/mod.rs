//! Common utilities and types shared across clustertopo

pub mod config;
pub mod error;
pub mod telemetry;
pub mod utils;

pub use config::{Config, HeartbeatConfig, StoreBackend, StoreConfig};
pub use error::{Error, Result};
pub use telemetry::init_tracing;
pub use utils::{decode_segment, encode_segment, parse_duration, parse_timestamp, split_endpoint};
