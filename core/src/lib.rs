//! Loyalty and referral scheme simulator.
//!
//! Generates a synthetic customer population, scores each customer's
//! behaviour under a points scheme, and reduces the result into the
//! scheme's economics. See `engine` for the run order.

pub mod config;
pub mod economics;
pub mod engine;
pub mod error;
pub mod points;
pub mod rng;
pub mod sampler;
pub mod stats;
pub mod types;

pub use config::SchemeConfig;
pub use economics::{CustomerRecord, Ratio, SimulationSummary};
pub use engine::{run, SimEngine, SimulationResult};
pub use error::{ConfigError, SimError, SimResult};
