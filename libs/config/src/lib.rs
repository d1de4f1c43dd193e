//! # Spot Configuration
//!
//! Configuration loading and logging setup shared by hosts of the Spot pool
//! engine.
//!
//! ## Features
//!
//! - **Layered Loading**: built-in defaults, an optional TOML file, then
//!   `SPOT__`-prefixed environment variables
//! - **Pool Creation Settings**: asset whitelist, creation fee and fee
//!   collector consumed by `spot_amm::PoolCreationPolicy`
//! - **Logging**: `tracing-subscriber` initialisation with `EnvFilter` and
//!   optional JSON output
//!
//! ## Usage
//!
//! ```no_run
//! use spot_config::{init_tracing, SpotConfig};
//! use std::path::Path;
//!
//! let config = SpotConfig::load(Some(Path::new("config/spot.toml")))?;
//! init_tracing(&config.logging)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use logging::init_tracing;
pub use settings::{FeeCoin, LoggingConfig, PoolCreationSettings, SpotConfig};
