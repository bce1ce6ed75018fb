//! # Confluence Configuration
//!
//! Layered configuration loading shared by every Confluence service.
//!
//! ## Layers
//!
//! 1. Compiled defaults (`Default` impl of the target struct)
//! 2. Optional TOML/JSON file
//! 3. Environment variables with a service prefix (`CONFLUENCE_...`)
//!
//! Later layers override earlier ones field by field, so a config file only
//! needs to mention the values it changes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use confluence_config::{load_layered, resolve_config_path};
//! # #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
//! # struct EngineConfig { batch_size: usize }
//!
//! let path = resolve_config_path("CONFLUENCE_CONFIG_PATH", "configs/confluence.toml");
//! let config: EngineConfig = load_layered(path.as_deref(), "CONFLUENCE").unwrap();
//! ```

pub mod service_config;

pub use service_config::{expand_path, load_layered, resolve_config_path, ENV_SEPARATOR};
