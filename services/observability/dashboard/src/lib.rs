//! # Confluence Dashboard
//!
//! ## Purpose
//!
//! Bridges a running [`ConfluenceEngine`](confluence_strategy::ConfluenceEngine)
//! to browsers: engine events go out over a WebSocket as JSON frames and the
//! operational mode is switched over HTTP.
//!
//! ## Integration Points
//!
//! - **Input**: the engine's event subscription and its control surface
//! - **Output**: `/ws` frames, `/api/*` JSON replies
//!
//! ## Architecture Role
//!
//! ```text
//! ConfluenceEngine ─► forwarder ─► ClientManager ─► WebSocket clients
//!        ▲
//!        └──────────── /api/start, /api/stop
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod server;

pub use client::{Client, ClientManager, Frame};
pub use config::DashboardConfig;
pub use error::{DashboardError, Result};
pub use server::DashboardServer;
