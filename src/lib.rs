//! # Hookflow
//!
//! Hookflow runs node-and-edge workflows in response to external triggers:
//! HTTP webhooks, chat messages and form submissions.
//!
//! ## Core Features
//!
//! - **Trigger Registry**: cached `(kind, id)` lookup that rejects unknown triggers before any workflow is loaded
//! - **Execution Engine**: walks a workflow graph from its trigger node with join semantics and a replayable event log
//! - **Node Sandbox**: runs user JavaScript in QuickJS with only the injected capabilities
//! - **Pluggable Storage**: in-memory storage (testing) and PostgreSQL (production)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookflow::{Config, EngineBuilder, server};
//!
//! let engine = Arc::new(EngineBuilder::new().config(Config::create("hookflow.toml")?).build()?);
//! engine.deploy(&WorkflowModel::from_json(json_str)?)?;
//! server::serve(engine).await?;
//! ```

mod builder;
mod common;
mod config;
pub mod dispatch;
mod engine;
mod error;
pub mod events;
pub mod gateway;
pub mod loader;
mod model;
pub mod registry;
pub mod runtime;
pub mod server;
pub mod store;
mod utils;
pub mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::{EngineBuilder, build_runtime};
pub use config::*;
pub use engine::{CallRecord, Engine, ExecutionMode, ExecutionRecord, ExecutionStatus};
pub use error::HookflowError;
pub use model::*;

/// Result type alias for Hookflow operations.
pub type Result<T> = std::result::Result<T, HookflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
