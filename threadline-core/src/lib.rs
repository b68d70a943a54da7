//! Core library for Threadline.
//!
//! This crate provides the entity models, record stores and the entity graph
//! engine for Threadline, independent of any front end (CLI, MCP, etc.).
//!
//! # Usage
//!
//! ```no_run
//! use threadline_core::models::*;
//! use threadline_core::{Database, Engine, Filter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let mut engine = Engine::new(db);
//! engine.load_all().await?;
//! let user = engine.ensure_user("me").await?;
//! let persona = engine.add(Persona::new(&user.id, "Engineer")).await?;
//! engine.fetch::<Problem>(Filter::eq("persona_id", persona.id.as_str())).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod graph;
pub mod models;
pub mod preferences;
pub mod session;
pub mod store;

// Re-export commonly used types at crate root
pub use cache::{EntityCache, MergeStats};
pub use config::Config;
pub use db::Database;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use preferences::Preferences;
pub use session::{Clock, ManualClock, SessionTimer, SystemClock};
pub use store::{Filter, MemoryStore, Record, RecordStore};
