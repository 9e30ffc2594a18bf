//! # Cadence
//!
//! Recurring-task generation for a personal planner. Templates describe a
//! repeating task once (`daily`, `weekly-monday`, `monthly-15`,
//! `monthly-last`); the engine turns them into dated task instances, files
//! each instance into a planning bucket and never creates two instances of
//! the same template for the same due date.
//!
//! ```no_run
//! use cadence::{Engine, EngineConfig, JsonTaskStore, SystemClock};
//!
//! let mut store = JsonTaskStore::new("/tmp/cadence", Some("me".to_string()));
//! let report = Engine::new(EngineConfig::default()).run(&mut store, &SystemClock);
//! println!("created {} tasks", report.created());
//! ```

pub mod bucket;
pub mod clock;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod last_run;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{run_recurring_task_engine, Engine, EngineConfig, RunReport};
pub use error::{ConfigError, RuleParseError, StoreError};
pub use repository::{MemoryTaskStore, TaskRepository};
pub use storage::JsonTaskStore;
