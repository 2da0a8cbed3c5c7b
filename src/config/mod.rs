//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! environments file (JSON/TOML)
//!     → loader.rs (parse, select environment section)
//!     → schema.rs (typed Settings, env secret overrides)
//!     → validation.rs (semantic checks)
//!     → store.rs (Config: ArcSwap<Settings>)
//!     → snapshot handed to ApiClient at construction
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new settings
//!     → atomic swap in Config
//! ```
//!
//! # Design Decisions
//! - Loading never fails: missing or invalid files degrade to defaults
//! - Settings are immutable; `update` publishes a new snapshot
//! - Environment variables come through `EnvLookup` so tests stay hermetic

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, EnvLookup, ProcessEnv, DEFAULT_CONFIG_PATH};
pub use schema::{SecretOverrides, Settings, DEFAULT_BASE_URL, DEFAULT_ENVIRONMENT};
pub use store::Config;
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
