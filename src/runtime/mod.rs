//! Runtime cache and event application.
//!
//! [`State`] is the process-wide registry: it owns every cached entity,
//! resolves references for the hydration engine and applies gateway dispatch
//! events to the cache. [`Handlers`] run callbacks after each applied event.

pub mod config;
pub mod events;
pub mod handlers;
pub mod state;

// Re-export key types
pub use config::{CacheConfig, ConfigError};
pub use events::Event;
pub use handlers::{Dispatch, Handlers};
pub use state::{CacheSummary, ChannelEntry, GuildEntry, State};
