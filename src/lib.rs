#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod config;
pub mod error;
#[cfg(feature = "client")]
pub mod exchange;
#[cfg(feature = "client")]
pub mod fetch;
#[cfg(feature = "client")]
pub mod lifecycle;
pub mod resources;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use config::ClientConfig;
pub use error::{BoxError, Error};
#[cfg(feature = "client")]
pub use exchange::{
    BEARER_TOKEN_ALIASES, DISPLAY_NAME_ALIASES, ExchangeClient, ExchangeError,
    normalize_exchange_response,
};
#[cfg(feature = "client")]
pub use fetch::{FetchedResources, ResourceFetcher};
#[cfg(feature = "client")]
pub use lifecycle::{LifecycleError, LifecyclePhase, ProviderOutcome, SessionController};
pub use resources::{
    Distance, FetchStatus, Race, RaceId, ResourceKind, ResourceLists, ResourceSlot,
};
pub use session::Session;
pub use state::{ActiveSession, SessionContainer, SessionState};
pub use store::{DEFAULT_SESSION_KEY, FileStore, KeyValueStore, MemoryStore, SessionStore};
pub use types::{BearerToken, InstallId, Record};
