//! OAuth authorization-code flow, refresh scheduling and token storage.

pub mod acquirer;
pub mod cached;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod manager;
pub mod store;
pub mod timer;
pub mod token;

pub use acquirer::{StorageOption, TokenAcquirer};
pub use cached::CachedTokenManager;
pub use credentials::{Credentials, RefreshSchedule};
pub use error::AuthError;
pub use gate::{CompletionGate, GateOutcome};
pub use manager::{ManagerConfig, ManagerState, TokenManager, DEFAULT_TOKEN_URL};
pub use store::{FileTokenStore, TokenStore, TokenStoreConfig};
pub use timer::{RefreshTimer, TimerState};
pub use token::{TokenPair, TokenResponse};
