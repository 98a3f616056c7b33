// Authentication module
// Manages the OAuth2 token lifecycle for a single client instance

mod clock;
mod credentials;
mod exchange;
mod manager;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{ApplicationCredentials, AuthorizationGrant};
pub use manager::{TokenManager, DEFAULT_SKEW_SECS};
pub use types::{GrantType, TokenState};
