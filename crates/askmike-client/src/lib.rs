//! Client side of the Ask Mike login flow.
//!
//! [`AuthSession`] mirrors the wallet provider's auth state into a local
//! user that has been synced with the server. It is a plain state machine
//! driven by [`AuthSession::on_provider_change`], so any UI layer can own
//! one and render from [`AuthSession::state`].

pub mod error;
pub mod session;
pub mod transport;

pub use error::ClientError;
pub use session::{
    AuthState, AuthSession, ProviderSnapshot, ProviderUser, SessionUser, SyncTransport,
    WalletProvider,
};
pub use transport::HttpSyncTransport;
