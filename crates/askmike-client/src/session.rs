//! Auth session state machine.
//!
//! ```text
//! Initializing ──ready──▶ Unauthenticated ──authenticated──▶ Syncing ──▶ Synced
//!      ▲                         ▲                                         │
//!      └────── not ready ────────┴──────────── signed out / logout ────────┘
//! ```
//!
//! Every transition is also published on a watch channel, so a UI holding
//! a [`AuthSession::subscribe`] receiver sees `Syncing` while the server
//! round trip is still in flight.

use askmike_types::{User, UserAttributes};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// The user as the wallet provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    /// Provider subject (a DID).
    pub id: String,
    pub email: Option<String>,
    /// Linked wallet addresses; the first one is the primary wallet.
    pub wallets: Vec<String>,
}

/// Everything the session reacts to, read from the provider on each change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSnapshot {
    pub ready: bool,
    pub authenticated: bool,
    pub user: Option<ProviderUser>,
}

/// The locally held user once a sync has been attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_public_key: Option<String>,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            wallet_address: user.wallet_address,
            wallet_public_key: user.wallet_public_key,
        }
    }
}

impl From<&UserAttributes> for SessionUser {
    fn from(attrs: &UserAttributes) -> Self {
        Self {
            id: attrs.id.clone(),
            email: attrs.email.clone(),
            wallet_address: attrs.wallet_address.clone(),
            wallet_public_key: attrs.wallet_public_key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The provider has not finished loading.
    Initializing,
    Unauthenticated,
    /// Authenticated with the provider; the server sync is in flight.
    Syncing,
    Synced(SessionUser),
}

/// Access to the wallet auth provider.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
}

/// Sends user attributes to the server's sync endpoint.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn sync(&self, token: &str, attrs: &UserAttributes) -> Result<User, ClientError>;
}

/// The `(ready, authenticated, user id)` triple a change is compared on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeKey {
    ready: bool,
    authenticated: bool,
    user_id: Option<String>,
}

impl From<&ProviderSnapshot> for ChangeKey {
    fn from(s: &ProviderSnapshot) -> Self {
        Self {
            ready: s.ready,
            authenticated: s.authenticated,
            user_id: s.user.as_ref().map(|u| u.id.clone()),
        }
    }
}

/// The last payload sent to the server and the user it produced.
#[derive(Debug)]
struct LastSync {
    payload: String,
    user: SessionUser,
}

pub struct AuthSession<P, T> {
    provider: P,
    transport: T,
    state: AuthState,
    state_tx: watch::Sender<AuthState>,
    last_change: Option<ChangeKey>,
    last_sync: Option<LastSync>,
}

impl<P: WalletProvider, T: SyncTransport> AuthSession<P, T> {
    pub fn new(provider: P, transport: T) -> Self {
        Self {
            provider,
            transport,
            state: AuthState::Initializing,
            state_tx: watch::Sender::new(AuthState::Initializing),
            last_change: None,
            last_sync: None,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Receiver that observes every state transition, including the ones
    /// made while [`Self::on_provider_change`] is still awaiting the sync.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn set_state(&mut self, state: AuthState) {
        self.state_tx.send_replace(state.clone());
        self.state = state;
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match &self.state {
            AuthState::Synced(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, AuthState::Initializing | AuthState::Syncing)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// React to a provider change. Snapshots with the same readiness,
    /// authentication and user id as the previous one are ignored.
    pub async fn on_provider_change(&mut self, snapshot: ProviderSnapshot) -> &AuthState {
        let key = ChangeKey::from(&snapshot);
        if self.last_change.as_ref() == Some(&key) {
            return &self.state;
        }
        debug!(?key, "provider state changed");
        self.last_change = Some(key);

        if !snapshot.ready {
            self.set_state(AuthState::Initializing);
            return &self.state;
        }

        match snapshot.user {
            Some(user) if snapshot.authenticated => {
                let candidate = to_attributes(&user);
                self.set_state(AuthState::Syncing);
                let synced = self.sync(candidate).await;
                self.set_state(AuthState::Synced(synced));
            }
            _ => {
                debug!("not authenticated; clearing local user");
                self.set_state(AuthState::Unauthenticated);
            }
        }
        &self.state
    }

    /// Sync `candidate` unless the same payload was already sent. Failures
    /// fall back to the candidate itself.
    async fn sync(&mut self, candidate: UserAttributes) -> SessionUser {
        let payload = serde_json::to_string(&candidate).ok();
        if let (Some(payload), Some(last)) = (&payload, &self.last_sync) {
            if *payload == last.payload {
                debug!(user_id = %candidate.id, "duplicate sync skipped");
                return last.user.clone();
            }
        }

        let result = match self.provider.access_token().await {
            Ok(token) => self.transport.sync(&token, &candidate).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(user) => {
                let user = SessionUser::from(user);
                info!(user_id = %user.id, "user synced");
                self.last_sync = payload.map(|payload| LastSync {
                    payload,
                    user: user.clone(),
                });
                user
            }
            Err(e) => {
                warn!(user_id = %candidate.id, error = %e, "user sync failed; using provider data");
                self.last_sync = None;
                SessionUser::from(&candidate)
            }
        }
    }

    /// Clear the local user, then sign out of the provider. Provider
    /// failures are logged and otherwise ignored.
    pub async fn logout(&mut self) {
        self.set_state(AuthState::Unauthenticated);
        self.last_sync = None;
        if let Err(e) = self.provider.logout().await {
            warn!(error = %e, "provider logout failed");
        } else {
            info!("logged out");
        }
    }
}

/// Sync payload for a provider user: the first wallet is the primary one
/// and doubles as the wallet public key.
pub fn to_attributes(user: &ProviderUser) -> UserAttributes {
    let wallet = user.wallets.first().cloned();
    UserAttributes {
        email: user.email.clone(),
        wallet_public_key: wallet.clone(),
        wallet_address: wallet,
        ..UserAttributes::with_id(user.id.clone())
    }
}
