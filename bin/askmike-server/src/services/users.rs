use askmike_types::{User, UserAttributes};

use crate::auth::Identity;
use crate::entities::UserStore;
use crate::error::ServerError;

/// Make sure the caller has a user row, touching only id and wallet address.
pub async fn ensure_user(store: &impl UserStore, identity: &Identity) -> Result<User, ServerError> {
    let attrs = UserAttributes {
        wallet_address: identity.wallet_address.clone(),
        ..UserAttributes::with_id(identity.id.clone())
    };
    Ok(store.upsert_user(attrs).await?)
}

/// Reconcile a sync payload with the authenticated caller.
///
/// The payload may omit its id (the caller's subject is used) but may not
/// name a different user. A missing wallet public key defaults to the wallet
/// address.
pub fn sync_attributes(
    identity: &Identity,
    mut attrs: UserAttributes,
) -> Result<UserAttributes, ServerError> {
    if attrs.id.is_empty() {
        attrs.id = identity.id.clone();
    } else if attrs.id != identity.id {
        return Err(ServerError::Unauthorized(
            "user id does not match token subject".into(),
        ));
    }
    if attrs.wallet_address.is_none() {
        attrs.wallet_address = identity.wallet_address.clone();
    }
    if attrs.wallet_public_key.is_none() {
        attrs.wallet_public_key = attrs.wallet_address.clone();
    }
    Ok(attrs)
}
