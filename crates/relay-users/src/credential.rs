use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, UserError};
use crate::types::Credential;
use relay_core::types::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Opaque bearer credential embedding the user id and an absolute expiry
/// (§3). Same HMAC-over-a-colon-joined-message shape
/// `relay-uploads::credential` uses for presigned upload URLs, applied here
/// to authenticate real-time connections and HTTP requests instead of
/// object-store writes.
pub fn issue(secret: &str, user_id: &UserId, ttl: Duration) -> Credential {
    let expires_at = Utc::now() + ttl;
    let sig = sign(secret, user_id.as_str(), expires_at);
    let token = format!("{}.{}.{}", user_id.as_str(), expires_at.timestamp(), sig);
    Credential { token, user_id: user_id.clone(), expires_at }
}

/// Verify a bearer token previously issued by [`issue`], rejecting it if
/// the signature doesn't match or the expiry has passed.
pub fn verify(secret: &str, token: &str) -> Result<UserId> {
    let mut parts = token.splitn(3, '.');
    let (Some(user_id), Some(expires_epoch), Some(sig)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(UserError::InvalidCredential);
    };

    let expires_epoch: i64 = expires_epoch.parse().map_err(|_| UserError::InvalidCredential)?;
    let expires_at = DateTime::from_timestamp(expires_epoch, 0).ok_or(UserError::InvalidCredential)?;

    let expected = sign(secret, user_id, expires_at);
    if expected.len() != sig.len() || expected != sig {
        return Err(UserError::InvalidCredential);
    }
    if expires_at < Utc::now() {
        return Err(UserError::InvalidCredential);
    }

    Ok(UserId::from(user_id))
}

fn sign(secret: &str, user_id: &str, expires_at: DateTime<Utc>) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(user_id.as_bytes());
    mac.update(b":");
    mac.update(expires_at.timestamp().to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_credential_verifies() {
        let user_id = UserId::new();
        let cred = issue("secret", &user_id, Duration::hours(1));
        let verified = verify("secret", &cred.token).unwrap();
        assert_eq!(verified, user_id);
    }

    #[test]
    fn expired_credential_is_rejected() {
        let user_id = UserId::new();
        let cred = issue("secret", &user_id, Duration::seconds(-1));
        let err = verify("secret", &cred.token).unwrap_err();
        assert!(matches!(err, UserError::InvalidCredential));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let user_id = UserId::new();
        let cred = issue("secret", &user_id, Duration::hours(1));
        let tampered = cred.token.replace(user_id.as_str(), "someone-else");
        let err = verify("secret", &tampered).unwrap_err();
        assert!(matches!(err, UserError::InvalidCredential));
    }
}
