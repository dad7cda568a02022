use relay_core::config::RelayConfig;
use relay_core::types::UserId;
use relay_protocol::handshake::{ConnectParams, HelloOk, ServerInfo};

const PROTOCOL_VERSION: u32 = 1;

/// Verify the bearer credential carried by `connect` (§3 Identity — the same
/// HMAC-signed token `POST /v1/auth/login` issues).
pub fn verify_auth(params: &ConnectParams, config: &RelayConfig) -> Result<UserId, String> {
    relay_users::verify_credential(&config.gateway.auth_token_secret, &params.token).map_err(|e| e.to_string())
}

/// Build the `hello-ok` response payload after successful authentication.
pub fn hello_ok_payload(user_id: &UserId) -> HelloOk {
    HelloOk {
        protocol: PROTOCOL_VERSION,
        server: ServerInfo {
            name: "relay-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        user_id: user_id.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_auth_accepts_a_token_issued_with_the_same_secret() {
        let config = RelayConfig::default();
        let user_id = UserId::new();
        let credential = relay_users::issue_credential(&config.gateway.auth_token_secret, &user_id, chrono::Duration::hours(1));

        let params = ConnectParams { token: credential.token, client_info: None };
        let verified = verify_auth(&params, &config).unwrap();
        assert_eq!(verified, user_id);
    }

    #[test]
    fn verify_auth_rejects_a_token_signed_with_a_different_secret() {
        let mut config = RelayConfig::default();
        let credential = relay_users::issue_credential("some-other-secret", &UserId::new(), chrono::Duration::hours(1));
        config.gateway.auth_token_secret = "change-me".to_string();

        let params = ConnectParams { token: credential.token, client_info: None };
        assert!(verify_auth(&params, &config).is_err());
    }

    #[test]
    fn hello_ok_payload_echoes_the_authenticated_user_id() {
        let user_id = UserId::new();
        let hello = hello_ok_payload(&user_id);
        assert_eq!(hello.protocol, PROTOCOL_VERSION);
        assert_eq!(hello.user_id, user_id.as_str());
    }
}
