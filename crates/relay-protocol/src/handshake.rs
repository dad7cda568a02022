use serde::{Deserialize, Serialize};

/// Client → Server: the first request on every connection, carrying the
/// bearer credential minted by `POST /auth/login` (§3 Identity).
/// Sent as: `REQ connect { token: "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    pub token: String,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
}

/// Server → Client: successful auth response payload.
/// Sent as: `RES hello-ok { protocol: 1, server: {...}, user_id: "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloOk {
    pub protocol: u32,
    pub server: ServerInfo,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}
