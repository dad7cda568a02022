// Verify wire format matches what the web client and channel bridges expect.
// These tests ensure protocol compatibility is never broken by a refactor.

use relay_protocol::frames::{EventFrame, InboundFrame, ResFrame};
use relay_protocol::handshake::{ConnectParams, HelloOk, ServerInfo};
use relay_protocol::methods;

#[test]
fn req_frame_round_trip() {
    let json = r#"{"type":"req","id":"abc-123","method":"chat:send","params":{"text":"hello"}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert_eq!(frame.frame_type, "req");

    let req = frame.as_req().unwrap();
    assert_eq!(req.method, methods::CHAT_SEND);
    assert_eq!(req.id, "abc-123");
}

#[test]
fn res_ok_serialization() {
    let res = ResFrame::ok("req-1", serde_json::json!({"pong": true}));
    let json = serde_json::to_string(&res).unwrap();

    assert!(json.contains(r#""type":"res""#));
    assert!(json.contains(r#""ok":true"#));
    assert!(json.contains(r#""pong":true"#));
    // error field must be absent on success
    assert!(!json.contains(r#""error""#));
}

#[test]
fn res_err_serialization() {
    let res = ResFrame::err("req-2", "AUTH_INVALID", "bad token");
    let json = serde_json::to_string(&res).unwrap();

    assert!(json.contains(r#""ok":false"#));
    assert!(json.contains(r#""AUTH_INVALID""#));
    // payload must be absent on error
    assert!(!json.contains(r#""payload""#));
}

#[test]
fn event_frame_shape() {
    let ev = EventFrame::new(
        methods::CHAT_DELIVERY,
        serde_json::json!({"messageId": "m1", "status": "read"}),
    );
    let json = serde_json::to_string(&ev).unwrap();

    assert!(json.contains(r#""type":"event""#));
    assert!(json.contains(r#""event":"chat:delivery""#));
    assert!(json.contains(r#""status":"read""#));
}

#[test]
fn connect_params_carries_bearer_token() {
    let json = r#"{"token":"secret-123"}"#;
    let params: ConnectParams = serde_json::from_str(json).unwrap();
    assert_eq!(params.token, "secret-123");
}

#[test]
fn hello_ok_protocol_version() {
    let hello = HelloOk {
        protocol: 1,
        server: ServerInfo {
            name: "relay".into(),
            version: "0.1.0".into(),
        },
        user_id: "u1".into(),
    };
    let json = serde_json::to_string(&hello).unwrap();
    assert!(json.contains(r#""protocol":1"#));
}

#[test]
fn inbound_frame_rejects_non_req() {
    let json = r#"{"type":"event","event":"chat:new-message","payload":{}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert!(frame.as_req().is_none(), "event frame must not parse as req");
}
