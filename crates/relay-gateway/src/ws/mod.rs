//! Real-time WS surface (§6): one connection task per client, authenticated
//! via `connect`, then dispatched through the Presence & Subscription
//! Registry. Grounded on the teacher's `ws/` layout.

pub mod connection;
pub mod dispatch;
pub mod handshake;
