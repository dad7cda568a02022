//! HTTP handler modules (§6), one per resource, each a thin adapter over a
//! domain crate — grounded on the teacher's `http/` layout (one file per
//! surface: `chat.rs`, `notifications.rs`, `ui.rs`, ...).

pub mod auth;
pub mod calendar;
pub mod custom_bots;
pub mod handovers;
pub mod health;
pub mod messages;
pub mod nlu;
pub mod omni;
pub mod uploads;
pub mod webhooks;
