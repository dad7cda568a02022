pub mod events;
pub mod frames;
pub mod handshake;
pub mod methods;
