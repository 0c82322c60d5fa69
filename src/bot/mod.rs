//! The chat-network side: transport, command handling and connection state.

pub mod bridge;
pub mod commands;
pub mod connector;
pub mod lifecycle;
pub mod qr;
pub mod reply;
pub mod status;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::BotConnector;
pub use lifecycle::Bot;
