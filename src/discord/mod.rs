pub mod actions;
pub mod channel;
pub mod client;
pub mod interactions;
pub mod message;
