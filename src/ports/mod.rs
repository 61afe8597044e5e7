pub mod discord;
pub mod spotify;
