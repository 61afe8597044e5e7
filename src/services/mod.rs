pub mod music;
pub mod spotify_auth;
pub mod token_store;
