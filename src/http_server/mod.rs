pub mod app;
pub mod debug;
