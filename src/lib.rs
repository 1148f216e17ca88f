pub mod app;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod lock;
pub mod player;
pub mod shortcuts;
pub mod telemetry;
pub mod timer;
