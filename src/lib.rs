pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod lesson;
pub mod progress;
pub mod quiz;
pub mod server;
pub mod tutor;
pub mod user;
pub mod utils;
