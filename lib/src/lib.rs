#![forbid(unsafe_code)]
#![warn(clippy::dbg_macro, clippy::use_debug, clippy::todo)]

use sea_orm::DatabaseConnection;

use crate::redis::RedisConnection;

pub mod config;
pub mod redis;

#[derive(Debug, Clone)]
pub struct SharedState {
    pub db: DatabaseConnection,
    pub redis: RedisConnection,
}
