pub mod access;
pub mod config;
pub mod database;
pub mod error;
pub mod sql;
pub mod storage;

pub use access::Caller;
pub use config::Config;
pub use database::{Database, ExecuteResult};
