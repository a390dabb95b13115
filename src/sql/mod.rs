pub mod builder;
pub mod engine;
pub mod execution;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
