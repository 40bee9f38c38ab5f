pub mod compactor;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod model;
pub mod observability;
pub mod validate;
pub mod wal;
