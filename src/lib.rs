pub mod analysis;
pub mod config;
pub mod http;
pub mod mcp;
pub mod photo;
pub mod provider;
pub mod query;
pub mod ratelimit;
pub mod server;
pub mod tools;
