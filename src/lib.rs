//! Library exports for the content shortener
//!
//! Every component is public so the integration tests can assemble the
//! router against a temporary embedded store.

pub mod code;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod hosted;
pub mod middleware;
pub mod model;
pub mod password;
pub mod render;
pub mod route;
pub mod session;
pub mod state;
pub mod store;
pub mod upload;
