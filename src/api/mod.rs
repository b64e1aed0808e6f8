//! HTTP API module

mod handlers;
mod server;

pub use server::*;
