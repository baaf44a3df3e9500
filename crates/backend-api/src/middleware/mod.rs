//! Middleware modules

pub mod client;
