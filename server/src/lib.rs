pub extern crate actix_web;

pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod handlers;
mod persistence;
mod presence;
mod room_registry;
pub mod server;
mod session;
pub mod store;
