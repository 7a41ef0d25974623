//! PikaWorld server library.
//!
//! The `pikaworld-server` binary is a thin wrapper around [`server::router`].

pub mod server;
