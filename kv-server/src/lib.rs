//! # kv-server
//!
//! A RESP2 TCP front end for [`kv_engine::Store`]. Translation only: every
//! command maps to one facade call and back to a RESP2 reply.

pub mod protocol;
pub mod server;
