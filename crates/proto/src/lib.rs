//! Generated Cap'n Proto bindings for the message wire schema.
//!
//! `build.rs` compiles `schema/message.capnp` into `OUT_DIR`; this module
//! just makes the generated module visible under a stable name so callers
//! write `proto::message_capnp::payload::Builder` instead of reaching into
//! `OUT_DIR` themselves.

#![allow(clippy::all)]

pub mod message_capnp {
    include!(concat!(env!("OUT_DIR"), "/message_capnp.rs"));
}
