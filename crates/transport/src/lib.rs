//! Thin abstraction over a datagram pub/sub socket, exposing exactly the
//! operations the broker needs: bind/connect, byte-prefix subscribe, send an
//! owned frame, receive an owned frame, and close.
//!
//! Three mutually exclusive backends are selected by Cargo feature, same
//! precedence rule throughout: `with-nng` wins over `with-zmq`, and the
//! default (no feature) in-process backend is used otherwise. The default
//! backend requires no native sockets and is what the broker's own test
//! suite runs against.

mod error;
mod mem;

#[cfg(feature = "with-nng")]
mod nng_backend;

#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
mod zmq_backend;

pub use error::TransportError;

use std::sync::Arc;

/// A bound publish endpoint. Implementations take ownership of the frame
/// buffer they are handed; no copy is required on this side of the trait.
pub trait PubSocket: Send + Sync {
    fn send(&self, buf: Vec<u8>) -> Result<(), TransportError>;
}

/// A connected subscribe endpoint. `subscribe` installs a byte-prefix
/// filter; `recv` blocks until a frame matching some installed prefix
/// arrives, the socket is closed, or a transient transport error occurs.
pub trait SubSocket: Send + Sync {
    fn subscribe(&self, prefix: &[u8]) -> Result<(), TransportError>;
    fn recv(&self) -> Result<Vec<u8>, TransportError>;
    fn close(&self);
}

pub fn bind_pub(address: &str) -> Result<Arc<dyn PubSocket>, TransportError> {
    #[cfg(feature = "with-nng")]
    {
        return nng_backend::bind_pub(address);
    }
    #[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
    {
        return zmq_backend::bind_pub(address);
    }
    #[cfg(not(any(feature = "with-nng", feature = "with-zmq")))]
    {
        return mem::bind_pub(address);
    }
}

pub fn connect_sub(address: &str) -> Result<Arc<dyn SubSocket>, TransportError> {
    #[cfg(feature = "with-nng")]
    {
        return nng_backend::connect_sub(address);
    }
    #[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
    {
        return zmq_backend::connect_sub(address);
    }
    #[cfg(not(any(feature = "with-nng", feature = "with-zmq")))]
    {
        return mem::connect_sub(address);
    }
}
