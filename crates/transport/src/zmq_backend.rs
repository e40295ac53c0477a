use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::{PubSocket, SubSocket, TransportError};

const POLL_TIMEOUT_MS: i32 = 100;

struct ZmqPub {
    // libzmq sockets are documented as not thread-safe outside the actor
    // pattern, and the `zmq` crate itself does not implement `Sync` for
    // `Socket` for exactly that reason. `Publisher`/`Subscriber` are
    // `Arc`-able and their methods take `&self`, so a `Mutex` is the only
    // thing actually serializing concurrent `publish` calls onto this one
    // socket.
    sock: Mutex<zmq::Socket>,
}

impl PubSocket for ZmqPub {
    fn send(&self, buf: Vec<u8>) -> Result<(), TransportError> {
        self.sock
            .lock()
            .expect("zmq pub socket mutex poisoned")
            .send(&buf, 0)
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

pub fn bind_pub(address: &str) -> Result<Arc<dyn PubSocket>, TransportError> {
    let ctx = zmq::Context::new();
    let sock = ctx.socket(zmq::PUB).map_err(|e| TransportError::Bind {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    sock.bind(address).map_err(|e| TransportError::Bind {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    tracing::debug!(address, "bound zmq pub socket");
    Ok(Arc::new(ZmqPub {
        sock: Mutex::new(sock),
    }))
}

struct ZmqSub {
    // See `ZmqPub::sock`: the mutex is what actually makes this sound to
    // expose as `Sync`, not just a comment.
    sock: Mutex<zmq::Socket>,
    closed: Arc<AtomicBool>,
}

impl SubSocket for ZmqSub {
    fn subscribe(&self, prefix: &[u8]) -> Result<(), TransportError> {
        self.sock
            .lock()
            .expect("zmq sub socket mutex poisoned")
            .set_subscribe(prefix)
            .map_err(|e| TransportError::Subscribe(e.to_string()))
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            let result = self
                .sock
                .lock()
                .expect("zmq sub socket mutex poisoned")
                .recv_bytes(0);
            match result {
                Ok(bytes) => return Ok(bytes),
                Err(zmq::Error::EAGAIN) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "zmq recv failed");
                    return Err(TransportError::Recv(e.to_string()));
                }
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn connect_sub(address: &str) -> Result<Arc<dyn SubSocket>, TransportError> {
    let ctx = zmq::Context::new();
    let sock = ctx.socket(zmq::SUB).map_err(|e| TransportError::Connect {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    sock.connect(address).map_err(|e| TransportError::Connect {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    sock.set_rcvtimeo(POLL_TIMEOUT_MS)
        .map_err(|e| TransportError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
    tracing::debug!(address, "connected zmq sub socket");
    Ok(Arc::new(ZmqSub {
        sock: Mutex::new(sock),
        closed: Arc::new(AtomicBool::new(false)),
    }))
}
