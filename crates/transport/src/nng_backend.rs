use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nng::options::protocol::pubsub::Subscribe;
use nng::options::{Options, RecvTimeout};
use nng::{Message as NngMessage, Protocol, Socket};

use crate::{PubSocket, SubSocket, TransportError};

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

struct NngPub {
    sock: Socket,
}

impl PubSocket for NngPub {
    fn send(&self, buf: Vec<u8>) -> Result<(), TransportError> {
        let msg = NngMessage::from(buf.as_slice());
        self.sock
            .send(msg)
            .map_err(|(_msg, e)| TransportError::Send(e.to_string()))
    }
}

pub fn bind_pub(address: &str) -> Result<Arc<dyn PubSocket>, TransportError> {
    let sock = Socket::new(Protocol::Pub0).map_err(|e| TransportError::Bind {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    sock.listen(address).map_err(|e| TransportError::Bind {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    tracing::debug!(address, "bound nng pub socket");
    Ok(Arc::new(NngPub { sock }))
}

struct NngSub {
    sock: Socket,
    closed: Arc<AtomicBool>,
}

impl SubSocket for NngSub {
    fn subscribe(&self, prefix: &[u8]) -> Result<(), TransportError> {
        self.sock
            .set_opt::<Subscribe>(prefix.to_vec())
            .map_err(|e| TransportError::Subscribe(e.to_string()))
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            match self.sock.recv() {
                Ok(msg) => return Ok(msg.as_slice().to_vec()),
                Err(nng::Error::TimedOut) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "nng recv failed");
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
    let sock = Socket::new(Protocol::Sub0).map_err(|e| TransportError::Connect {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    sock.dial(address).map_err(|e| TransportError::Connect {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    sock.set_opt::<RecvTimeout>(Some(POLL_TIMEOUT))
        .map_err(|e| TransportError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
    tracing::debug!(address, "connected nng sub socket");
    Ok(Arc::new(NngSub {
        sock,
        closed: Arc::new(AtomicBool::new(false)),
    }))
}
