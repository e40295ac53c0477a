//! In-process transport backend: a global address-keyed registry of
//! channels. Used by default so the broker's test suite and local
//! development need no native pub/sub library.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::{PubSocket, SubSocket, TransportError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

static REGISTRY: OnceLock<Mutex<HashMap<String, Vec<Sender<Vec<u8>>>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Vec<Sender<Vec<u8>>>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

struct MemPub {
    address: String,
}

impl PubSocket for MemPub {
    fn send(&self, buf: Vec<u8>) -> Result<(), TransportError> {
        let map = registry().lock().expect("mem transport registry poisoned");
        if let Some(subs) = map.get(&self.address) {
            for tx in subs {
                // Best-effort: a disconnected subscriber is not this
                // publisher's problem.
                let _ = tx.send(buf.clone());
            }
        }
        Ok(())
    }
}

pub fn bind_pub(address: &str) -> Result<Arc<dyn PubSocket>, TransportError> {
    registry()
        .lock()
        .expect("mem transport registry poisoned")
        .entry(address.to_string())
        .or_default();
    tracing::debug!(address, "bound mem pub socket");
    Ok(Arc::new(MemPub {
        address: address.to_string(),
    }))
}

struct MemSub {
    prefix: Mutex<Vec<u8>>,
    receiver: Mutex<Receiver<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl SubSocket for MemSub {
    fn subscribe(&self, prefix: &[u8]) -> Result<(), TransportError> {
        *self.prefix.lock().expect("mem sub prefix poisoned") = prefix.to_vec();
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let rx = self.receiver.lock().expect("mem sub receiver poisoned");
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => {
                    let prefix = self.prefix.lock().expect("mem sub prefix poisoned");
                    if frame.starts_with(prefix.as_slice()) {
                        return Ok(frame);
                    }
                    // Doesn't match the installed prefix; drop and keep polling.
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn connect_sub(address: &str) -> Result<Arc<dyn SubSocket>, TransportError> {
    let (tx, rx) = mpsc::channel();
    registry()
        .lock()
        .expect("mem transport registry poisoned")
        .entry(address.to_string())
        .or_default()
        .push(tx);
    tracing::debug!(address, "connected mem sub socket");
    Ok(Arc::new(MemSub {
        prefix: Mutex::new(Vec::new()),
        receiver: Mutex::new(rx),
        closed: Arc::new(AtomicBool::new(false)),
    }))
}
