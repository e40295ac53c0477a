use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use message::Message;
use transport::{self, SubSocket, TransportError};

use crate::error::{validate_topic, BrokerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connected,
    Running,
    Stopping,
    Stopped,
}

struct Worker {
    handle: JoinHandle<()>,
}

/// A connected subscribe endpoint. `subscribe` spawns one dedicated worker
/// thread that delivers matching messages to the given callback; dropping
/// or calling `unsubscribe` stops it and blocks until it has joined.
pub struct Subscriber {
    sock: Arc<dyn SubSocket>,
    state: Mutex<State>,
    worker: Mutex<Option<Worker>>,
}

impl Subscriber {
    pub fn connect(address: &str) -> Result<Arc<Subscriber>, BrokerError> {
        let sock = transport::connect_sub(address)?;
        Ok(Arc::new(Subscriber {
            sock,
            state: Mutex::new(State::Connected),
            worker: Mutex::new(None),
        }))
    }

    /// Install `topic` as the subscription's byte-prefix filter and start
    /// delivering matching messages to `on_message` on a dedicated thread.
    /// Matching is an exact prefix of the topic bytes on the wire, not
    /// component-aware: a subscription to `"foo"` also matches `"foobar"`.
    pub fn subscribe<F>(self: &Arc<Self>, topic: &str, on_message: F) -> Result<(), BrokerError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        validate_topic(topic)?;
        {
            let mut state = self.state.lock().expect("subscriber state poisoned");
            if *state != State::Connected {
                return Err(BrokerError::InvalidArg(
                    "subscriber is already subscribed".into(),
                ));
            }
            self.sock.subscribe(topic.as_bytes())?;

            let sock = Arc::clone(&self.sock);
            let this = Arc::clone(self);
            let build = thread::Builder::new()
                .name("broker-subscriber".into())
                .spawn(move || Self::run(this, sock, on_message));
            let handle = match build {
                Ok(h) => h,
                Err(e) => return Err(BrokerError::SpawnFailed(e.to_string())),
            };

            *self.worker.lock().expect("subscriber worker poisoned") =
                Some(Worker { handle });
            *state = State::Running;
        }
        Ok(())
    }

    fn run<F>(this: Arc<Subscriber>, sock: Arc<dyn SubSocket>, on_message: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        loop {
            {
                let state = this.state.lock().expect("subscriber state poisoned");
                if *state != State::Running {
                    return;
                }
            }
            match sock.recv() {
                Ok(frame) => {
                    let sep = match frame.iter().position(|&b| b == 0) {
                        Some(pos) => pos,
                        None => {
                            tracing::warn!("dropping frame with no topic separator");
                            continue;
                        }
                    };
                    let payload = &frame[sep + 1..];
                    match Message::from_bytes(payload) {
                        Ok(msg) => on_message(msg),
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping malformed message frame");
                        }
                    }
                }
                Err(TransportError::Closed) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "transient receive error, retrying");
                }
            }
        }
    }

    /// Stop delivering messages and block until the worker thread has
    /// joined. A no-op if called while `Connected` or already `Stopped`.
    pub fn unsubscribe(&self) {
        let worker = {
            let mut state = self.state.lock().expect("subscriber state poisoned");
            if *state != State::Running {
                return;
            }
            *state = State::Stopping;
            self.worker.lock().expect("subscriber worker poisoned").take()
        };

        // Closing the socket directly is what actually unblocks a worker
        // thread parked in a blocking recv; waiting for it to notice the
        // state flag on its own would deadlock until the next native
        // receive timeout, or forever on a backend with none.
        self.sock.close();

        if let Some(worker) = worker {
            let _ = worker.handle.join();
        }

        *self.state.lock().expect("subscriber state poisoned") = State::Stopped;
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Publisher;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use transport::PubSocket;

    fn wait_until(mut pred: impl FnMut() -> bool) {
        for _ in 0..200 {
            if pred() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition never became true");
    }

    #[test]
    fn delivers_matching_messages_in_order() {
        let address = "inproc://broker-subscriber-test-1";
        let publisher = Publisher::bind(address).unwrap();
        let subscriber = Subscriber::connect(address).unwrap();

        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let received_cb = Arc::clone(&received);
        subscriber
            .subscribe("x", move |m| {
                received_cb
                    .lock()
                    .unwrap()
                    .push(String::from_utf8(m.content().to_vec()).unwrap());
            })
            .unwrap();

        let m1 = Message::create(b"one".to_vec(), HashMap::new());
        let m2 = Message::create(b"two".to_vec(), HashMap::new());
        let off_topic = Message::create(b"nope".to_vec(), HashMap::new());

        publisher.publish("x.a", &m1, None).unwrap();
        publisher.publish("y.a", &off_topic, None).unwrap();
        publisher.publish("x.b", &m2, None).unwrap();

        wait_until(|| received.lock().unwrap().len() == 2);
        assert_eq!(*received.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let address = "inproc://broker-subscriber-test-2";
        let publisher = Publisher::bind(address).unwrap();
        let subscriber = Subscriber::connect(address).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = Arc::clone(&count);
        subscriber
            .subscribe("x", move |_| {
                count_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let m = Message::create(b"one".to_vec(), HashMap::new());
        publisher.publish("x.a", &m, None).unwrap();
        wait_until(|| count.load(Ordering::SeqCst) == 1);

        subscriber.unsubscribe();

        let m2 = Message::create(b"two".to_vec(), HashMap::new());
        publisher.publish("x.b", &m2, None).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_frame_is_dropped_and_later_valid_frames_still_deliver() {
        let address = "inproc://broker-subscriber-test-3";
        // A raw transport publisher, used only to inject a hand-built
        // malformed frame the `Publisher` API can't produce on its own;
        // the in-process backend fans a send out to every subscriber
        // connected to the same address regardless of which pub socket
        // sent it.
        let raw_pub = transport::bind_pub(address).unwrap();
        let publisher = Publisher::bind(address).unwrap();
        let subscriber = Subscriber::connect(address).unwrap();

        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let received_cb = Arc::clone(&received);
        subscriber
            .subscribe("x", move |m| {
                received_cb
                    .lock()
                    .unwrap()
                    .push(String::from_utf8(m.content().to_vec()).unwrap());
            })
            .unwrap();

        // Truncated payload bytes after the topic's NUL terminator: not a
        // valid Cap'n Proto message, so `Message::from_bytes` must fail.
        let mut malformed = b"x.bad\0".to_vec();
        malformed.extend_from_slice(&[0xff, 0x00, 0x01]);
        raw_pub.send(malformed).unwrap();

        let good = Message::create(b"ok".to_vec(), HashMap::new());
        publisher.publish("x.good", &good, None).unwrap();

        wait_until(|| received.lock().unwrap().len() == 1);
        assert_eq!(*received.lock().unwrap(), vec!["ok"]);
    }
}
