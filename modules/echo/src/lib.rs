//! A minimal reference module: publishes a greeting on a timer, on its own
//! broker `Publisher`, and (if the hosting Gateway wires a subscription
//! into it) logs whatever it receives. It carries no domain logic of its
//! own — it exists purely to exercise the loader/gateway path end to end,
//! the same role `hello_world.c` plays in the original SDK: a background
//! thread that locks a stop flag, publishes, sleeps, and repeats, joined
//! on destroy.

use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use message::Message;
use module::{ModuleApis, ModuleHandle, RawMessage};
use serde::Deserialize;

fn default_greeting() -> String {
    "hello from the edge".to_string()
}

fn default_interval_ms() -> u64 {
    5000
}

#[derive(Deserialize)]
struct EchoConfig {
    address: String,
    topic: String,
    #[serde(default = "default_greeting")]
    greeting: String,
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
}

struct EchoState {
    stop: Arc<Mutex<bool>>,
    thread: Option<JoinHandle<()>>,
}

unsafe extern "C" fn echo_create(config: *const u8, config_len: usize) -> ModuleHandle {
    let bytes = std::slice::from_raw_parts(config, config_len);
    let parsed: EchoConfig = match serde_json::from_slice(bytes) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "echo module: invalid config");
            return ptr::null_mut();
        }
    };

    let publisher = match broker::Publisher::bind(&parsed.address) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, address = %parsed.address, "echo module: failed to bind publisher");
            return ptr::null_mut();
        }
    };

    let stop = Arc::new(Mutex::new(false));
    let stop_thread = Arc::clone(&stop);
    let topic = parsed.topic;
    let greeting = parsed.greeting;
    let interval = Duration::from_millis(parsed.interval_ms);

    let mut properties = HashMap::new();
    properties.insert("source".to_string(), "echo_module".to_string());

    let build = thread::Builder::new()
        .name("echo-module".into())
        .spawn(move || loop {
            {
                let stopped = stop_thread.lock().expect("echo module stop flag poisoned");
                if *stopped {
                    return;
                }
            }
            let msg = Message::create(greeting.as_bytes().to_vec(), properties.clone());
            if let Err(e) = publisher.publish(&topic, &msg, None) {
                tracing::warn!(error = %e, "echo module: publish failed");
            }
            thread::sleep(interval);
        });

    let thread = match build {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "echo module: failed to spawn thread");
            return ptr::null_mut();
        }
    };

    let state = Box::new(EchoState {
        stop,
        thread: Some(thread),
    });
    Box::into_raw(state) as ModuleHandle
}

unsafe extern "C" fn echo_destroy(handle: ModuleHandle) {
    let mut state = Box::from_raw(handle as *mut EchoState);
    *state.stop.lock().expect("echo module stop flag poisoned") = true;
    if let Some(thread) = state.thread.take() {
        let _ = thread.join();
    }
}

unsafe extern "C" fn echo_receive(_handle: ModuleHandle, message: *const RawMessage) {
    if message.is_null() {
        return;
    }
    let msg = &*message;
    let content = std::slice::from_raw_parts(msg.content, msg.content_len);
    tracing::debug!(bytes = content.len(), "echo module: received message");
}

static ECHO_APIS: ModuleApis = ModuleApis {
    create: echo_create,
    destroy: echo_destroy,
    receive: Some(echo_receive),
};

/// The well-known entry point every module shared library exports.
#[no_mangle]
pub unsafe extern "C" fn Module_GetAPIS() -> *const ModuleApis {
    &ECHO_APIS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    fn wait_until(mut pred: impl FnMut() -> bool) {
        for _ in 0..200 {
            if pred() {
                return;
            }
            thread::sleep(StdDuration::from_millis(10));
        }
        panic!("condition never became true");
    }

    #[test]
    fn publishes_greeting_until_destroyed() {
        let address = "inproc://echo-module-test-1";
        let config = serde_json::json!({
            "address": address,
            "topic": "echo",
            "greeting": "hi",
            "interval_ms": 10,
        });
        let config_bytes = serde_json::to_vec(&config).unwrap();

        let subscriber = broker::Subscriber::connect(address).unwrap();
        let received = Arc::new(AtomicUsize::new(0));
        let received_cb = Arc::clone(&received);
        subscriber
            .subscribe("echo", move |_| {
                received_cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let handle = unsafe { echo_create(config_bytes.as_ptr(), config_bytes.len()) };
        assert!(!handle.is_null());

        wait_until(|| received.load(Ordering::SeqCst) > 0);
        unsafe { echo_destroy(handle) };

        let count_after_destroy = received.load(Ordering::SeqCst);
        thread::sleep(StdDuration::from_millis(50));
        assert_eq!(received.load(Ordering::SeqCst), count_after_destroy);
    }

    #[test]
    fn create_rejects_malformed_config() {
        let bytes = b"not json";
        let handle = unsafe { echo_create(bytes.as_ptr(), bytes.len()) };
        assert!(handle.is_null());
    }

    #[test]
    fn create_defaults_greeting_and_interval_when_omitted() {
        let address = "inproc://echo-module-test-2";
        let config = serde_json::json!({ "address": address, "topic": "echo" });
        let config_bytes = serde_json::to_vec(&config).unwrap();

        let handle = unsafe { echo_create(config_bytes.as_ptr(), config_bytes.len()) };
        assert!(!handle.is_null());
        unsafe { echo_destroy(handle) };
    }
}
