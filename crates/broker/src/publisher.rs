use message::Message;
use transport::{self, PubSocket};

use crate::error::{validate_topic, BrokerError};
use std::sync::Arc;

/// A bound publish endpoint. Dropping it closes the underlying transport
/// socket; there is no separate destroy call.
pub struct Publisher {
    sock: Arc<dyn PubSocket>,
}

impl Publisher {
    pub fn bind(address: &str) -> Result<Publisher, BrokerError> {
        let sock = transport::bind_pub(address)?;
        Ok(Publisher { sock })
    }

    /// Publish `msg` under `topic`. `hint_size`, when given, must equal the
    /// serialized message length; it is validated, not trusted, since
    /// `Message::to_bytes` always allocates the correctly sized buffer
    /// itself and a second pass to "query" the size is unnecessary.
    pub fn publish(
        &self,
        topic: &str,
        msg: &Message,
        hint_size: Option<usize>,
    ) -> Result<(), BrokerError> {
        validate_topic(topic)?;

        let payload = msg.to_bytes();
        if let Some(hint) = hint_size {
            if hint != payload.len() {
                return Err(BrokerError::InvalidArg(format!(
                    "hint_size {hint} does not match serialized length {}",
                    payload.len()
                )));
            }
        }

        let mut frame = Vec::with_capacity(topic.len() + 1 + payload.len());
        frame.extend_from_slice(topic.as_bytes());
        frame.push(0);
        frame.extend_from_slice(&payload);

        self.sock.send(frame)?;
        Ok(())
    }
}
