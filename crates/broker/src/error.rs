use message::MessageError;
use thiserror::Error;
use transport::TransportError;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to spawn subscriber worker thread: {0}")]
    SpawnFailed(String),
}

pub const MAX_TOPIC_LEN: usize = 4096;

pub fn validate_topic(topic: &str) -> Result<(), BrokerError> {
    if topic.is_empty() {
        return Err(BrokerError::InvalidArg("topic must not be empty".into()));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(BrokerError::InvalidArg(format!(
            "topic exceeds {MAX_TOPIC_LEN} bytes"
        )));
    }
    if topic.as_bytes().contains(&0) {
        return Err(BrokerError::InvalidArg(
            "topic must not contain a NUL byte".into(),
        ));
    }
    Ok(())
}
