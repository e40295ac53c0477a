use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message bytes: {0}")]
    Malformed(String),
}

impl From<capnp::Error> for MessageError {
    fn from(e: capnp::Error) -> Self {
        MessageError::Malformed(e.to_string())
    }
}

impl From<capnp::NotInSchema> for MessageError {
    fn from(e: capnp::NotInSchema) -> Self {
        MessageError::Malformed(e.to_string())
    }
}
