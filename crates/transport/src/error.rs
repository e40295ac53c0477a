use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },
    #[error("failed to connect {address}: {reason}")]
    Connect { address: String, reason: String },
    #[error("failed to subscribe: {0}")]
    Subscribe(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("recv failed: {0}")]
    Recv(String),
    #[error("socket closed")]
    Closed,
}
