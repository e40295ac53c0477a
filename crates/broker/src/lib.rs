mod error;
mod publisher;
mod subscriber;

pub use error::BrokerError;
pub use publisher::Publisher;
pub use subscriber::Subscriber;
