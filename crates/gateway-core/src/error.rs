use loader::LoaderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to load module '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: LoaderError,
    },
    #[error("module '{path}' failed to create (Module_Create returned null)")]
    ModuleCreateFailed { path: String },
    #[error("failed to subscribe module '{path}' to its broker topic: {source}")]
    Subscribe {
        path: String,
        #[source]
        source: broker::BrokerError,
    },
}
