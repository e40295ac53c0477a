use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to load module library at {path}: {source}")]
    LoadFailed {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("module library at {path} is missing the {symbol} entry point, or it returned null")]
    SymbolMissing { path: String, symbol: String },
}
