use marketplace_engine::MarketplaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the worker. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend. {0}")]
    BackendError(#[from] MarketplaceError),
    #[error("The reconciliation task stopped unexpectedly. {0}")]
    TaskFailed(String),
    #[error("An I/O error happened in the worker. {0}")]
    IOError(#[from] std::io::Error),
}
