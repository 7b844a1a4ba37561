//! Pool and driver error types.

use thiserror::Error;

/// Errors returned by `Registry::acquire`.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unknown pool: {0}")]
    UnknownPool(String),

    #[error("no idle connections in pool: {0}")]
    PoolExhausted(String),

    /// Failure to open a connection, passed through from the driver.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised by drivers when opening or pinging a connection.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error("invalid data source name: {0}")]
    InvalidDsn(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Refused(String),
}
