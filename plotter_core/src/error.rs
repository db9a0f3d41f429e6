use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlotterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout waiting for device response")]
    Timeout,
    #[error("device rejected {command}: {response}")]
    Device {
        command: &'static str,
        response: String,
    },
    #[error("malformed {command} response: {response:?}")]
    Protocol {
        command: &'static str,
        response: String,
    },
    #[error("motors still busy after {waited_ms} ms (idle wait timed out)")]
    IdleTimeout { waited_ms: u64 },
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("drawing interrupted before path {index}")]
    Interrupted { index: usize },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
