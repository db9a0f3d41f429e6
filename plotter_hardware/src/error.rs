use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial error: {0}")]
    Serial(String),
    #[error("no plotter found on any serial port")]
    NotFound,
    #[error("serial read timeout")]
    Timeout,
    #[error("device disconnected")]
    Disconnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
