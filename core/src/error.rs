use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedRate(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
