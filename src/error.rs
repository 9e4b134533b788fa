use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Data load error: {0}")]
    DataLoad(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Journal error: {0}")]
    Journal(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl ContractError {
    /// Fatal errors only happen while starting up or reloading and should abort.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DataLoad(_) | Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, ContractError>;

// Helper conversions
impl From<config::ConfigError> for ContractError {
    fn from(e: config::ConfigError) -> Self { Self::Configuration(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for ContractError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
