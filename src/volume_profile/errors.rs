use rust_decimal::Decimal;
use thiserror::Error;

use super::precision::PrecisionError;

#[derive(Error, Debug)]
pub enum VolumeProfileError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Value area percentage must be in (0, 100], got {0}")]
    InvalidPercentage(Decimal),
    #[error("Tick size must be positive, got {0}")]
    InvalidTickSize(Decimal),
    #[error("Expansion step must be at least 1")]
    InvalidExpansionStep,
    #[error("Precision error: {0}")]
    Precision(#[from] PrecisionError),
    #[error("Bar {bar} arrived out of order (last bar {last})")]
    OutOfOrderBar { bar: usize, last: usize },
    #[error("Bar {0} replayed after history was marked loaded")]
    ReplayAfterHistoryLoaded(usize),
    #[error("Live bar {0} opened before history was marked loaded")]
    HistoryNotLoaded(usize),
    #[error("No active period")]
    NoActivePeriod,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
