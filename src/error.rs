use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::confidence::ThresholdError;
use crate::driver::DriverError;
use crate::storage::StorageError;
use crate::strategy::StrategyConfigError;
use crate::telemetry::TelemetryError;

/// Aggregate error type for callers that cross module boundaries.
///
/// Individual modules return their own `thiserror` enums; this type exists
/// at the crate boundary the way `vvtv_core::error::ConfigError` sits above
/// `BrowserError`/`PlanError` in the teacher crate.
#[derive(Debug, Error)]
pub enum SelectorCoreError {
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Threshold(#[from] ThresholdError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    StrategyConfig(#[from] StrategyConfigError),
}

pub type Result<T> = std::result::Result<T, SelectorCoreError>;
