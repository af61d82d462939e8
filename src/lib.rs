#![allow(clippy::result_large_err)]

pub mod alert;
pub mod checkpoint;
pub mod confidence;
pub mod config;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod resolution;
mod sqlite;
pub mod storage;
pub mod strategy;
pub mod tab_context;
pub mod telemetry;
pub mod validation;

pub use alert::{
    AlertCategory, AlertEngine, AlertError, AlertNotification, AlertSeverity, LogSink,
    MetricSnapshot, NotificationSink,
};
pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointMetadata, CheckpointResult, CheckpointState,
    CheckpointType, CompressionKind, CorruptionReport, CorruptionSeverity, CorruptionType,
    CURRENT_SCHEMA_VERSION,
};
pub use confidence::{
    PerformanceSnapshot, ThresholdChange, ThresholdError, ThresholdManager, ThresholdViolation,
    ViolationSeverity,
};
pub use config::{
    validate as validate_config, AlertingConfig, CollectionConfig, ConfigError, ConfigValidation,
    GlobalConfig, LogLevel, NotificationChannel, PerformanceConfig, ReportingConfig,
    SelectorCoreConfig, StorageConfig, StorageType,
};
pub use driver::{
    DocumentDriver, DriverError, DriverResult, Element, InMemoryDocument, InMemoryDriver,
    InMemoryNode,
};
pub use error::{Result, SelectorCoreError};
pub use lifecycle::{HealthStatus, Lifecycle, LifecycleError, LifecycleSnapshot, Phase};
pub use metrics::{
    ConfidenceMetrics, DriftAnalysis, DriftAnalyzer, MetricSample, MetricsStore,
    PerformanceTrend, TrendDirection,
};
pub use model::{
    ElementInfo, SelectorDefinitionError, SelectorResult, SemanticSelector, StrategyPattern,
    StrategyType, ValidationResult, ValidationRule, ValidationRuleError, ValidationRuleType,
};
pub use registry::{RegistryError, SelectorRegistry};
pub use resolution::{ResolutionEngine, ResolutionError};
pub use storage::{
    file_tree::FileTreeStorage, sqlite::SqliteStorage, CheckpointStorage, EventStorage,
    StorageError, StorageResult,
};
pub use strategy::{AttemptOutcome, StrategyConfig, StrategyConfigError};
pub use tab_context::{TabContext, TabContextError, TabContextManager, TabState};
pub use telemetry::correlation::CorrelationScope;
pub use telemetry::{
    correlation, OperationType, PerformanceMetrics, QualityMetrics, SessionSummary,
    SessionTracker, StrategyMetrics, TelemetryCollector, TelemetryConfig, TelemetryError,
    TelemetryEvent,
};
pub use validation::ValidationEngine;

#[cfg(feature = "chromium-driver")]
pub use driver::ChromiumDriver;
