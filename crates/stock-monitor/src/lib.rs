pub mod calendar;
pub mod cancel;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod pacing;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::{MonitorConfig, ProviderKind};
pub use metrics::CycleMetrics;
pub use orchestrator::CycleOrchestrator;
pub use pacing::{Pacer, PacingPolicy};
