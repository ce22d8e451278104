//! Engine surface and per-job orchestration components.

mod engine;
pub mod processor;

pub use engine::AuditEngine;
pub use processor::{
    canonical_url, Crawler, JobCanceler, JobProcessor, ModuleDispatcher, ModuleOutcome,
    ProgressPublisher, Reducer, Services, MIN_COMPLETED_MODULES,
};
