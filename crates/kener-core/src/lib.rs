#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod defaults;
pub mod definitions;
pub mod group;
pub mod model;
pub mod reconcile;

pub use client::{ApiError, HttpMonitorApi, MonitorApi};
pub use config::ClientConfig;
pub use defaults::{apply_defaults, apply_defaults_at};
pub use definitions::DefinitionError;
pub use group::{resolve_group, GroupResolution, MonitorLookup};
pub use model::{
    DefaultStatus, GroupChild, GroupTypeData, ModelError, Monitor, MonitorStatus, MonitorSummary,
    MonitorType, TypeData, YesNo, MONITOR_FIELDS,
};
pub use reconcile::{ApplyReport, MonitorReport, Outcome, Reconciler};
