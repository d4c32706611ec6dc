//! Station metadata ingestion into the AQMS schema.
//!
//! Turns an [`aqms_common::Inventory`] into AQMS relational rows and keeps
//! the stored epoch history consistent with each incoming document.
//!
//! # Architecture
//!
//! - [`mapper`]: pure Inventory ⇄ row mapping and validation
//! - [`reconcile`]: pure epoch reconciliation producing edit plans
//! - [`orchestrator`]: applies plans parents-first inside one session
//! - [`deletion`]: station retirement and hard delete
//! - [`export`]: stored rows back to an inventory
//! - [`Loader`]: facade over a [`storage::Store`] for front ends

pub mod deletion;
pub mod error;
pub mod export;
mod loader;
pub mod mapper;
pub mod orchestrator;
pub mod reconcile;

// Re-exports
pub use deletion::{
    delete, execute_deletion, plan_deletion, plan_purge, purge, CascadeScope, DeleteRequest,
    DeletionPlan, DeletionStep, PurgeTarget,
};
pub use error::{ConflictError, DependencyError, IngestionError, MappingError, Result};
pub use export::{export, export_inventory, ExportRequest, ExportScope};
pub use loader::Loader;
pub use mapper::{map_inventory, to_inventory, to_rows, MappedNetwork, MappedStation};
pub use orchestrator::{load, load_inventory, AppliedOp, LoadOptions, LoadSummary, OpAction};
pub use reconcile::{reconcile, Edit, EditCounts, Plan};
