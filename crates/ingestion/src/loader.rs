//! Loader facade used by the command-line front end.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use aqms_common::Inventory;
use storage::Store;

use crate::deletion::{self, DeleteRequest, PurgeTarget};
use crate::error::Result;
use crate::export::{self, ExportRequest};
use crate::orchestrator::{self, AppliedOp, LoadOptions, LoadSummary};

/// Loads, exports and retires station metadata against one store.
///
/// Every call is its own unit of work.
pub struct Loader {
    store: Arc<dyn Store>,
}

impl Loader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load a StationXML document from the filesystem.
    pub async fn load_file(
        &self,
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<LoadSummary> {
        let path = path.as_ref();
        let xml = tokio::fs::read_to_string(path).await?;
        info!(path = %path.display(), bytes = xml.len(), "Read StationXML document");
        self.load_xml(&xml, options).await
    }

    /// Load a StationXML document held in memory.
    pub async fn load_xml(&self, xml: &str, options: &LoadOptions) -> Result<LoadSummary> {
        let inventory = stationxml::read_inventory(xml)?;
        self.load_inventory(&inventory, options).await
    }

    pub async fn load_inventory(
        &self,
        inventory: &Inventory,
        options: &LoadOptions,
    ) -> Result<LoadSummary> {
        info!(
            networks = inventory.networks.len(),
            stations = inventory.station_count(),
            channels = inventory.channel_count(),
            dry_run = options.dry_run,
            "Loading inventory"
        );
        orchestrator::load(self.store.as_ref(), inventory, options).await
    }

    pub async fn export(&self, request: &ExportRequest) -> Result<Inventory> {
        export::export(self.store.as_ref(), request).await
    }

    /// Export as a StationXML document.
    pub async fn export_xml(&self, request: &ExportRequest) -> Result<String> {
        let inventory = self.export(request).await?;
        Ok(stationxml::write_inventory(&inventory))
    }

    /// Retire a station (and authorized children).
    pub async fn delete(&self, request: &DeleteRequest) -> Result<Vec<AppliedOp>> {
        deletion::delete(self.store.as_ref(), request).await
    }

    /// Hard delete one epoch.
    pub async fn purge(&self, target: &PurgeTarget) -> Result<Vec<AppliedOp>> {
        deletion::purge(self.store.as_ref(), target).await
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
