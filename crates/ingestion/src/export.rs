//! Reverse path: stored rows back to an inventory.

use chrono::Utc;
use tracing::info;

use aqms_common::{ChannelRecord, Epoch, Inventory, StationKey, Timestamp};
use storage::{Session, Store};

use crate::error::Result;
use crate::mapper::assemble_inventory;

/// Which epochs to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    /// Open epochs only.
    #[default]
    Current,
    /// Epochs in effect at an instant.
    At(Timestamp),
    /// Every stored epoch.
    History,
}

impl ExportScope {
    fn selects(&self, epoch: &Epoch) -> bool {
        match self {
            ExportScope::Current => epoch.is_open(),
            ExportScope::At(instant) => epoch.contains(*instant),
            ExportScope::History => true,
        }
    }
}

/// Export request: a scope plus optional filters.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub scope: ExportScope,
    pub network: Option<String>,
    pub station: Option<String>,
}

/// Read the selected rows inside `session` and assemble an inventory.
pub async fn export_inventory(
    session: &mut dyn Session,
    request: &ExportRequest,
) -> Result<Inventory> {
    let network = request.network.as_deref();

    let networks: Vec<_> = session
        .list_networks()
        .await?
        .into_iter()
        .filter(|n| network.map_or(true, |code| n.net == code))
        .filter(|n| request.scope.selects(&n.epoch))
        .collect();

    let stations: Vec<_> = session
        .list_stations(network)
        .await?
        .into_iter()
        .filter(|s| request.station.as_deref().map_or(true, |code| s.sta == code))
        .filter(|s| request.scope.selects(&s.epoch))
        .collect();

    let mut keys: Vec<StationKey> = stations
        .iter()
        .map(|s| StationKey::new(s.net.clone(), s.sta.clone()))
        .collect();
    keys.dedup();

    let mut channels: Vec<ChannelRecord> = Vec::new();
    for key in &keys {
        channels.extend(
            session
                .channel_epochs(key)
                .await?
                .into_iter()
                .filter(|c| request.scope.selects(&c.channel.epoch)),
        );
    }

    let mut inventory = assemble_inventory(networks, stations, channels)?;
    inventory.source = Some("AQMS".to_string());
    inventory.created = Some(Utc::now());

    info!(
        networks = inventory.networks.len(),
        stations = inventory.station_count(),
        channels = inventory.channel_count(),
        "Exported inventory"
    );
    Ok(inventory)
}

/// Export in its own read-only unit of work.
pub async fn export(store: &dyn Store, request: &ExportRequest) -> Result<Inventory> {
    let mut session = store.begin().await?;
    let result = export_inventory(session.as_mut(), request).await;
    session.rollback().await?;
    result
}
