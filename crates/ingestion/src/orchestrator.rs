//! Transactional load of a whole inventory.
//!
//! Mapping and planning happen before the first write. Writes go strictly
//! parents first: networks, then stations, then channels, then response
//! stages. Every write of one load shares a single session, so any error
//! leaves the store exactly as it was.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use aqms_common::{
    ChannelRecord, EntityKind, Epoch, EpochRow, Inventory, NetworkRow, StationKey, StationRow,
    Timestamp,
};
use storage::{Session, Store};

use crate::error::Result;
use crate::mapper::{map_inventory, MappedNetwork};
use crate::reconcile::{reconcile, Edit, EditCounts, Plan};

/// Options for a load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Plan and report without writing anything
    pub dry_run: bool,
    /// Clock used to retire missing open epochs (defaults to now)
    pub now: Option<Timestamp>,
}

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpAction {
    Insert,
    Close,
    Extend,
    /// Row removed outright (hard delete)
    Delete,
}

/// One write, in the order it was (or would be) applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedOp {
    pub kind: EntityKind,
    pub action: OpAction,
    /// Natural key, e.g. "UW.RATT..EHZ"; stages carry their sequence number
    pub key: String,
    /// Epoch after the write
    pub epoch: Epoch,
}

/// Outcome of a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub dry_run: bool,
    pub networks: EditCounts,
    pub stations: EditCounts,
    pub channels: EditCounts,
    pub stages: EditCounts,
    pub ops: Vec<AppliedOp>,
}

impl LoadSummary {
    pub fn counts(&self, kind: EntityKind) -> EditCounts {
        match kind {
            EntityKind::Network => self.networks,
            EntityKind::Station => self.stations,
            EntityKind::Channel => self.channels,
            EntityKind::ResponseStage => self.stages,
        }
    }

    /// True if the load changed (or would change) nothing.
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Reconcile `inventory` against the store inside an existing session.
///
/// The caller owns commit and rollback; see [`load`].
pub async fn load_inventory(
    session: &mut dyn Session,
    inventory: &Inventory,
    options: &LoadOptions,
) -> Result<LoadSummary> {
    let now = options.now.unwrap_or_else(Utc::now);
    let mapped = map_inventory(inventory)?;

    let (networks, stations, channels) = plan_all(session, &mapped, now).await?;

    let mut summary = LoadSummary {
        dry_run: options.dry_run,
        networks: networks.counts(),
        stations: stations.counts(),
        channels: channels.counts(),
        stages: stage_counts(&channels),
        ops: Vec::new(),
    };

    for edit in &networks.edits {
        apply_network(session, edit, options.dry_run, &mut summary.ops).await?;
    }
    for edit in &stations.edits {
        apply_station(session, edit, options.dry_run, &mut summary.ops).await?;
    }
    for edit in &channels.edits {
        apply_channel(session, edit, options.dry_run, &mut summary.ops).await?;
    }
    for edit in &channels.edits {
        apply_stages(session, edit, options.dry_run, &mut summary.ops).await?;
    }

    info!(
        networks = %summary.networks,
        stations = %summary.stations,
        channels = %summary.channels,
        stages = %summary.stages,
        dry_run = options.dry_run,
        "Reconciled inventory"
    );
    Ok(summary)
}

/// Load `inventory` as one atomic unit of work.
///
/// Commits on success (rolls back instead when `dry_run` is set) and rolls
/// back on any error.
pub async fn load(
    store: &dyn Store,
    inventory: &Inventory,
    options: &LoadOptions,
) -> Result<LoadSummary> {
    let mut session = store.begin().await?;
    match load_inventory(session.as_mut(), inventory, options).await {
        Ok(summary) => {
            if options.dry_run {
                session.rollback().await?;
            } else {
                session.commit().await?;
            }
            Ok(summary)
        }
        Err(e) => {
            warn!(error = %e, "Load failed, rolling back");
            if let Err(rollback) = session.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn plan_all(
    session: &mut dyn Session,
    mapped: &[MappedNetwork],
    now: Timestamp,
) -> Result<(Plan<NetworkRow>, Plan<StationRow>, Plan<ChannelRecord>)> {
    let mut network_rows: BTreeMap<String, Vec<NetworkRow>> = BTreeMap::new();
    let mut station_rows: BTreeMap<StationKey, Vec<StationRow>> = BTreeMap::new();
    let mut channel_rows: BTreeMap<StationKey, Vec<ChannelRecord>> = BTreeMap::new();

    for network in mapped {
        network_rows
            .entry(network.row.net.clone())
            .or_default()
            .push(network.row.clone());
        for station in &network.stations {
            let key = station.row.key();
            station_rows
                .entry(key.clone())
                .or_default()
                .push(station.row.clone());
            channel_rows
                .entry(key)
                .or_default()
                .extend(station.channels.iter().cloned());
        }
    }

    let mut old_networks = Vec::new();
    for net in network_rows.keys() {
        old_networks.extend(session.network_epochs(net).await?);
    }
    let new_networks: Vec<NetworkRow> = network_rows.into_values().flatten().collect();
    let networks = reconcile(&old_networks, &new_networks, now)?;

    // Only stations present in the inventory are in scope. Their stored
    // channels missing from the inventory are reconciled against nothing.
    let mut old_stations = Vec::new();
    let mut old_channels = Vec::new();
    for key in station_rows.keys() {
        old_stations.extend(session.station_epochs(key).await?);
        old_channels.extend(session.channel_epochs(key).await?);
    }
    let new_stations: Vec<StationRow> = station_rows.into_values().flatten().collect();
    let stations = reconcile(&old_stations, &new_stations, now)?;

    let new_channels: Vec<ChannelRecord> = channel_rows.into_values().flatten().collect();
    let channels = reconcile(&old_channels, &new_channels, now)?;

    debug!(
        networks = networks.edits.len(),
        stations = stations.edits.len(),
        channels = channels.edits.len(),
        "Planned edits"
    );
    Ok((networks, stations, channels))
}

/// Stage edits follow their channel's edits one for one.
fn stage_counts(channels: &Plan<ChannelRecord>) -> EditCounts {
    let mut counts = EditCounts::default();
    for edit in &channels.edits {
        let n = edit.row().stages.len();
        match edit {
            Edit::Insert(_) => counts.inserted += n,
            Edit::Close { .. } => counts.closed += n,
            Edit::Extend { .. } => counts.extended += n,
            Edit::Unchanged(_) => counts.unchanged += n,
        }
    }
    counts
}

/// The epoch a stored row ends up with after `edit`.
fn epoch_after<R: EpochRow>(edit: &Edit<R>) -> Result<Epoch> {
    let epoch = match edit {
        Edit::Insert(row) | Edit::Unchanged(row) => row.epoch(),
        Edit::Close { row, at } => row.epoch().with_end(Some(*at))?,
        Edit::Extend { row, to } => row.epoch().with_end(*to)?,
    };
    Ok(epoch)
}

fn record_op<R: EpochRow>(
    ops: &mut Vec<AppliedOp>,
    kind: EntityKind,
    key: String,
    edit: &Edit<R>,
) -> Result<()> {
    let action = match edit {
        Edit::Insert(_) => OpAction::Insert,
        Edit::Close { .. } => OpAction::Close,
        Edit::Extend { .. } => OpAction::Extend,
        Edit::Unchanged(_) => return Ok(()),
    };
    let epoch = epoch_after(edit)?;
    debug!(kind = %kind, key = %key, action = ?action, epoch = %epoch, "Applying edit");
    ops.push(AppliedOp {
        kind,
        action,
        key,
        epoch,
    });
    Ok(())
}

async fn apply_network(
    session: &mut dyn Session,
    edit: &Edit<NetworkRow>,
    dry_run: bool,
    ops: &mut Vec<AppliedOp>,
) -> Result<()> {
    record_op(ops, EntityKind::Network, edit.row().key(), edit)?;
    if dry_run {
        return Ok(());
    }
    match edit {
        Edit::Insert(row) => session.insert_network(row).await?,
        Edit::Close { row, at } => {
            session
                .set_network_end(&row.net, row.epoch.start(), Some(*at))
                .await?
        }
        Edit::Extend { row, to } => {
            session
                .set_network_end(&row.net, row.epoch.start(), *to)
                .await?
        }
        Edit::Unchanged(_) => {}
    }
    Ok(())
}

async fn apply_station(
    session: &mut dyn Session,
    edit: &Edit<StationRow>,
    dry_run: bool,
    ops: &mut Vec<AppliedOp>,
) -> Result<()> {
    let key = edit.row().key();
    record_op(ops, EntityKind::Station, key.to_string(), edit)?;
    if dry_run {
        return Ok(());
    }
    match edit {
        Edit::Insert(row) => session.insert_station(row).await?,
        Edit::Close { row, at } => {
            session
                .set_station_end(&key, row.epoch.start(), Some(*at))
                .await?
        }
        Edit::Extend { row, to } => session.set_station_end(&key, row.epoch.start(), *to).await?,
        Edit::Unchanged(_) => {}
    }
    Ok(())
}

async fn apply_channel(
    session: &mut dyn Session,
    edit: &Edit<ChannelRecord>,
    dry_run: bool,
    ops: &mut Vec<AppliedOp>,
) -> Result<()> {
    let key = edit.row().key();
    record_op(ops, EntityKind::Channel, key.to_string(), edit)?;
    if dry_run {
        return Ok(());
    }
    match edit {
        Edit::Insert(record) => session.insert_channel(&record.channel).await?,
        Edit::Close { row, at } => {
            session
                .set_channel_end(&key, row.epoch().start(), Some(*at))
                .await?
        }
        Edit::Extend { row, to } => {
            session
                .set_channel_end(&key, row.epoch().start(), *to)
                .await?
        }
        Edit::Unchanged(_) => {}
    }
    Ok(())
}

async fn apply_stages(
    session: &mut dyn Session,
    edit: &Edit<ChannelRecord>,
    dry_run: bool,
    ops: &mut Vec<AppliedOp>,
) -> Result<()> {
    let record = edit.row();
    let key = record.key();
    for stage in &record.stages {
        let label = format!("{} stage {}", key, stage.stage_seq);
        record_op(ops, EntityKind::ResponseStage, label, edit)?;
    }
    if dry_run {
        return Ok(());
    }
    match edit {
        Edit::Insert(record) => {
            for stage in &record.stages {
                session.insert_stage(stage).await?;
            }
        }
        Edit::Close { row, at } => {
            session
                .set_stages_end(&key, row.epoch().start(), Some(*at))
                .await?;
        }
        Edit::Extend { row, to } => {
            session
                .set_stages_end(&key, row.epoch().start(), *to)
                .await?;
        }
        Edit::Unchanged(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    fn ehz_record() -> ChannelRecord {
        map_inventory(&fixtures::uw_ratt_inventory())
            .unwrap()
            .into_iter()
            .flat_map(|n| n.stations)
            .flat_map(|s| s.channels)
            .next()
            .unwrap()
    }

    #[test]
    fn test_stage_counts_follow_channel_edits() {
        let record = ehz_record();
        let plan = Plan {
            edits: vec![
                Edit::Insert(record.clone()),
                Edit::Close {
                    row: record.clone(),
                    at: fixtures::now(),
                },
            ],
            resulting: vec![],
        };
        let counts = stage_counts(&plan);
        assert_eq!(counts.inserted, 3);
        assert_eq!(counts.closed, 3);
        assert_eq!(counts.unchanged, 0);
    }

    #[test]
    fn test_unchanged_edits_are_not_recorded() {
        let record = ehz_record();
        let mut ops = Vec::new();
        record_op(&mut ops, EntityKind::Channel, "x".into(), &Edit::Unchanged(record.clone())).unwrap();
        assert!(ops.is_empty());

        let at = fixtures::now();
        record_op(&mut ops, EntityKind::Channel, "x".into(), &Edit::Close { row: record, at }).unwrap();
        assert_eq!(ops[0].action, OpAction::Close);
        assert_eq!(ops[0].epoch.end(), Some(at));
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = LoadSummary {
            dry_run: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["stages"]["inserted"], 0);
        assert!(json["ops"].as_array().unwrap().is_empty());
    }
}
