//! In-memory station metadata tables.
//!
//! Each session works on a private copy of the tables taken at `begin`.
//! `commit` publishes the copy only if no other session committed in the
//! meantime, which gives the same outcome as a serializable transaction:
//! the loser fails with [`StoreError::ConcurrentModification`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use aqms_common::{
    ChannelKey, ChannelRecord, ChannelRow, EpochRow, NetworkRow, StageRow, StationKey, StationRow,
    Timestamp,
};

use crate::error::{StoreError, StoreResult};
use crate::session::{Session, Store};

/// Raw contents of every table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub networks: Vec<NetworkRow>,
    pub stations: Vec<StationRow>,
    pub channels: Vec<ChannelRow>,
    pub stages: Vec<StageRow>,
}

impl MemoryTables {
    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.networks.len() + self.stations.len() + self.channels.len() + self.stages.len()
    }
}

#[derive(Debug, Default)]
struct Shared {
    version: u64,
    tables: MemoryTables,
}

/// Shared in-memory store. Clones refer to the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing rows.
    pub fn with_tables(tables: MemoryTables) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared { version: 0, tables })),
        }
    }

    /// Copy of the committed tables.
    pub async fn snapshot(&self) -> MemoryTables {
        self.shared.lock().await.tables.clone()
    }

    /// Number of commits so far.
    pub async fn version(&self) -> u64 {
        self.shared.lock().await.version
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn Session>> {
        let shared = self.shared.lock().await;
        Ok(Box::new(MemorySession {
            shared: Arc::clone(&self.shared),
            base_version: shared.version,
            tables: shared.tables.clone(),
        }))
    }
}

/// A session over a private copy of the tables.
pub struct MemorySession {
    shared: Arc<Mutex<Shared>>,
    base_version: u64,
    tables: MemoryTables,
}

fn insert_unique<R: EpochRow>(table: &mut Vec<R>, row: &R) -> StoreResult<()> {
    let key = row.key();
    let start = row.epoch().start();
    if table
        .iter()
        .any(|r| r.key() == key && r.epoch().start() == start)
    {
        return Err(StoreError::Duplicate(format!(
            "{} {} starting {}",
            R::KIND,
            key,
            start
        )));
    }
    table.push(row.clone());
    Ok(())
}

fn set_end<R: EpochRow>(
    table: &mut [R],
    key: &R::Key,
    start: Timestamp,
    end: Option<Timestamp>,
) -> StoreResult<()> {
    let row = table
        .iter_mut()
        .find(|r| &r.key() == key && r.epoch().start() == start)
        .ok_or_else(|| StoreError::NotFound(format!("{} {} starting {}", R::KIND, key, start)))?;
    let epoch = row
        .epoch()
        .with_end(end)
        .map_err(|e| StoreError::Database(e.to_string()))?;
    *row = row.with_epoch(epoch);
    Ok(())
}

fn sorted<R: EpochRow>(mut rows: Vec<R>) -> Vec<R> {
    rows.sort_by(|a, b| a.key().cmp(&b.key()).then(a.epoch().cmp(&b.epoch())));
    rows
}

#[async_trait]
impl Session for MemorySession {
    async fn network_epochs(&mut self, net: &str) -> StoreResult<Vec<NetworkRow>> {
        Ok(sorted(
            self.tables
                .networks
                .iter()
                .filter(|r| r.net == net)
                .cloned()
                .collect(),
        ))
    }

    async fn station_epochs(&mut self, key: &StationKey) -> StoreResult<Vec<StationRow>> {
        Ok(sorted(
            self.tables
                .stations
                .iter()
                .filter(|r| r.net == key.network && r.sta == key.station)
                .cloned()
                .collect(),
        ))
    }

    async fn channel_epochs(&mut self, station: &StationKey) -> StoreResult<Vec<ChannelRecord>> {
        let channels = sorted(
            self.tables
                .channels
                .iter()
                .filter(|r| r.net == station.network && r.sta == station.station)
                .cloned()
                .collect(),
        );

        Ok(channels
            .into_iter()
            .map(|channel| {
                let key = channel.key();
                let mut stages: Vec<StageRow> = self
                    .tables
                    .stages
                    .iter()
                    .filter(|s| s.channel_key() == key && s.epoch.start() == channel.epoch.start())
                    .cloned()
                    .collect();
                stages.sort_by_key(|s| s.stage_seq);
                ChannelRecord { channel, stages }
            })
            .collect())
    }

    async fn list_networks(&mut self) -> StoreResult<Vec<NetworkRow>> {
        Ok(sorted(self.tables.networks.clone()))
    }

    async fn list_stations(&mut self, net: Option<&str>) -> StoreResult<Vec<StationRow>> {
        Ok(sorted(
            self.tables
                .stations
                .iter()
                .filter(|r| net.map_or(true, |n| r.net == n))
                .cloned()
                .collect(),
        ))
    }

    async fn insert_network(&mut self, row: &NetworkRow) -> StoreResult<()> {
        insert_unique(&mut self.tables.networks, row)
    }

    async fn insert_station(&mut self, row: &StationRow) -> StoreResult<()> {
        insert_unique(&mut self.tables.stations, row)
    }

    async fn insert_channel(&mut self, row: &ChannelRow) -> StoreResult<()> {
        insert_unique(&mut self.tables.channels, row)
    }

    async fn insert_stage(&mut self, row: &StageRow) -> StoreResult<()> {
        let key = row.channel_key();
        let start = row.epoch.start();
        if self.tables.stages.iter().any(|s| {
            s.channel_key() == key && s.epoch.start() == start && s.stage_seq == row.stage_seq
        }) {
            return Err(StoreError::Duplicate(format!(
                "stage {} of {} starting {}",
                row.stage_seq, key, start
            )));
        }
        self.tables.stages.push(row.clone());
        Ok(())
    }

    async fn set_network_end(
        &mut self,
        net: &str,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()> {
        set_end(&mut self.tables.networks, &net.to_string(), start, end)
    }

    async fn set_station_end(
        &mut self,
        key: &StationKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()> {
        set_end(&mut self.tables.stations, key, start, end)
    }

    async fn set_channel_end(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()> {
        set_end(&mut self.tables.channels, key, start, end)
    }

    async fn set_stages_end(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<u64> {
        let mut touched = 0;
        for stage in self
            .tables
            .stages
            .iter_mut()
            .filter(|s| &s.channel_key() == key && s.epoch.start() == start)
        {
            stage.epoch = stage
                .epoch
                .with_end(end)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_station_epoch(
        &mut self,
        key: &StationKey,
        start: Timestamp,
    ) -> StoreResult<u64> {
        let before = self.tables.stations.len();
        self.tables
            .stations
            .retain(|r| !(&r.key() == key && r.epoch.start() == start));
        Ok((before - self.tables.stations.len()) as u64)
    }

    async fn delete_channel_epoch(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
    ) -> StoreResult<u64> {
        self.tables
            .channels
            .retain(|r| !(&r.key() == key && r.epoch.start() == start));
        let before = self.tables.stages.len();
        self.tables
            .stages
            .retain(|s| !(&s.channel_key() == key && s.epoch.start() == start));
        Ok((before - self.tables.stages.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut shared = self.shared.lock().await;
        if shared.version != self.base_version {
            return Err(StoreError::ConcurrentModification);
        }
        shared.version += 1;
        shared.tables = self.tables;
        debug!(version = shared.version, "Committed in-memory session");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        debug!(base_version = self.base_version, "Rolled back in-memory session");
        Ok(())
    }
}
