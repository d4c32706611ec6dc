//! Station retirement and hard delete.
//!
//! Retirement closes the open epoch of a station, and of the children the
//! caller authorized, at one instant. History is kept. Hard delete
//! (`purge`) removes a single epoch outright and is meant for correcting
//! mistakes; it refuses to orphan children.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use aqms_common::{ChannelKey, EntityKind, Epoch, EpochRow, StationKey, Timestamp};
use storage::{Session, Store};

use crate::error::{ConflictError, DependencyError, IngestionError, Result};
use crate::orchestrator::{AppliedOp, OpAction};

/// Which open children a retirement may close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeScope {
    /// Close every open child channel with the station.
    Cascade,
    /// Close the station only; open children are an error.
    Deny,
    /// Close only the listed channels, given as "CHA" or "LOC.CHA".
    Only(Vec<String>),
}

impl CascadeScope {
    fn authorizes(&self, key: &ChannelKey) -> bool {
        match self {
            CascadeScope::Cascade => true,
            CascadeScope::Deny => false,
            CascadeScope::Only(allowed) => allowed.iter().any(|a| {
                let a = a.trim();
                a == key.channel || a == format!("{}.{}", key.location, key.channel)
            }),
        }
    }
}

/// Retire a station.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub station: StationKey,
    /// Instant the epochs end (defaults to now)
    pub at: Option<Timestamp>,
    pub scope: CascadeScope,
}

/// Remove one epoch outright.
#[derive(Debug, Clone, PartialEq)]
pub enum PurgeTarget {
    Station { key: StationKey, start: Timestamp },
    Channel { key: ChannelKey, start: Timestamp },
}

/// One step of a deletion plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DeletionStep {
    CloseStation {
        key: StationKey,
        epoch: Epoch,
        at: Timestamp,
    },
    /// Closes the channel epoch and its stages.
    CloseChannel {
        key: ChannelKey,
        epoch: Epoch,
        at: Timestamp,
        stages: usize,
    },
    PurgeStation {
        key: StationKey,
        epoch: Epoch,
    },
    /// Removes the channel epoch and its stages.
    PurgeChannel {
        key: ChannelKey,
        epoch: Epoch,
        stages: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionPlan {
    pub station: StationKey,
    pub steps: Vec<DeletionStep>,
}

/// Plan the retirement of a station's open epoch.
pub async fn plan_deletion(
    session: &mut dyn Session,
    request: &DeleteRequest,
) -> Result<DeletionPlan> {
    let at = request.at.unwrap_or_else(Utc::now);
    let key = &request.station;

    let stations = session.station_epochs(key).await?;
    let stored: Vec<Epoch> = stations.iter().map(|s| s.epoch).collect();
    let open = stations
        .iter()
        .find(|s| s.epoch.is_open())
        .ok_or_else(|| IngestionError::NotFound(format!("open epoch of station {}", key)))?;

    if at <= open.epoch.start() {
        return Err(ConflictError {
            kind: EntityKind::Station,
            key: key.to_string(),
            detail: "cannot close an epoch at or before its start".to_string(),
            incoming: format!("close at {}", aqms_common::format_timestamp(&at)),
            stored,
        }
        .into());
    }

    let open_children: Vec<_> = session
        .channel_epochs(key)
        .await?
        .into_iter()
        .filter(|c| c.epoch().is_open())
        .collect();

    let unauthorized: Vec<ChannelKey> = open_children
        .iter()
        .map(|c| c.key())
        .filter(|k| !request.scope.authorizes(k))
        .collect();
    if !unauthorized.is_empty() {
        let reason = match request.scope {
            CascadeScope::Deny => "station has open channels and cascading was denied",
            _ => "open channels outside the authorized set",
        };
        return Err(DependencyError {
            station: key.clone(),
            children: unauthorized,
            reason: reason.to_string(),
        }
        .into());
    }

    let mut steps = vec![DeletionStep::CloseStation {
        key: key.clone(),
        epoch: open.epoch,
        at,
    }];
    for child in open_children {
        if at <= child.epoch().start() {
            return Err(ConflictError {
                kind: EntityKind::Channel,
                key: child.key().to_string(),
                detail: "cannot close an epoch at or before its start".to_string(),
                incoming: format!("close at {}", aqms_common::format_timestamp(&at)),
                stored: vec![child.epoch()],
            }
            .into());
        }
        steps.push(DeletionStep::CloseChannel {
            key: child.key(),
            epoch: child.epoch(),
            at,
            stages: child.stages.len(),
        });
    }

    Ok(DeletionPlan {
        station: key.clone(),
        steps,
    })
}

/// Plan the hard delete of one station or channel epoch.
pub async fn plan_purge(session: &mut dyn Session, target: &PurgeTarget) -> Result<DeletionPlan> {
    match target {
        PurgeTarget::Station { key, start } => {
            let epoch = session
                .station_epochs(key)
                .await?
                .into_iter()
                .map(|s| s.epoch)
                .find(|e| e.start() == *start)
                .ok_or_else(|| {
                    IngestionError::NotFound(format!(
                        "station {} epoch starting {}",
                        key,
                        aqms_common::format_timestamp(start)
                    ))
                })?;

            let dependents: Vec<ChannelKey> = session
                .channel_epochs(key)
                .await?
                .into_iter()
                .filter(|c| c.epoch().overlaps(&epoch))
                .map(|c| c.key())
                .collect();
            if !dependents.is_empty() {
                return Err(DependencyError {
                    station: key.clone(),
                    children: dependents,
                    reason: "channel epochs overlap the station epoch".to_string(),
                }
                .into());
            }

            Ok(DeletionPlan {
                station: key.clone(),
                steps: vec![DeletionStep::PurgeStation {
                    key: key.clone(),
                    epoch,
                }],
            })
        }
        PurgeTarget::Channel { key, start } => {
            let station = key.station_key();
            let record = session
                .channel_epochs(&station)
                .await?
                .into_iter()
                .find(|c| &c.key() == key && c.epoch().start() == *start)
                .ok_or_else(|| {
                    IngestionError::NotFound(format!(
                        "channel {} epoch starting {}",
                        key,
                        aqms_common::format_timestamp(start)
                    ))
                })?;

            Ok(DeletionPlan {
                station,
                steps: vec![DeletionStep::PurgeChannel {
                    key: key.clone(),
                    epoch: record.epoch(),
                    stages: record.stages.len(),
                }],
            })
        }
    }
}

/// Apply a plan inside `session`.
pub async fn execute_deletion(
    session: &mut dyn Session,
    plan: &DeletionPlan,
) -> Result<Vec<AppliedOp>> {
    let mut ops = Vec::new();
    for step in &plan.steps {
        match step {
            DeletionStep::CloseStation { key, epoch, at } => {
                session.set_station_end(key, epoch.start(), Some(*at)).await?;
                ops.push(op(EntityKind::Station, OpAction::Close, key, closed(epoch, *at)?));
            }
            DeletionStep::CloseChannel { key, epoch, at, .. } => {
                session.set_channel_end(key, epoch.start(), Some(*at)).await?;
                let stages = session.set_stages_end(key, epoch.start(), Some(*at)).await?;
                let after = closed(epoch, *at)?;
                ops.push(op(EntityKind::Channel, OpAction::Close, key, after));
                if stages > 0 {
                    ops.push(op(EntityKind::ResponseStage, OpAction::Close, key, after));
                }
            }
            DeletionStep::PurgeStation { key, epoch } => {
                let removed = session.delete_station_epoch(key, epoch.start()).await?;
                if removed == 0 {
                    return Err(IngestionError::NotFound(format!("station {} {}", key, epoch)));
                }
                ops.push(op(EntityKind::Station, OpAction::Delete, key, *epoch));
            }
            DeletionStep::PurgeChannel { key, epoch, .. } => {
                let stages = session.delete_channel_epoch(key, epoch.start()).await?;
                ops.push(op(EntityKind::Channel, OpAction::Delete, key, *epoch));
                if stages > 0 {
                    ops.push(op(EntityKind::ResponseStage, OpAction::Delete, key, *epoch));
                }
            }
        }
    }
    info!(station = %plan.station, steps = plan.steps.len(), "Applied deletion plan");
    Ok(ops)
}

/// Plan and apply a retirement as one unit of work.
pub async fn delete(store: &dyn Store, request: &DeleteRequest) -> Result<Vec<AppliedOp>> {
    let mut session = store.begin().await?;
    let result = async {
        let plan = plan_deletion(session.as_mut(), request).await?;
        execute_deletion(session.as_mut(), &plan).await
    }
    .await;
    finish(session, result).await
}

/// Plan and apply a hard delete as one unit of work.
pub async fn purge(store: &dyn Store, target: &PurgeTarget) -> Result<Vec<AppliedOp>> {
    let mut session = store.begin().await?;
    let result = async {
        let plan = plan_purge(session.as_mut(), target).await?;
        execute_deletion(session.as_mut(), &plan).await
    }
    .await;
    finish(session, result).await
}

async fn finish(
    session: Box<dyn Session>,
    result: Result<Vec<AppliedOp>>,
) -> Result<Vec<AppliedOp>> {
    match result {
        Ok(ops) => {
            session.commit().await?;
            Ok(ops)
        }
        Err(e) => {
            warn!(error = %e, "Deletion failed, rolling back");
            if let Err(rollback) = session.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

fn closed(epoch: &Epoch, at: Timestamp) -> Result<Epoch> {
    Ok(epoch.with_end(Some(at))?)
}

fn op(kind: EntityKind, action: OpAction, key: impl ToString, epoch: Epoch) -> AppliedOp {
    AppliedOp {
        kind,
        action,
        key: key.to_string(),
        epoch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::{instants, ts};

    fn ehz() -> ChannelKey {
        StationKey::new("UW", "RATT").channel("", "EHZ")
    }

    #[test]
    fn test_scope_authorization() {
        let key = ehz();
        assert!(CascadeScope::Cascade.authorizes(&key));
        assert!(!CascadeScope::Deny.authorizes(&key));
        assert!(CascadeScope::Only(vec!["EHZ".into()]).authorizes(&key));
        assert!(CascadeScope::Only(vec![" .EHZ ".into()]).authorizes(&key));
        assert!(!CascadeScope::Only(vec!["01.EHZ".into(), "EHN".into()]).authorizes(&key));
    }

    #[test]
    fn test_plan_serializes_tagged_steps() {
        let plan = DeletionPlan {
            station: StationKey::new("UW", "RATT"),
            steps: vec![DeletionStep::PurgeChannel {
                key: ehz(),
                epoch: Epoch::open(ts(instants::INSTALLED)),
                stages: 3,
            }],
        };
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["steps"][0]["step"], "purge_channel");
        assert_eq!(json["steps"][0]["stages"], 3);
        assert_eq!(json["station"]["station"], "RATT");
    }
}
