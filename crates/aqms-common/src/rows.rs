//! Relational row shapes for the AQMS schema.
//!
//! Every row is natural key + epoch bounds + payload. Enumerated values are
//! already translated to the AQMS vocabulary (unit ids from `d_unit`,
//! single-letter transfer function and symmetry codes).

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::epoch::Epoch;
use crate::keys::{ChannelKey, EntityKind, StationKey};

/// A row that carries an epoch and can be compared payload-to-payload.
pub trait EpochRow: Clone + PartialEq + Debug + Send + Sync {
    type Key: Clone + Eq + Ord + std::fmt::Display + Send + Sync;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    fn epoch(&self) -> Epoch;

    /// A copy of this row with a different epoch.
    fn with_epoch(&self, epoch: Epoch) -> Self;

    /// True if everything but the epoch is identical.
    fn same_payload(&self, other: &Self) -> bool {
        self.with_epoch(other.epoch()) == *other
    }
}

/// Merge two versions of the same entity whose intervals are identical or
/// adjacent and whose payloads are identical.
pub fn coalesce<R: EpochRow>(a: &R, b: &R) -> Option<R> {
    if a.key() != b.key() || !a.same_payload(b) {
        return None;
    }
    a.epoch().coalesce(&b.epoch()).map(|epoch| a.with_epoch(epoch))
}

/// Any row the mapper can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum RowCandidate {
    Network(NetworkRow),
    Station(StationRow),
    Channel(ChannelRow),
    Stage(StageRow),
}

impl RowCandidate {
    pub fn kind(&self) -> EntityKind {
        match self {
            RowCandidate::Network(_) => EntityKind::Network,
            RowCandidate::Station(_) => EntityKind::Station,
            RowCandidate::Channel(_) => EntityKind::Channel,
            RowCandidate::Stage(_) => EntityKind::ResponseStage,
        }
    }
}

/// `d_network`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRow {
    pub net: String,
    pub description: Option<String>,
    pub epoch: Epoch,
}

impl EpochRow for NetworkRow {
    type Key = String;
    const KIND: EntityKind = EntityKind::Network;

    fn key(&self) -> String {
        self.net.clone()
    }

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn with_epoch(&self, epoch: Epoch) -> Self {
        Self {
            epoch,
            ..self.clone()
        }
    }
}

/// `station_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRow {
    pub net: String,
    pub sta: String,
    pub epoch: Epoch,
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
    pub staname: Option<String>,
}

impl EpochRow for StationRow {
    type Key = StationKey;
    const KIND: EntityKind = EntityKind::Station;

    fn key(&self) -> StationKey {
        StationKey::new(self.net.clone(), self.sta.clone())
    }

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn with_epoch(&self, epoch: Epoch) -> Self {
        Self {
            epoch,
            ..self.clone()
        }
    }
}

/// `channel_data`, with the `simple_response` summary folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRow {
    pub net: String,
    pub sta: String,
    pub location: String,
    pub seedchan: String,
    pub epoch: Epoch,
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
    pub edepth: f64,
    pub azimuth: Option<f64>,
    pub dip: Option<f64>,
    pub samprate: f64,
    /// Instrument (sensor) description
    pub inid: Option<String>,
    /// `d_unit` id of the calibration signal
    pub unit_calib: Option<i32>,
    pub format: Option<String>,
    pub simple_response: Option<SimpleResponse>,
}

impl EpochRow for ChannelRow {
    type Key = ChannelKey;
    const KIND: EntityKind = EntityKind::Channel;

    fn key(&self) -> ChannelKey {
        ChannelKey {
            network: self.net.clone(),
            station: self.sta.clone(),
            location: self.location.clone(),
            channel: self.seedchan.clone(),
        }
    }

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn with_epoch(&self, epoch: Epoch) -> Self {
        Self {
            epoch,
            ..self.clone()
        }
    }
}

/// Overall channel sensitivity (`simple_response`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub gain: f64,
    pub frequency: f64,
    pub unit_in: i32,
    pub unit_out: i32,
}

/// `response_stage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRow {
    pub net: String,
    pub sta: String,
    pub location: String,
    pub seedchan: String,
    /// Always the parent channel's epoch
    pub epoch: Epoch,
    pub stage_seq: u32,
    pub gain: f64,
    pub gain_frequency: f64,
    pub unit_in: i32,
    pub unit_out: i32,
    pub transfer: TransferRow,
    pub decimation: Option<DecimationRow>,
}

impl StageRow {
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey {
            network: self.net.clone(),
            station: self.sta.clone(),
            location: self.location.clone(),
            channel: self.seedchan.clone(),
        }
    }
}

/// Stage payload in AQMS codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferRow {
    PolesZeros {
        /// A (rad/s), B (Hz) or D (digital)
        tf_type: String,
        /// Normalization factor
        ao: f64,
        /// Normalization frequency
        af: f64,
        zeros: Vec<(f64, f64)>,
        poles: Vec<(f64, f64)>,
    },
    Coefficients {
        tf_type: String,
        numerators: Vec<f64>,
        denominators: Vec<f64>,
    },
    Fir {
        /// A (none), B (odd) or C (even)
        symmetry: String,
        coefficients: Vec<f64>,
    },
    Gain,
}

impl TransferRow {
    /// Short tag stored in the `tf_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferRow::PolesZeros { .. } => "PZ",
            TransferRow::Coefficients { .. } => "COEFF",
            TransferRow::Fir { .. } => "FIR",
            TransferRow::Gain => "GAIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimationRow {
    pub input_rate: f64,
    pub factor: u32,
    pub offset: u32,
    pub delay: f64,
    pub correction: f64,
}

/// A channel epoch together with its response stages.
///
/// Stages share the channel's epoch, so the pair is versioned as one unit:
/// a change to any stage is a change to the channel epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel: ChannelRow,
    pub stages: Vec<StageRow>,
}

impl EpochRow for ChannelRecord {
    type Key = ChannelKey;
    const KIND: EntityKind = EntityKind::Channel;

    fn key(&self) -> ChannelKey {
        self.channel.key()
    }

    fn epoch(&self) -> Epoch {
        self.channel.epoch
    }

    fn with_epoch(&self, epoch: Epoch) -> Self {
        Self {
            channel: self.channel.with_epoch(epoch),
            stages: self
                .stages
                .iter()
                .map(|s| StageRow {
                    epoch,
                    ..s.clone()
                })
                .collect(),
        }
    }
}
