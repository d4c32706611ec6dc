//! Inventory capability model.
//!
//! A fixed set of accessor fields per entity, mirroring the subset of the
//! FDSN StationXML hierarchy that the AQMS schema stores. Readers (see the
//! `stationxml` crate) populate these types; the schema mapper only ever
//! sees them, never the XML.
//!
//! Enumerated values (units, transfer function types, FIR symmetry) are
//! kept as the strings the source document used. Translation to the AQMS
//! vocabulary happens in the mapper.

use serde::{Deserialize, Serialize};

use crate::epoch::Timestamp;

/// Root of a metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    /// Organization that produced the document
    pub source: Option<String>,
    /// Sender of the document
    pub sender: Option<String>,
    /// Creation time of the document
    pub created: Option<Timestamp>,
    pub networks: Vec<Network>,
}

impl Inventory {
    pub fn new(networks: Vec<Network>) -> Self {
        Self {
            networks,
            ..Default::default()
        }
    }

    /// Total number of stations across all networks.
    pub fn station_count(&self) -> usize {
        self.networks.iter().map(|n| n.stations.len()).sum()
    }

    /// Total number of channel epochs across all stations.
    pub fn channel_count(&self) -> usize {
        self.networks
            .iter()
            .flat_map(|n| n.stations.iter())
            .map(|s| s.channels.len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// FDSN network code, e.g. "UW"
    pub code: String,
    pub description: Option<String>,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub stations: Vec<Station>,
}

/// One station epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub code: String,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
    /// Meters above sea level
    pub elevation: f64,
    /// Site name, e.g. "Rattlesnake Mountain"
    pub site_name: Option<String>,
    pub channels: Vec<Channel>,
}

/// One channel epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// SEED channel code (band, instrument, orientation), e.g. "EHZ"
    pub code: String,
    /// Location code; blank is ""
    pub location_code: String,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    /// Burial depth in meters
    pub depth: f64,
    /// Degrees clockwise from north
    pub azimuth: Option<f64>,
    /// Degrees down from horizontal
    pub dip: Option<f64>,
    /// Samples per second
    pub sample_rate: f64,
    /// Sensor description
    pub sensor: Option<String>,
    pub calibration_units: Option<String>,
    /// Data format, e.g. "Steim2"
    pub storage_format: Option<String>,
    pub response: Option<Response>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Overall sensitivity of the whole chain
    pub instrument_sensitivity: Option<Sensitivity>,
    /// Stages in sequence order
    pub stages: Vec<ResponseStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensitivity {
    pub value: f64,
    pub frequency: f64,
    pub input_units: String,
    pub output_units: String,
}

/// One stage of a channel's response chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseStage {
    /// Sequence number, starting at 1
    pub number: u32,
    pub gain: f64,
    pub gain_frequency: f64,
    pub input_units: String,
    pub output_units: String,
    pub transfer: StageTransfer,
    pub decimation: Option<Decimation>,
}

/// Numeric payload of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StageTransfer {
    PolesZeros(PolesZeros),
    Coefficients(Coefficients),
    Fir(Fir),
    /// Gain-only stage (e.g. a preamplifier)
    GainOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolesZeros {
    /// e.g. "LAPLACE (RADIANS/SECOND)"
    pub transfer_function_type: String,
    pub normalization_factor: f64,
    pub normalization_frequency: f64,
    pub zeros: Vec<Complex>,
    pub poles: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    /// e.g. "DIGITAL"
    pub transfer_function_type: String,
    pub numerators: Vec<f64>,
    pub denominators: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fir {
    /// "NONE", "ODD" or "EVEN"
    pub symmetry: String,
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decimation {
    pub input_sample_rate: f64,
    pub factor: u32,
    pub offset: u32,
    /// Seconds
    pub delay: f64,
    /// Seconds
    pub correction: f64,
}
