//! Common test fixtures for station metadata tests.
//!
//! The central scenario is UW.RATT (Rattlesnake Mountain, WA) with one
//! short-period vertical channel, EHZ, installed 2010-01-01 and upgraded
//! 2020-06-01.

use aqms_common::{
    parse_timestamp, Channel, Coefficients, Complex, Decimation, Fir, Inventory, Network,
    PolesZeros, Response, ResponseStage, Sensitivity, StageTransfer, Station, Timestamp,
};

/// Fixed instants used across the suite.
pub mod instants {
    pub const NETWORK_START: &str = "1980-01-01";
    pub const INSTALLED: &str = "2010-01-01";
    pub const UPGRADED: &str = "2020-06-01";
    /// Clock for reconciliation tests, after every fixture epoch starts
    pub const NOW: &str = "2024-01-01";
}

/// Parse a fixture timestamp.
///
/// # Panics
///
/// Panics if `s` is not a valid timestamp.
pub fn ts(s: &str) -> Timestamp {
    parse_timestamp(s).expect("Invalid fixture timestamp")
}

/// The fixed test clock.
pub fn now() -> Timestamp {
    ts(instants::NOW)
}

/// Velocity sensor poles and zeros (L-4C style, 1 Hz).
pub fn pz_stage() -> ResponseStage {
    ResponseStage {
        number: 1,
        gain: 171.0,
        gain_frequency: 5.0,
        input_units: "M/S".into(),
        output_units: "V".into(),
        transfer: StageTransfer::PolesZeros(PolesZeros {
            transfer_function_type: "LAPLACE (RADIANS/SECOND)".into(),
            normalization_factor: 1.0,
            normalization_frequency: 5.0,
            zeros: vec![Complex { re: 0.0, im: 0.0 }, Complex { re: 0.0, im: 0.0 }],
            poles: vec![
                Complex {
                    re: -4.443,
                    im: 4.443,
                },
                Complex {
                    re: -4.443,
                    im: -4.443,
                },
            ],
        }),
        decimation: None,
    }
}

/// Digitizer stage: volts to counts.
pub fn digitizer_stage() -> ResponseStage {
    ResponseStage {
        number: 2,
        gain: 419430.0,
        gain_frequency: 5.0,
        input_units: "V".into(),
        output_units: "COUNTS".into(),
        transfer: StageTransfer::Coefficients(Coefficients {
            transfer_function_type: "DIGITAL".into(),
            numerators: vec![1.0],
            denominators: vec![],
        }),
        decimation: Some(Decimation {
            input_sample_rate: 100.0,
            factor: 1,
            offset: 0,
            delay: 0.0,
            correction: 0.0,
        }),
    }
}

/// Anti-alias FIR stage.
pub fn fir_stage() -> ResponseStage {
    ResponseStage {
        number: 3,
        gain: 1.0,
        gain_frequency: 5.0,
        input_units: "COUNTS".into(),
        output_units: "COUNTS".into(),
        transfer: StageTransfer::Fir(Fir {
            symmetry: "NONE".into(),
            coefficients: vec![0.25, 0.5, 0.25],
        }),
        decimation: Some(Decimation {
            input_sample_rate: 100.0,
            factor: 1,
            offset: 0,
            delay: 0.01,
            correction: 0.01,
        }),
    }
}

/// Full response of the EHZ channel with the given overall sensitivity.
pub fn ehz_response(sensitivity: f64) -> Response {
    Response {
        instrument_sensitivity: Some(Sensitivity {
            value: sensitivity,
            frequency: 5.0,
            input_units: "M/S".into(),
            output_units: "COUNTS".into(),
        }),
        stages: vec![pz_stage(), digitizer_stage(), fir_stage()],
    }
}

/// A channel at RATT.
pub fn channel(code: &str, start: &str, end: Option<&str>) -> Channel {
    let (azimuth, dip) = match code.chars().last() {
        Some('N') => (0.0, 0.0),
        Some('E') => (90.0, 0.0),
        _ => (0.0, -90.0),
    };
    Channel {
        code: code.into(),
        location_code: String::new(),
        start_date: Some(ts(start)),
        end_date: end.map(ts),
        latitude: 46.3871,
        longitude: -119.5913,
        elevation: 1050.0,
        depth: 0.0,
        azimuth: Some(azimuth),
        dip: Some(dip),
        sample_rate: 100.0,
        sensor: Some("L-4C".into()),
        calibration_units: Some("A".into()),
        storage_format: Some("Steim2".into()),
        response: Some(ehz_response(7.17e7)),
    }
}

/// The RATT station with the given channels.
pub fn ratt_station(channels: Vec<Channel>) -> Station {
    Station {
        code: "RATT".into(),
        start_date: Some(ts(instants::INSTALLED)),
        end_date: None,
        latitude: 46.3871,
        longitude: -119.5913,
        elevation: 1050.0,
        site_name: Some("Rattlesnake Mountain, WA".into()),
        channels,
    }
}

/// The UW network with the given stations.
pub fn uw_network(stations: Vec<Station>) -> Network {
    Network {
        code: "UW".into(),
        description: Some("Pacific Northwest Regional Seismic Network".into()),
        start_date: Some(ts(instants::NETWORK_START)),
        end_date: None,
        stations,
    }
}

/// UW.RATT..EHZ, open since 2010-01-01.
pub fn uw_ratt_inventory() -> Inventory {
    let mut inventory = Inventory::new(vec![uw_network(vec![ratt_station(vec![channel(
        "EHZ",
        instants::INSTALLED,
        None,
    )])])]);
    inventory.source = Some("PNSN".into());
    inventory
}

/// UW.RATT..EHZ with a new digitizer gain from 2020-06-01.
///
/// Loaded over [`uw_ratt_inventory`], the 2010 epoch is closed at the
/// upgrade and the new epoch inserted.
pub fn uw_ratt_upgraded_inventory() -> Inventory {
    let mut upgraded = channel("EHZ", instants::UPGRADED, None);
    if let Some(response) = upgraded.response.as_mut() {
        response.stages[1].gain = 1677721.6;
        if let Some(sensitivity) = response.instrument_sensitivity.as_mut() {
            sensitivity.value = 2.87e8;
        }
    }
    Inventory::new(vec![uw_network(vec![ratt_station(vec![upgraded])])])
}

/// UW.RATT with EHZ, EHN and EHE, all open since 2010-01-01.
pub fn uw_ratt_three_component() -> Inventory {
    Inventory::new(vec![uw_network(vec![ratt_station(vec![
        channel("EHZ", instants::INSTALLED, None),
        channel("EHN", instants::INSTALLED, None),
        channel("EHE", instants::INSTALLED, None),
    ])])])
}
