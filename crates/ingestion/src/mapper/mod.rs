//! Inventory ⇄ AQMS row mapping.
//!
//! Pure functions: no I/O, no clock. Floating-point values pass through
//! untouched. Enumerated values are translated with the tables in
//! [`vocab`]; anything outside them fails with a [`MappingError`] naming
//! the entity, field and value.

mod reverse;
pub mod vocab;

use aqms_common::{
    Channel, ChannelKey, ChannelRecord, ChannelRow, DecimationRow, Epoch, Inventory, Network,
    NetworkRow, ResponseStage, RowCandidate, SimpleResponse, StageRow, StageTransfer, Station,
    StationKey, StationRow, Timestamp, TransferRow,
};

use crate::error::MappingError;

pub use reverse::{assemble_inventory, to_inventory};

/// A network and everything below it, as rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedNetwork {
    pub row: NetworkRow,
    pub stations: Vec<MappedStation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedStation {
    pub row: StationRow,
    pub channels: Vec<ChannelRecord>,
}

impl MappedNetwork {
    /// Flatten into row candidates, parents before children.
    pub fn into_rows(self) -> Vec<RowCandidate> {
        let mut rows = vec![RowCandidate::Network(self.row)];
        for station in self.stations {
            rows.push(RowCandidate::Station(station.row));
            for record in station.channels {
                rows.push(RowCandidate::Channel(record.channel));
                rows.extend(record.stages.into_iter().map(RowCandidate::Stage));
            }
        }
        rows
    }
}

/// Map a whole inventory into row candidates.
pub fn to_rows(inventory: &Inventory) -> Result<Vec<RowCandidate>, MappingError> {
    Ok(map_inventory(inventory)?
        .into_iter()
        .flat_map(MappedNetwork::into_rows)
        .collect())
}

/// Map a whole inventory, keeping the hierarchy.
pub fn map_inventory(inventory: &Inventory) -> Result<Vec<MappedNetwork>, MappingError> {
    inventory.networks.iter().map(map_network).collect()
}

pub fn map_network(network: &Network) -> Result<MappedNetwork, MappingError> {
    let code = network.code.trim();
    let valid = (2..=8).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !valid {
        return Err(MappingError::new(
            code,
            "network_code",
            &network.code,
            "expected 2-8 uppercase letters or digits",
        ));
    }

    // A network without a start date begins with its earliest station.
    let start = match network.start_date {
        Some(start) => start,
        None => network
            .stations
            .iter()
            .filter_map(|s| s.start_date)
            .min()
            .ok_or_else(|| {
                MappingError::new(code, "start_date", "", "network has no start date")
            })?,
    };
    let epoch = Epoch::new(start, network.end_date)
        .map_err(|e| MappingError::from_epoch(code, "end_date", e))?;

    let stations = network
        .stations
        .iter()
        .map(|s| map_station(code, s))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MappedNetwork {
        row: NetworkRow {
            net: code.to_string(),
            description: network.description.clone(),
            epoch,
        },
        stations,
    })
}

pub fn map_station(net: &str, station: &Station) -> Result<MappedStation, MappingError> {
    let key = StationKey::new(net, station.code.trim());
    let label = key.to_string();

    let valid = (1..=5).contains(&key.station.len())
        && key.station.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(MappingError::new(
            &label,
            "station_code",
            &station.code,
            "expected 1-5 letters or digits",
        ));
    }

    let start = required_start(&label, station.start_date)?;
    let epoch = Epoch::new(start, station.end_date)
        .map_err(|e| MappingError::from_epoch(&label, "end_date", e))?;

    check_coordinates(&label, station.latitude, station.longitude, station.elevation)?;

    let row = StationRow {
        net: key.network.clone(),
        sta: key.station.clone(),
        epoch,
        lat: station.latitude,
        lon: station.longitude,
        elev: station.elevation,
        staname: station.site_name.clone(),
    };

    let channels = station
        .channels
        .iter()
        .map(|c| map_channel(&key, start, c))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MappedStation { row, channels })
}

/// Map one channel epoch and its response.
///
/// A channel without its own start date inherits `station_start`.
pub fn map_channel(
    station: &StationKey,
    station_start: Timestamp,
    channel: &Channel,
) -> Result<ChannelRecord, MappingError> {
    let location = normalize_location(&channel.location_code);
    let key = station.channel(location, channel.code.trim());
    let label = key.to_string();

    if key.location.len() > 2 || !key.location.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MappingError::new(
            &label,
            "location_code",
            &channel.location_code,
            "expected at most two letters or digits",
        ));
    }
    vocab::validate_channel_code(&label, &key.channel)?;

    let start = channel.start_date.unwrap_or(station_start);
    let epoch = Epoch::new(start, channel.end_date)
        .map_err(|e| MappingError::from_epoch(&label, "end_date", e))?;

    check_coordinates(&label, channel.latitude, channel.longitude, channel.elevation)?;
    check_finite(&label, "depth", channel.depth)?;
    if let Some(azimuth) = channel.azimuth {
        check_range(&label, "azimuth", azimuth, 0.0, 360.0)?;
    }
    if let Some(dip) = channel.dip {
        check_range(&label, "dip", dip, -90.0, 90.0)?;
    }
    if !channel.sample_rate.is_finite() || channel.sample_rate < 0.0 {
        return Err(MappingError::new(
            &label,
            "sample_rate",
            channel.sample_rate,
            "expected a non-negative number",
        ));
    }

    let unit_calib = channel
        .calibration_units
        .as_deref()
        .map(|u| vocab::unit_id(&label, "calibration_units", u))
        .transpose()?;

    let response = channel.response.as_ref();
    let simple_response = response
        .and_then(|r| r.instrument_sensitivity.as_ref())
        .map(|s| -> Result<SimpleResponse, MappingError> {
            check_finite(&label, "instrument_sensitivity", s.value)?;
            check_finite(&label, "sensitivity_frequency", s.frequency)?;
            Ok(SimpleResponse {
                gain: s.value,
                frequency: s.frequency,
                unit_in: vocab::unit_id(&label, "sensitivity_input_units", &s.input_units)?,
                unit_out: vocab::unit_id(&label, "sensitivity_output_units", &s.output_units)?,
            })
        })
        .transpose()?;

    let row = ChannelRow {
        net: key.network.clone(),
        sta: key.station.clone(),
        location: key.location.clone(),
        seedchan: key.channel.clone(),
        epoch,
        lat: channel.latitude,
        lon: channel.longitude,
        elev: channel.elevation,
        edepth: channel.depth,
        azimuth: channel.azimuth,
        dip: channel.dip,
        samprate: channel.sample_rate,
        inid: channel.sensor.clone(),
        unit_calib,
        format: channel.storage_format.clone(),
        simple_response,
    };

    let mut stages: Vec<&ResponseStage> = response.map(|r| r.stages.iter().collect()).unwrap_or_default();
    stages.sort_by_key(|s| s.number);
    for (expected, stage) in (1u32..).zip(&stages) {
        if stage.number != expected {
            return Err(MappingError::new(
                &label,
                "stage_sequence_number",
                stage.number,
                format!("stage numbers must be contiguous from 1; expected {}", expected),
            ));
        }
    }

    let stages = stages
        .into_iter()
        .map(|s| map_stage(&row, &key, s))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChannelRecord {
        channel: row,
        stages,
    })
}

/// Map one response stage. The stage takes its channel's epoch.
pub fn map_stage(
    channel: &ChannelRow,
    key: &ChannelKey,
    stage: &ResponseStage,
) -> Result<StageRow, MappingError> {
    let label = format!("{} stage {}", key, stage.number);

    check_finite(&label, "gain", stage.gain)?;
    check_finite(&label, "gain_frequency", stage.gain_frequency)?;

    let transfer = match &stage.transfer {
        StageTransfer::PolesZeros(pz) => TransferRow::PolesZeros {
            tf_type: vocab::to_code(
                vocab::PZ_TRANSFER_TYPES,
                &label,
                "pz_transfer_function_type",
                &pz.transfer_function_type,
            )?,
            ao: pz.normalization_factor,
            af: pz.normalization_frequency,
            zeros: pz.zeros.iter().map(|z| (z.re, z.im)).collect(),
            poles: pz.poles.iter().map(|p| (p.re, p.im)).collect(),
        },
        StageTransfer::Coefficients(cf) => TransferRow::Coefficients {
            tf_type: vocab::to_code(
                vocab::CF_TRANSFER_TYPES,
                &label,
                "cf_transfer_function_type",
                &cf.transfer_function_type,
            )?,
            numerators: cf.numerators.clone(),
            denominators: cf.denominators.clone(),
        },
        StageTransfer::Fir(fir) => TransferRow::Fir {
            symmetry: vocab::to_code(vocab::FIR_SYMMETRY, &label, "fir_symmetry", &fir.symmetry)?,
            coefficients: fir.coefficients.clone(),
        },
        StageTransfer::GainOnly => TransferRow::Gain,
    };

    let decimation = match &stage.decimation {
        Some(d) => {
            if d.factor == 0 {
                return Err(MappingError::new(
                    &label,
                    "decimation_factor",
                    d.factor,
                    "expected at least 1",
                ));
            }
            Some(DecimationRow {
                input_rate: d.input_sample_rate,
                factor: d.factor,
                offset: d.offset,
                delay: d.delay,
                correction: d.correction,
            })
        }
        None => None,
    };

    Ok(StageRow {
        net: channel.net.clone(),
        sta: channel.sta.clone(),
        location: channel.location.clone(),
        seedchan: channel.seedchan.clone(),
        epoch: channel.epoch,
        stage_seq: stage.number,
        gain: stage.gain,
        gain_frequency: stage.gain_frequency,
        unit_in: vocab::unit_id(&label, "input_units", &stage.input_units)?,
        unit_out: vocab::unit_id(&label, "output_units", &stage.output_units)?,
        transfer,
        decimation,
    })
}

/// "--" and whitespace both mean a blank location.
fn normalize_location(location: &str) -> String {
    let trimmed = location.trim();
    if trimmed == "--" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn required_start(label: &str, start: Option<Timestamp>) -> Result<Timestamp, MappingError> {
    start.ok_or_else(|| MappingError::new(label, "start_date", "", "start date is required"))
}

fn check_finite(label: &str, field: &'static str, value: f64) -> Result<(), MappingError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MappingError::new(label, field, value, "expected a finite number"))
    }
}

fn check_range(
    label: &str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), MappingError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(MappingError::new(
            label,
            field,
            value,
            format!("expected a value in [{}, {}]", min, max),
        ))
    }
}

fn check_coordinates(label: &str, lat: f64, lon: f64, elev: f64) -> Result<(), MappingError> {
    check_range(label, "latitude", lat, -90.0, 90.0)?;
    check_range(label, "longitude", lon, -180.0, 180.0)?;
    check_finite(label, "elevation", elev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqms_common::parse_timestamp;
    use test_utils::fixtures;

    #[test]
    fn test_rows_are_ordered_parent_first() {
        let rows = to_rows(&fixtures::uw_ratt_inventory()).unwrap();
        assert!(matches!(rows[0], RowCandidate::Network(_)));
        assert!(matches!(rows[1], RowCandidate::Station(_)));
        assert!(matches!(rows[2], RowCandidate::Channel(_)));
        assert!(rows[3..]
            .iter()
            .any(|r| matches!(r, RowCandidate::Stage(_))));
    }

    #[test]
    fn test_stage_shares_channel_epoch() {
        let mapped = map_inventory(&fixtures::uw_ratt_inventory()).unwrap();
        let record = &mapped[0].stations[0].channels[0];
        assert!(!record.stages.is_empty());
        for stage in &record.stages {
            assert_eq!(stage.epoch, record.channel.epoch);
        }
    }

    #[test]
    fn test_network_start_defaults_to_earliest_station() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].start_date = None;
        let mapped = map_network(&inventory.networks[0]).unwrap();
        assert_eq!(
            mapped.row.epoch.start(),
            parse_timestamp("2010-01-01").unwrap()
        );
    }

    #[test]
    fn test_channel_inherits_station_start() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].stations[0].channels[0].start_date = None;
        let mapped = map_inventory(&inventory).unwrap();
        assert_eq!(
            mapped[0].stations[0].channels[0].channel.epoch.start(),
            parse_timestamp("2010-01-01").unwrap()
        );
    }

    #[test]
    fn test_zero_length_epoch_rejected() {
        let mut inventory = fixtures::uw_ratt_inventory();
        let station = &mut inventory.networks[0].stations[0];
        station.end_date = station.start_date;
        let err = map_inventory(&inventory).unwrap_err();
        assert_eq!(err.field, "end_date");
        assert_eq!(err.entity, "UW.RATT");
    }

    #[test]
    fn test_unknown_orientation_rejected() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].stations[0].channels[0].code = "EHX".into();
        let err = map_inventory(&inventory).unwrap_err();
        assert_eq!(err.field, "orientation_code");
        assert_eq!(err.value, "X");
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let mut inventory = fixtures::uw_ratt_inventory();
        let response = inventory.networks[0].stations[0].channels[0]
            .response
            .as_mut()
            .unwrap();
        response.stages[0].input_units = "furlongs/fortnight".into();
        let err = map_inventory(&inventory).unwrap_err();
        assert_eq!(err.field, "input_units");
        assert_eq!(err.value, "furlongs/fortnight");
        assert!(err.entity.ends_with("stage 1"));
    }

    #[test]
    fn test_non_contiguous_stages_rejected() {
        let mut inventory = fixtures::uw_ratt_inventory();
        let response = inventory.networks[0].stations[0].channels[0]
            .response
            .as_mut()
            .unwrap();
        response.stages[1].number = 3;
        let err = map_inventory(&inventory).unwrap_err();
        assert_eq!(err.field, "stage_sequence_number");
    }

    #[test]
    fn test_out_of_range_latitude_rejected() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].stations[0].latitude = 91.0;
        let err = map_inventory(&inventory).unwrap_err();
        assert_eq!(err.field, "latitude");
    }

    #[test]
    fn test_dashes_mean_blank_location() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].stations[0].channels[0].location_code = "--".into();
        let mapped = map_inventory(&inventory).unwrap();
        assert_eq!(mapped[0].stations[0].channels[0].channel.location, "");
    }

    #[test]
    fn test_bad_network_code_rejected() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].code = "U".into();
        let err = map_inventory(&inventory).unwrap_err();
        assert_eq!(err.field, "network_code");
    }
}
