//! Rows back to the inventory capability model.

use std::collections::BTreeMap;

use aqms_common::{
    Channel, ChannelKey, ChannelRecord, Coefficients, Complex, Decimation, Epoch, EpochRow, Fir,
    Inventory, Network, NetworkRow, PolesZeros, Response, ResponseStage, RowCandidate,
    Sensitivity, StageRow, StageTransfer, Station, StationRow, Timestamp, TransferRow,
};

use super::vocab;
use crate::error::MappingError;

/// Rebuild an inventory from flat row candidates.
///
/// Stages are attached to the channel epoch with the same key and start.
/// A stage with no matching channel epoch is an error.
pub fn to_inventory(rows: &[RowCandidate]) -> Result<Inventory, MappingError> {
    let mut networks = Vec::new();
    let mut stations = Vec::new();
    let mut channels: BTreeMap<(ChannelKey, Timestamp), ChannelRecord> = BTreeMap::new();
    let mut stages = Vec::new();

    for row in rows {
        match row {
            RowCandidate::Network(r) => networks.push(r.clone()),
            RowCandidate::Station(r) => stations.push(r.clone()),
            RowCandidate::Channel(r) => {
                channels.insert(
                    (r.key(), r.epoch.start()),
                    ChannelRecord {
                        channel: r.clone(),
                        stages: Vec::new(),
                    },
                );
            }
            RowCandidate::Stage(r) => stages.push(r.clone()),
        }
    }

    for stage in stages {
        let key = stage.channel_key();
        let record = channels
            .get_mut(&(key.clone(), stage.epoch.start()))
            .ok_or_else(|| {
                MappingError::new(
                    format!("{} stage {}", key, stage.stage_seq),
                    "channel",
                    stage.epoch,
                    "no channel epoch with this start",
                )
            })?;
        record.stages.push(stage);
    }

    assemble_inventory(networks, stations, channels.into_values().collect())
}

/// Build the nested inventory from rows already grouped by table.
///
/// Each channel goes under the station epoch containing its start and each
/// station under the network epoch containing its start, falling back to
/// the latest parent epoch starting before it. Stations whose network has no stored epoch get a bare
/// network element.
pub fn assemble_inventory(
    mut networks: Vec<NetworkRow>,
    mut stations: Vec<StationRow>,
    mut channels: Vec<ChannelRecord>,
) -> Result<Inventory, MappingError> {
    networks.sort_by(|a, b| a.net.cmp(&b.net).then(a.epoch.cmp(&b.epoch)));
    stations.sort_by(|a, b| {
        (&a.net, &a.sta)
            .cmp(&(&b.net, &b.sta))
            .then(a.epoch.cmp(&b.epoch))
    });
    channels.sort_by(|a, b| {
        let (a, b) = (&a.channel, &b.channel);
        (&a.location, &a.seedchan)
            .cmp(&(&b.location, &b.seedchan))
            .then(a.epoch.cmp(&b.epoch))
    });

    let mut out: Vec<Network> = networks.iter().map(network_from_row).collect();
    let mut placed: Vec<Station> = stations.iter().map(station_from_row).collect();

    for record in &channels {
        let channel = &record.channel;
        let parent = pick_parent(
            stations
                .iter()
                .enumerate()
                .filter(|(_, s)| s.net == channel.net && s.sta == channel.sta)
                .map(|(i, s)| (i, s.epoch)),
            channel.epoch.start(),
        )
        .ok_or_else(|| {
            MappingError::new(
                channel.key(),
                "station",
                channel.epoch,
                "no station epoch for this channel",
            )
        })?;
        placed[parent].channels.push(channel_from_record(record)?);
    }

    for (station_row, station) in stations.iter().zip(placed) {
        let parent = pick_parent(
            networks
                .iter()
                .enumerate()
                .filter(|(_, n)| n.net == station_row.net)
                .map(|(i, n)| (i, n.epoch)),
            station_row.epoch.start(),
        );
        let index = match parent {
            Some(index) => index,
            None => {
                out.push(Network {
                    code: station_row.net.clone(),
                    ..Default::default()
                });
                networks.push(NetworkRow {
                    net: station_row.net.clone(),
                    description: None,
                    epoch: station_row.epoch,
                });
                out.len() - 1
            }
        };
        out[index].stations.push(station);
    }

    Ok(Inventory::new(out))
}

/// The parent epoch containing `start`, else the latest one starting
/// before it, else the first.
fn pick_parent(
    candidates: impl Iterator<Item = (usize, Epoch)>,
    start: Timestamp,
) -> Option<usize> {
    let mut fallback = None;
    for (index, epoch) in candidates {
        if epoch.contains(start) {
            return Some(index);
        }
        if epoch.start() <= start || fallback.is_none() {
            fallback = Some(index);
        }
    }
    fallback
}

fn network_from_row(row: &NetworkRow) -> Network {
    Network {
        code: row.net.clone(),
        description: row.description.clone(),
        start_date: Some(row.epoch.start()),
        end_date: row.epoch.end(),
        stations: Vec::new(),
    }
}

fn station_from_row(row: &StationRow) -> Station {
    Station {
        code: row.sta.clone(),
        start_date: Some(row.epoch.start()),
        end_date: row.epoch.end(),
        latitude: row.lat,
        longitude: row.lon,
        elevation: row.elev,
        site_name: row.staname.clone(),
        channels: Vec::new(),
    }
}

fn channel_from_record(record: &ChannelRecord) -> Result<Channel, MappingError> {
    let row = &record.channel;
    let label = row.key().to_string();

    let calibration_units = row
        .unit_calib
        .map(|id| vocab::unit_name(&label, "calibration_units", id).map(str::to_string))
        .transpose()?;

    let instrument_sensitivity = row
        .simple_response
        .as_ref()
        .map(|s| -> Result<Sensitivity, MappingError> {
            Ok(Sensitivity {
                value: s.gain,
                frequency: s.frequency,
                input_units: vocab::unit_name(&label, "sensitivity_input_units", s.unit_in)?
                    .to_string(),
                output_units: vocab::unit_name(&label, "sensitivity_output_units", s.unit_out)?
                    .to_string(),
            })
        })
        .transpose()?;

    let mut stages = record.stages.iter().collect::<Vec<_>>();
    stages.sort_by_key(|s| s.stage_seq);
    let stages = stages
        .into_iter()
        .map(|s| stage_from_row(&label, s))
        .collect::<Result<Vec<_>, _>>()?;

    let response = if instrument_sensitivity.is_none() && stages.is_empty() {
        None
    } else {
        Some(Response {
            instrument_sensitivity,
            stages,
        })
    };

    Ok(Channel {
        code: row.seedchan.clone(),
        location_code: row.location.clone(),
        start_date: Some(row.epoch.start()),
        end_date: row.epoch.end(),
        latitude: row.lat,
        longitude: row.lon,
        elevation: row.elev,
        depth: row.edepth,
        azimuth: row.azimuth,
        dip: row.dip,
        sample_rate: row.samprate,
        sensor: row.inid.clone(),
        calibration_units,
        storage_format: row.format.clone(),
        response,
    })
}

fn stage_from_row(channel: &str, row: &StageRow) -> Result<ResponseStage, MappingError> {
    let label = format!("{} stage {}", channel, row.stage_seq);

    let transfer = match &row.transfer {
        TransferRow::PolesZeros {
            tf_type,
            ao,
            af,
            zeros,
            poles,
        } => StageTransfer::PolesZeros(PolesZeros {
            transfer_function_type: vocab::from_code(
                vocab::PZ_TRANSFER_TYPES,
                &label,
                "pz_transfer_function_type",
                tf_type,
            )?,
            normalization_factor: *ao,
            normalization_frequency: *af,
            zeros: zeros.iter().map(|&(re, im)| Complex { re, im }).collect(),
            poles: poles.iter().map(|&(re, im)| Complex { re, im }).collect(),
        }),
        TransferRow::Coefficients {
            tf_type,
            numerators,
            denominators,
        } => StageTransfer::Coefficients(Coefficients {
            transfer_function_type: vocab::from_code(
                vocab::CF_TRANSFER_TYPES,
                &label,
                "cf_transfer_function_type",
                tf_type,
            )?,
            numerators: numerators.clone(),
            denominators: denominators.clone(),
        }),
        TransferRow::Fir {
            symmetry,
            coefficients,
        } => StageTransfer::Fir(Fir {
            symmetry: vocab::from_code(vocab::FIR_SYMMETRY, &label, "fir_symmetry", symmetry)?,
            coefficients: coefficients.clone(),
        }),
        TransferRow::Gain => StageTransfer::GainOnly,
    };

    Ok(ResponseStage {
        number: row.stage_seq,
        gain: row.gain,
        gain_frequency: row.gain_frequency,
        input_units: vocab::unit_name(&label, "input_units", row.unit_in)?.to_string(),
        output_units: vocab::unit_name(&label, "output_units", row.unit_out)?.to_string(),
        transfer,
        decimation: row.decimation.as_ref().map(|d| Decimation {
            input_sample_rate: d.input_rate,
            factor: d.factor,
            offset: d.offset,
            delay: d.delay,
            correction: d.correction,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::to_rows;
    use test_utils::fixtures;

    #[test]
    fn test_rows_round_trip_to_same_inventory() {
        let inventory = fixtures::uw_ratt_inventory();
        let rows = to_rows(&inventory).unwrap();
        let rebuilt = to_inventory(&rows).unwrap();
        assert_eq!(rebuilt.networks, inventory.networks);
    }

    #[test]
    fn test_orphan_stage_is_an_error() {
        let rows = to_rows(&fixtures::uw_ratt_inventory()).unwrap();
        let stages_only: Vec<RowCandidate> = rows
            .into_iter()
            .filter(|r| matches!(r, RowCandidate::Stage(_)))
            .collect();
        let err = to_inventory(&stages_only).unwrap_err();
        assert_eq!(err.field, "channel");
    }

    #[test]
    fn test_station_without_network_row_gets_bare_network() {
        let rows: Vec<RowCandidate> = to_rows(&fixtures::uw_ratt_inventory())
            .unwrap()
            .into_iter()
            .filter(|r| !matches!(r, RowCandidate::Network(_)))
            .collect();
        let inventory = to_inventory(&rows).unwrap();
        assert_eq!(inventory.networks.len(), 1);
        assert_eq!(inventory.networks[0].code, "UW");
        assert_eq!(inventory.networks[0].description, None);
        assert_eq!(inventory.station_count(), 1);
    }
}
