//! AQMS station metadata tables in PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use aqms_common::{
    ChannelKey, ChannelRecord, ChannelRow, DecimationRow, Epoch, EpochRow, NetworkRow,
    SimpleResponse, StageRow, StationKey, StationRow, Timestamp, TransferRow,
};

use crate::error::{StoreError, StoreResult};
use crate::session::{from_offdate, to_offdate, Session, Store};

/// AQMS stores a blank location code as two spaces.
const BLANK_LOCATION: &str = "  ";

fn to_db_location(location: &str) -> &str {
    if location.trim().is_empty() {
        BLANK_LOCATION
    } else {
        location
    }
}

fn from_db_location(location: String) -> String {
    if location.trim().is_empty() {
        String::new()
    } else {
        location
    }
}

/// Connection pool for the AQMS database.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store from a database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create the station metadata tables if they do not exist.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Database(format!("Migration failed: {}", e)))?;
            }
        }
        info!("Station metadata schema is up to date");
        Ok(())
    }

    /// Populate `d_unit` with `(id, name, description)` entries.
    pub async fn seed_units(&self, units: &[(i32, &str, &str)]) -> StoreResult<()> {
        for (id, name, description) in units {
            sqlx::query(
                "INSERT INTO d_unit (id, name, description) VALUES ($1, $2, $3) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
                 description = EXCLUDED.description",
            )
            .bind(id)
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;
        }
        debug!(count = units.len(), "Seeded d_unit");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn Session>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgSession { tx }))
    }
}

/// One repeatable-read transaction.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[derive(FromRow)]
struct DbNetwork {
    net: String,
    description: Option<String>,
    ondate: DateTime<Utc>,
    offdate: DateTime<Utc>,
}

#[derive(FromRow)]
struct DbStation {
    net: String,
    sta: String,
    ondate: DateTime<Utc>,
    offdate: DateTime<Utc>,
    lat: f64,
    lon: f64,
    elev: f64,
    staname: Option<String>,
}

#[derive(FromRow)]
struct DbChannel {
    net: String,
    sta: String,
    seedchan: String,
    location: String,
    ondate: DateTime<Utc>,
    offdate: DateTime<Utc>,
    lat: f64,
    lon: f64,
    elev: f64,
    edepth: f64,
    azimuth: Option<f64>,
    dip: Option<f64>,
    samprate: f64,
    inid: Option<String>,
    unit_calib: Option<i32>,
    format: Option<String>,
    sr_gain: Option<f64>,
    sr_frequency: Option<f64>,
    sr_unit_in: Option<i32>,
    sr_unit_out: Option<i32>,
}

#[derive(FromRow)]
struct DbStage {
    net: String,
    sta: String,
    seedchan: String,
    location: String,
    ondate: DateTime<Utc>,
    offdate: DateTime<Utc>,
    stage_seq: i32,
    gain: f64,
    gain_frequency: f64,
    unit_in: i32,
    unit_out: i32,
    tf_kind: String,
    tf_type: Option<String>,
    ao: Option<f64>,
    af: Option<f64>,
    zeros_re: Option<Vec<f64>>,
    zeros_im: Option<Vec<f64>>,
    poles_re: Option<Vec<f64>>,
    poles_im: Option<Vec<f64>>,
    numerators: Option<Vec<f64>>,
    denominators: Option<Vec<f64>>,
    symmetry: Option<String>,
    fir_coefficients: Option<Vec<f64>>,
    dec_input_rate: Option<f64>,
    dec_factor: Option<i32>,
    dec_offset: Option<i32>,
    dec_delay: Option<f64>,
    dec_correction: Option<f64>,
}

fn epoch_of(
    table: &'static str,
    ondate: DateTime<Utc>,
    offdate: DateTime<Utc>,
) -> StoreResult<Epoch> {
    Epoch::new(ondate, from_offdate(offdate)).map_err(|e| StoreError::Corrupt {
        table,
        message: e.to_string(),
    })
}

impl TryFrom<DbNetwork> for NetworkRow {
    type Error = StoreError;

    fn try_from(row: DbNetwork) -> StoreResult<Self> {
        Ok(NetworkRow {
            epoch: epoch_of("d_network", row.ondate, row.offdate)?,
            net: row.net,
            description: row.description,
        })
    }
}

impl TryFrom<DbStation> for StationRow {
    type Error = StoreError;

    fn try_from(row: DbStation) -> StoreResult<Self> {
        Ok(StationRow {
            epoch: epoch_of("station_data", row.ondate, row.offdate)?,
            net: row.net,
            sta: row.sta,
            lat: row.lat,
            lon: row.lon,
            elev: row.elev,
            staname: row.staname,
        })
    }
}

impl TryFrom<DbChannel> for ChannelRow {
    type Error = StoreError;

    fn try_from(row: DbChannel) -> StoreResult<Self> {
        let simple_response = match (row.sr_gain, row.sr_frequency, row.sr_unit_in, row.sr_unit_out)
        {
            (Some(gain), Some(frequency), Some(unit_in), Some(unit_out)) => Some(SimpleResponse {
                gain,
                frequency,
                unit_in,
                unit_out,
            }),
            _ => None,
        };

        Ok(ChannelRow {
            epoch: epoch_of("channel_data", row.ondate, row.offdate)?,
            net: row.net,
            sta: row.sta,
            location: from_db_location(row.location),
            seedchan: row.seedchan,
            lat: row.lat,
            lon: row.lon,
            elev: row.elev,
            edepth: row.edepth,
            azimuth: row.azimuth,
            dip: row.dip,
            samprate: row.samprate,
            inid: row.inid,
            unit_calib: row.unit_calib,
            format: row.format,
            simple_response,
        })
    }
}

fn zip_complex(re: Option<Vec<f64>>, im: Option<Vec<f64>>) -> StoreResult<Vec<(f64, f64)>> {
    let re = re.unwrap_or_default();
    let im = im.unwrap_or_default();
    if re.len() != im.len() {
        return Err(StoreError::Corrupt {
            table: "response_stage",
            message: format!("{} real parts but {} imaginary parts", re.len(), im.len()),
        });
    }
    Ok(re.into_iter().zip(im).collect())
}

fn missing(column: &str) -> StoreError {
    StoreError::Corrupt {
        table: "response_stage",
        message: format!("{} is NULL", column),
    }
}

fn unsigned(column: &str, value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt {
        table: "response_stage",
        message: format!("{} is negative ({})", column, value),
    })
}

impl TryFrom<DbStage> for StageRow {
    type Error = StoreError;

    fn try_from(row: DbStage) -> StoreResult<Self> {
        let transfer = match row.tf_kind.as_str() {
            "PZ" => TransferRow::PolesZeros {
                tf_type: row.tf_type.ok_or_else(|| missing("tf_type"))?,
                ao: row.ao.ok_or_else(|| missing("ao"))?,
                af: row.af.ok_or_else(|| missing("af"))?,
                zeros: zip_complex(row.zeros_re, row.zeros_im)?,
                poles: zip_complex(row.poles_re, row.poles_im)?,
            },
            "COEFF" => TransferRow::Coefficients {
                tf_type: row.tf_type.ok_or_else(|| missing("tf_type"))?,
                numerators: row.numerators.unwrap_or_default(),
                denominators: row.denominators.unwrap_or_default(),
            },
            "FIR" => TransferRow::Fir {
                symmetry: row.symmetry.ok_or_else(|| missing("symmetry"))?,
                coefficients: row.fir_coefficients.unwrap_or_default(),
            },
            "GAIN" => TransferRow::Gain,
            other => {
                return Err(StoreError::Corrupt {
                    table: "response_stage",
                    message: format!("unknown tf_kind '{}'", other),
                })
            }
        };

        let decimation = match (row.dec_input_rate, row.dec_factor) {
            (Some(input_rate), Some(factor)) => Some(DecimationRow {
                input_rate,
                factor: unsigned("dec_factor", factor)?,
                offset: unsigned("dec_offset", row.dec_offset.unwrap_or(0))?,
                delay: row.dec_delay.unwrap_or(0.0),
                correction: row.dec_correction.unwrap_or(0.0),
            }),
            _ => None,
        };

        Ok(StageRow {
            epoch: epoch_of("response_stage", row.ondate, row.offdate)?,
            net: row.net,
            sta: row.sta,
            location: from_db_location(row.location),
            seedchan: row.seedchan,
            stage_seq: unsigned("stage_seq", row.stage_seq)?,
            gain: row.gain,
            gain_frequency: row.gain_frequency,
            unit_in: row.unit_in,
            unit_out: row.unit_out,
            transfer,
            decimation,
        })
    }
}

const CHANNEL_SELECT: &str = "SELECT c.net, c.sta, c.seedchan, c.location, c.ondate, c.offdate, \
     c.lat, c.lon, c.elev, c.edepth, c.azimuth, c.dip, c.samprate, c.inid, c.unit_calib, c.format, \
     s.gain AS sr_gain, s.gain_frequency AS sr_frequency, \
     s.unit_in AS sr_unit_in, s.unit_out AS sr_unit_out \
     FROM channel_data c \
     LEFT JOIN simple_response s \
     ON s.net = c.net AND s.sta = c.sta AND s.seedchan = c.seedchan \
     AND s.location = c.location AND s.ondate = c.ondate";

const STAGE_SELECT: &str = "SELECT net, sta, seedchan, location, ondate, offdate, stage_seq, \
     gain, gain_frequency, unit_in, unit_out, tf_kind, tf_type, ao, af, \
     zeros_re, zeros_im, poles_re, poles_im, numerators, denominators, \
     symmetry, fir_coefficients, \
     dec_input_rate, dec_factor, dec_offset, dec_delay, dec_correction \
     FROM response_stage";

fn collect<D, R>(rows: Vec<D>) -> StoreResult<Vec<R>>
where
    R: TryFrom<D, Error = StoreError>,
{
    rows.into_iter().map(R::try_from).collect()
}

#[async_trait]
impl Session for PgSession {
    async fn network_epochs(&mut self, net: &str) -> StoreResult<Vec<NetworkRow>> {
        let rows = sqlx::query_as::<_, DbNetwork>(
            "SELECT net, description, ondate, offdate FROM d_network \
             WHERE net = $1 ORDER BY ondate",
        )
        .bind(net)
        .fetch_all(&mut *self.tx)
        .await?;
        collect(rows)
    }

    async fn station_epochs(&mut self, key: &StationKey) -> StoreResult<Vec<StationRow>> {
        let rows = sqlx::query_as::<_, DbStation>(
            "SELECT net, sta, ondate, offdate, lat, lon, elev, staname FROM station_data \
             WHERE net = $1 AND sta = $2 ORDER BY ondate",
        )
        .bind(&key.network)
        .bind(&key.station)
        .fetch_all(&mut *self.tx)
        .await?;
        collect(rows)
    }

    async fn channel_epochs(&mut self, station: &StationKey) -> StoreResult<Vec<ChannelRecord>> {
        let channels: Vec<ChannelRow> = collect(
            sqlx::query_as::<_, DbChannel>(&format!(
                "{} WHERE c.net = $1 AND c.sta = $2 \
                 ORDER BY c.location, c.seedchan, c.ondate",
                CHANNEL_SELECT
            ))
            .bind(&station.network)
            .bind(&station.station)
            .fetch_all(&mut *self.tx)
            .await?,
        )?;

        let stages: Vec<StageRow> = collect(
            sqlx::query_as::<_, DbStage>(&format!(
                "{} WHERE net = $1 AND sta = $2 \
                 ORDER BY location, seedchan, ondate, stage_seq",
                STAGE_SELECT
            ))
            .bind(&station.network)
            .bind(&station.station)
            .fetch_all(&mut *self.tx)
            .await?,
        )?;

        Ok(channels
            .into_iter()
            .map(|channel| {
                let key = channel.key();
                let stages = stages
                    .iter()
                    .filter(|s| s.channel_key() == key && s.epoch.start() == channel.epoch.start())
                    .cloned()
                    .collect();
                ChannelRecord { channel, stages }
            })
            .collect())
    }

    async fn list_networks(&mut self) -> StoreResult<Vec<NetworkRow>> {
        let rows = sqlx::query_as::<_, DbNetwork>(
            "SELECT net, description, ondate, offdate FROM d_network ORDER BY net, ondate",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        collect(rows)
    }

    async fn list_stations(&mut self, net: Option<&str>) -> StoreResult<Vec<StationRow>> {
        let rows = sqlx::query_as::<_, DbStation>(
            "SELECT net, sta, ondate, offdate, lat, lon, elev, staname FROM station_data \
             WHERE ($1::VARCHAR IS NULL OR net = $1) ORDER BY net, sta, ondate",
        )
        .bind(net)
        .fetch_all(&mut *self.tx)
        .await?;
        collect(rows)
    }

    async fn insert_network(&mut self, row: &NetworkRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO d_network (net, description, ondate, offdate) VALUES ($1, $2, $3, $4)",
        )
        .bind(&row.net)
        .bind(&row.description)
        .bind(row.epoch.start())
        .bind(to_offdate(row.epoch.end()))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_station(&mut self, row: &StationRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO station_data (
                net, sta, ondate, offdate, lat, lon, elev, staname
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&row.net)
        .bind(&row.sta)
        .bind(row.epoch.start())
        .bind(to_offdate(row.epoch.end()))
        .bind(row.lat)
        .bind(row.lon)
        .bind(row.elev)
        .bind(&row.staname)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_channel(&mut self, row: &ChannelRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_data (
                net, sta, seedchan, location, ondate, offdate,
                lat, lon, elev, edepth, azimuth, dip, samprate,
                inid, unit_calib, format
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16
            )
            "#,
        )
        .bind(&row.net)
        .bind(&row.sta)
        .bind(&row.seedchan)
        .bind(to_db_location(&row.location))
        .bind(row.epoch.start())
        .bind(to_offdate(row.epoch.end()))
        .bind(row.lat)
        .bind(row.lon)
        .bind(row.elev)
        .bind(row.edepth)
        .bind(row.azimuth)
        .bind(row.dip)
        .bind(row.samprate)
        .bind(&row.inid)
        .bind(row.unit_calib)
        .bind(&row.format)
        .execute(&mut *self.tx)
        .await?;

        if let Some(sr) = &row.simple_response {
            sqlx::query(
                r#"
                INSERT INTO simple_response (
                    net, sta, seedchan, location, ondate, offdate,
                    gain, gain_frequency, unit_in, unit_out
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(&row.net)
            .bind(&row.sta)
            .bind(&row.seedchan)
            .bind(to_db_location(&row.location))
            .bind(row.epoch.start())
            .bind(to_offdate(row.epoch.end()))
            .bind(sr.gain)
            .bind(sr.frequency)
            .bind(sr.unit_in)
            .bind(sr.unit_out)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn insert_stage(&mut self, row: &StageRow) -> StoreResult<()> {
        let mut tf_type: Option<&str> = None;
        let (mut ao, mut af) = (None, None);
        let (mut zeros_re, mut zeros_im, mut poles_re, mut poles_im) = (None, None, None, None);
        let (mut numerators, mut denominators) = (None, None);
        let (mut symmetry, mut fir_coefficients): (Option<&str>, Option<&Vec<f64>>) = (None, None);

        match &row.transfer {
            TransferRow::PolesZeros {
                tf_type: t,
                ao: a,
                af: f,
                zeros,
                poles,
            } => {
                tf_type = Some(t.as_str());
                ao = Some(*a);
                af = Some(*f);
                zeros_re = Some(zeros.iter().map(|z| z.0).collect::<Vec<_>>());
                zeros_im = Some(zeros.iter().map(|z| z.1).collect::<Vec<_>>());
                poles_re = Some(poles.iter().map(|p| p.0).collect::<Vec<_>>());
                poles_im = Some(poles.iter().map(|p| p.1).collect::<Vec<_>>());
            }
            TransferRow::Coefficients {
                tf_type: t,
                numerators: n,
                denominators: d,
            } => {
                tf_type = Some(t.as_str());
                numerators = Some(n);
                denominators = Some(d);
            }
            TransferRow::Fir {
                symmetry: s,
                coefficients,
            } => {
                symmetry = Some(s.as_str());
                fir_coefficients = Some(coefficients);
            }
            TransferRow::Gain => {}
        }

        let dec = row.decimation.as_ref();

        sqlx::query(
            r#"
            INSERT INTO response_stage (
                net, sta, seedchan, location, ondate, offdate, stage_seq,
                gain, gain_frequency, unit_in, unit_out,
                tf_kind, tf_type, ao, af,
                zeros_re, zeros_im, poles_re, poles_im,
                numerators, denominators, symmetry, fir_coefficients,
                dec_input_rate, dec_factor, dec_offset, dec_delay, dec_correction
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11,
                $12, $13, $14, $15,
                $16, $17, $18, $19,
                $20, $21, $22, $23,
                $24, $25, $26, $27, $28
            )
            "#,
        )
        .bind(&row.net)
        .bind(&row.sta)
        .bind(&row.seedchan)
        .bind(to_db_location(&row.location))
        .bind(row.epoch.start())
        .bind(to_offdate(row.epoch.end()))
        .bind(row.stage_seq as i32)
        .bind(row.gain)
        .bind(row.gain_frequency)
        .bind(row.unit_in)
        .bind(row.unit_out)
        .bind(row.transfer.kind())
        .bind(tf_type)
        .bind(ao)
        .bind(af)
        .bind(zeros_re)
        .bind(zeros_im)
        .bind(poles_re)
        .bind(poles_im)
        .bind(numerators)
        .bind(denominators)
        .bind(symmetry)
        .bind(fir_coefficients)
        .bind(dec.map(|d| d.input_rate))
        .bind(dec.map(|d| d.factor as i32))
        .bind(dec.map(|d| d.offset as i32))
        .bind(dec.map(|d| d.delay))
        .bind(dec.map(|d| d.correction))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_network_end(
        &mut self,
        net: &str,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE d_network SET offdate = $3, lddate = NOW() WHERE net = $1 AND ondate = $2",
        )
        .bind(net)
        .bind(start)
        .bind(to_offdate(end))
        .execute(&mut *self.tx)
        .await?;
        expect_one(result.rows_affected(), || format!("network {} starting {}", net, start))
    }

    async fn set_station_end(
        &mut self,
        key: &StationKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE station_data SET offdate = $4, lddate = NOW() \
             WHERE net = $1 AND sta = $2 AND ondate = $3",
        )
        .bind(&key.network)
        .bind(&key.station)
        .bind(start)
        .bind(to_offdate(end))
        .execute(&mut *self.tx)
        .await?;
        expect_one(result.rows_affected(), || format!("station {} starting {}", key, start))
    }

    async fn set_channel_end(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()> {
        let offdate = to_offdate(end);
        let result = sqlx::query(
            "UPDATE channel_data SET offdate = $6, lddate = NOW() \
             WHERE net = $1 AND sta = $2 AND seedchan = $3 AND location = $4 AND ondate = $5",
        )
        .bind(&key.network)
        .bind(&key.station)
        .bind(&key.channel)
        .bind(to_db_location(&key.location))
        .bind(start)
        .bind(offdate)
        .execute(&mut *self.tx)
        .await?;
        expect_one(result.rows_affected(), || format!("channel {} starting {}", key, start))?;

        sqlx::query(
            "UPDATE simple_response SET offdate = $6, lddate = NOW() \
             WHERE net = $1 AND sta = $2 AND seedchan = $3 AND location = $4 AND ondate = $5",
        )
        .bind(&key.network)
        .bind(&key.station)
        .bind(&key.channel)
        .bind(to_db_location(&key.location))
        .bind(start)
        .bind(offdate)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_stages_end(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE response_stage SET offdate = $6, lddate = NOW() \
             WHERE net = $1 AND sta = $2 AND seedchan = $3 AND location = $4 AND ondate = $5",
        )
        .bind(&key.network)
        .bind(&key.station)
        .bind(&key.channel)
        .bind(to_db_location(&key.location))
        .bind(start)
        .bind(to_offdate(end))
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_station_epoch(
        &mut self,
        key: &StationKey,
        start: Timestamp,
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM station_data WHERE net = $1 AND sta = $2 AND ondate = $3")
                .bind(&key.network)
                .bind(&key.station)
                .bind(start)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_channel_epoch(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
    ) -> StoreResult<u64> {
        let mut stages = 0;
        for table in ["response_stage", "simple_response", "channel_data"] {
            let result = sqlx::query(&format!(
                "DELETE FROM {} WHERE net = $1 AND sta = $2 AND seedchan = $3 \
                 AND location = $4 AND ondate = $5",
                table
            ))
            .bind(&key.network)
            .bind(&key.station)
            .bind(&key.channel)
            .bind(to_db_location(&key.location))
            .bind(start)
            .execute(&mut *self.tx)
            .await?;
            if table == "response_stage" {
                stages = result.rows_affected();
            }
        }
        Ok(stages)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn expect_one(affected: u64, what: impl FnOnce() -> String) -> StoreResult<()> {
    if affected == 0 {
        return Err(StoreError::NotFound(what()));
    }
    Ok(())
}

/// Station metadata schema.
///
/// Open epochs carry `offdate = 3000-01-01`, as elsewhere in AQMS.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS d_unit (
    id INTEGER PRIMARY KEY,
    name VARCHAR(80) NOT NULL UNIQUE,
    description VARCHAR(70)
);

CREATE TABLE IF NOT EXISTS d_network (
    net VARCHAR(8) NOT NULL,
    description VARCHAR(200),
    ondate TIMESTAMPTZ NOT NULL,
    offdate TIMESTAMPTZ NOT NULL,
    lddate TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (net, ondate)
);

CREATE TABLE IF NOT EXISTS station_data (
    net VARCHAR(8) NOT NULL,
    sta VARCHAR(6) NOT NULL,
    ondate TIMESTAMPTZ NOT NULL,
    offdate TIMESTAMPTZ NOT NULL,
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    elev DOUBLE PRECISION NOT NULL,
    staname VARCHAR(50),
    lddate TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (net, sta, ondate)
);

CREATE TABLE IF NOT EXISTS channel_data (
    net VARCHAR(8) NOT NULL,
    sta VARCHAR(6) NOT NULL,
    seedchan VARCHAR(3) NOT NULL,
    location VARCHAR(2) NOT NULL,
    ondate TIMESTAMPTZ NOT NULL,
    offdate TIMESTAMPTZ NOT NULL,
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    elev DOUBLE PRECISION NOT NULL,
    edepth DOUBLE PRECISION NOT NULL,
    azimuth DOUBLE PRECISION,
    dip DOUBLE PRECISION,
    samprate DOUBLE PRECISION NOT NULL,
    inid VARCHAR(200),
    unit_calib INTEGER REFERENCES d_unit(id),
    format VARCHAR(80),
    lddate TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (net, sta, seedchan, location, ondate)
);

CREATE INDEX IF NOT EXISTS idx_channel_data_station ON channel_data(net, sta);

CREATE TABLE IF NOT EXISTS simple_response (
    net VARCHAR(8) NOT NULL,
    sta VARCHAR(6) NOT NULL,
    seedchan VARCHAR(3) NOT NULL,
    location VARCHAR(2) NOT NULL,
    ondate TIMESTAMPTZ NOT NULL,
    offdate TIMESTAMPTZ NOT NULL,
    gain DOUBLE PRECISION NOT NULL,
    gain_frequency DOUBLE PRECISION NOT NULL,
    unit_in INTEGER NOT NULL REFERENCES d_unit(id),
    unit_out INTEGER NOT NULL REFERENCES d_unit(id),
    lddate TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (net, sta, seedchan, location, ondate),
    FOREIGN KEY (net, sta, seedchan, location, ondate)
        REFERENCES channel_data (net, sta, seedchan, location, ondate)
);

CREATE TABLE IF NOT EXISTS response_stage (
    net VARCHAR(8) NOT NULL,
    sta VARCHAR(6) NOT NULL,
    seedchan VARCHAR(3) NOT NULL,
    location VARCHAR(2) NOT NULL,
    ondate TIMESTAMPTZ NOT NULL,
    offdate TIMESTAMPTZ NOT NULL,
    stage_seq INTEGER NOT NULL CHECK (stage_seq >= 1),
    gain DOUBLE PRECISION NOT NULL,
    gain_frequency DOUBLE PRECISION NOT NULL,
    unit_in INTEGER NOT NULL REFERENCES d_unit(id),
    unit_out INTEGER NOT NULL REFERENCES d_unit(id),
    tf_kind VARCHAR(5) NOT NULL,
    tf_type CHAR(1),
    ao DOUBLE PRECISION,
    af DOUBLE PRECISION,
    zeros_re DOUBLE PRECISION[],
    zeros_im DOUBLE PRECISION[],
    poles_re DOUBLE PRECISION[],
    poles_im DOUBLE PRECISION[],
    numerators DOUBLE PRECISION[],
    denominators DOUBLE PRECISION[],
    symmetry CHAR(1),
    fir_coefficients DOUBLE PRECISION[],
    dec_input_rate DOUBLE PRECISION,
    dec_factor INTEGER,
    dec_offset INTEGER,
    dec_delay DOUBLE PRECISION,
    dec_correction DOUBLE PRECISION,
    lddate TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (net, sta, seedchan, location, ondate, stage_seq),
    FOREIGN KEY (net, sta, seedchan, location, ondate)
        REFERENCES channel_data (net, sta, seedchan, location, ondate)
)
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::open_offdate;
    use chrono::TimeZone;

    fn gain_stage() -> DbStage {
        DbStage {
            net: "UW".into(),
            sta: "RATT".into(),
            seedchan: "EHZ".into(),
            location: BLANK_LOCATION.into(),
            ondate: Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
            offdate: open_offdate(),
            stage_seq: 2,
            gain: 1.0,
            gain_frequency: 10.0,
            unit_in: 3,
            unit_out: 4,
            tf_kind: "GAIN".into(),
            tf_type: None,
            ao: None,
            af: None,
            zeros_re: None,
            zeros_im: None,
            poles_re: None,
            poles_im: None,
            numerators: None,
            denominators: None,
            symmetry: None,
            fir_coefficients: None,
            dec_input_rate: Some(100.0),
            dec_factor: Some(1),
            dec_offset: Some(0),
            dec_delay: None,
            dec_correction: None,
        }
    }

    #[test]
    fn test_stage_row_from_db() {
        let row = StageRow::try_from(gain_stage()).unwrap();
        assert_eq!(row.stage_seq, 2);
        assert_eq!(row.location, "");
        assert!(row.epoch.is_open());
        let decimation = row.decimation.unwrap();
        assert_eq!(decimation.factor, 1);
        assert_eq!(decimation.offset, 0);
    }

    #[test]
    fn test_negative_stage_seq_is_corrupt() {
        let mut db = gain_stage();
        db.stage_seq = -1;
        match StageRow::try_from(db) {
            Err(StoreError::Corrupt { table, message }) => {
                assert_eq!(table, "response_stage");
                assert!(message.contains("stage_seq"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_negative_decimation_is_corrupt() {
        let mut db = gain_stage();
        db.dec_factor = Some(-4);
        assert!(matches!(
            StageRow::try_from(db),
            Err(StoreError::Corrupt { table: "response_stage", .. })
        ));

        let mut db = gain_stage();
        db.dec_offset = Some(-1);
        assert!(matches!(
            StageRow::try_from(db),
            Err(StoreError::Corrupt { table: "response_stage", .. })
        ));
    }
}
