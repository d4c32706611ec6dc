//! Unit-of-work traits.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use aqms_common::{
    ChannelKey, ChannelRecord, ChannelRow, NetworkRow, StageRow, StationKey, StationRow, Timestamp,
};

use crate::error::StoreResult;

/// AQMS stores open epochs with this `offdate` instead of NULL.
pub const OPEN_OFFDATE: (i32, u32, u32) = (3000, 1, 1);

/// The sentinel `offdate` as a timestamp.
pub fn open_offdate() -> Timestamp {
    let (y, m, d) = OPEN_OFFDATE;
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC)
}

/// Translate an optional end to the stored `offdate`.
pub fn to_offdate(end: Option<Timestamp>) -> Timestamp {
    end.unwrap_or_else(open_offdate)
}

/// Translate a stored `offdate` back to an optional end.
pub fn from_offdate(offdate: Timestamp) -> Option<Timestamp> {
    if offdate >= open_offdate() {
        None
    } else {
        Some(offdate)
    }
}

/// One atomic unit of work.
///
/// Reads observe the session's own uncommitted writes. Dropping a session
/// without calling [`Session::commit`] discards its writes.
#[async_trait]
pub trait Session: Send {
    /// All stored epochs of a network code, ordered by start.
    async fn network_epochs(&mut self, net: &str) -> StoreResult<Vec<NetworkRow>>;

    /// All stored epochs of a station, ordered by start.
    async fn station_epochs(&mut self, key: &StationKey) -> StoreResult<Vec<StationRow>>;

    /// All channel epochs of a station with their stages, ordered by
    /// channel key then start.
    async fn channel_epochs(&mut self, station: &StationKey) -> StoreResult<Vec<ChannelRecord>>;

    /// Every network epoch, ordered by code then start.
    async fn list_networks(&mut self) -> StoreResult<Vec<NetworkRow>>;

    /// Every station epoch, optionally restricted to one network.
    async fn list_stations(&mut self, net: Option<&str>) -> StoreResult<Vec<StationRow>>;

    async fn insert_network(&mut self, row: &NetworkRow) -> StoreResult<()>;

    async fn insert_station(&mut self, row: &StationRow) -> StoreResult<()>;

    /// Insert `channel_data` and its `simple_response` summary.
    async fn insert_channel(&mut self, row: &ChannelRow) -> StoreResult<()>;

    async fn insert_stage(&mut self, row: &StageRow) -> StoreResult<()>;

    /// Change the end of the network epoch starting at `start`.
    async fn set_network_end(
        &mut self,
        net: &str,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()>;

    async fn set_station_end(
        &mut self,
        key: &StationKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()>;

    /// Change the end of a channel epoch (and its `simple_response`).
    async fn set_channel_end(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<()>;

    /// Change the end of every stage of the channel epoch starting at
    /// `start`. Returns the number of stages touched.
    async fn set_stages_end(
        &mut self,
        key: &ChannelKey,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> StoreResult<u64>;

    /// Remove a station epoch outright.
    async fn delete_station_epoch(&mut self, key: &StationKey, start: Timestamp)
        -> StoreResult<u64>;

    /// Remove a channel epoch, its summary and its stages outright.
    /// Returns the number of stage rows removed.
    async fn delete_channel_epoch(&mut self, key: &ChannelKey, start: Timestamp)
        -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Opens sessions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offdate_sentinel_round_trip() {
        assert_eq!(from_offdate(to_offdate(None)), None);
        let t = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(from_offdate(to_offdate(Some(t))), Some(t));
    }
}
