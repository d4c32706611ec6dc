//! Natural keys: the business identity of a versioned entity,
//! independent of any particular epoch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The entity types that carry epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Network,
    Station,
    Channel,
    ResponseStage,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Network => "network",
            EntityKind::Station => "station",
            EntityKind::Channel => "channel",
            EntityKind::ResponseStage => "response_stage",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (network, station)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationKey {
    pub network: String,
    pub station: String,
}

impl StationKey {
    pub fn new(network: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
        }
    }

    pub fn channel(&self, location: impl Into<String>, channel: impl Into<String>) -> ChannelKey {
        ChannelKey {
            network: self.network.clone(),
            station: self.station.clone(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.network, self.station)
    }
}

/// (network, station, location, channel). A blank location is `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelKey {
    pub fn station_key(&self) -> StationKey {
        StationKey::new(self.network.clone(), self.station.clone())
    }
}

impl fmt::Display for ChannelKey {
    /// SEED identifier, e.g. `UW.RATT..EHZ`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_id_with_blank_location() {
        let key = StationKey::new("UW", "RATT").channel("", "EHZ");
        assert_eq!(key.to_string(), "UW.RATT..EHZ");
        assert_eq!(key.station_key().to_string(), "UW.RATT");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntityKind::ResponseStage).unwrap();
        assert_eq!(json, r#""response_stage""#);
        assert_eq!(EntityKind::ResponseStage.to_string(), "response_stage");
    }

    #[test]
    fn test_keys_order_by_network_then_station() {
        let mut keys = vec![
            StationKey::new("UW", "RATT"),
            StationKey::new("CC", "VALT"),
            StationKey::new("UW", "LON"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                StationKey::new("CC", "VALT"),
                StationKey::new("UW", "LON"),
                StationKey::new("UW", "RATT"),
            ]
        );
    }
}
