//! Command-line arguments.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Args as ClapArgs, Parser, Subcommand};

use aqms_common::{parse_timestamp, ChannelKey, StationKey, Timestamp};
use ingestion::{CascadeScope, DeleteRequest, ExportRequest, ExportScope, LoadOptions, PurgeTarget};

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "aqms-ir", version)]
#[command(about = "Load StationXML inventories into the AQMS station tables and export them back")]
pub struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "AQMS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database URL (`memory://` for an in-process store)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Connection pool size
    #[arg(long, env = "AQMS_MAX_CONNECTIONS", global = true)]
    pub max_connections: Option<u32>,

    /// Create missing tables before running
    #[arg(long, env = "AQMS_AUTO_MIGRATE", global = true, value_parser = BoolishValueParser::new())]
    pub auto_migrate: Option<bool>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            auto_migrate: self.auto_migrate,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile a StationXML document against the database
    Load(LoadArgs),
    /// Write stored metadata as StationXML
    Export(ExportArgs),
    /// Retire a station, or hard delete one epoch
    Delete(DeleteArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LoadArgs {
    /// StationXML file
    pub file: PathBuf,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Instant used to close open epochs missing from the document
    #[arg(long, value_parser = parse_time)]
    pub now: Option<Timestamp>,
}

impl LoadArgs {
    pub fn options(&self) -> LoadOptions {
        LoadOptions {
            dry_run: self.dry_run,
            now: self.now,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct ExportArgs {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub network: Option<String>,

    #[arg(long)]
    pub station: Option<String>,

    /// Export the epochs in effect at this instant
    #[arg(long, value_parser = parse_time, conflicts_with = "history")]
    pub at: Option<Timestamp>,

    /// Export every stored epoch
    #[arg(long)]
    pub history: bool,
}

impl ExportArgs {
    pub fn request(&self) -> ExportRequest {
        let scope = match (self.at, self.history) {
            (Some(at), _) => ExportScope::At(at),
            (None, true) => ExportScope::History,
            (None, false) => ExportScope::Current,
        };
        ExportRequest {
            scope,
            network: self.network.clone(),
            station: self.station.clone(),
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct DeleteArgs {
    pub network: String,

    pub station: String,

    /// Instant the epochs end (defaults to now)
    #[arg(long, value_parser = parse_time)]
    pub at: Option<Timestamp>,

    /// Close every open channel with the station
    #[arg(long, conflicts_with = "only")]
    pub cascade: bool,

    /// Close only these channels ("CHA" or "LOC.CHA")
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Remove the epoch starting at this instant instead of closing
    #[arg(long, value_parser = parse_time, conflicts_with_all = ["at", "cascade", "only"])]
    pub purge_epoch: Option<Timestamp>,

    /// With --purge-epoch, remove a channel epoch ("CHA" or "LOC.CHA")
    #[arg(long, requires = "purge_epoch")]
    pub channel: Option<String>,
}

/// What a `delete` invocation asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteAction {
    Retire(DeleteRequest),
    Purge(PurgeTarget),
}

impl DeleteArgs {
    pub fn station_key(&self) -> StationKey {
        StationKey::new(self.network.clone(), self.station.clone())
    }

    pub fn action(&self) -> DeleteAction {
        let station = self.station_key();
        if let Some(start) = self.purge_epoch {
            return DeleteAction::Purge(match &self.channel {
                Some(channel) => PurgeTarget::Channel {
                    key: channel_key(&station, channel),
                    start,
                },
                None => PurgeTarget::Station {
                    key: station,
                    start,
                },
            });
        }

        let scope = if self.cascade {
            CascadeScope::Cascade
        } else if !self.only.is_empty() {
            CascadeScope::Only(self.only.clone())
        } else {
            CascadeScope::Deny
        };
        DeleteAction::Retire(DeleteRequest {
            station,
            at: self.at,
            scope,
        })
    }
}

/// "CHA" or "LOC.CHA"; "--" stands for the blank location.
fn channel_key(station: &StationKey, spec: &str) -> ChannelKey {
    match spec.split_once('.') {
        Some((location, channel)) => {
            let location = if location == "--" { "" } else { location };
            station.channel(location, channel)
        }
        None => station.channel("", spec),
    }
}

fn parse_time(s: &str) -> Result<Timestamp, String> {
    parse_timestamp(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::ts;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_load_arguments() {
        let args = parse(&["aqms-ir", "load", "uw.xml", "--dry-run", "--now", "2024-01-01"]);
        match args.command {
            Command::Load(load) => {
                let options = load.options();
                assert!(options.dry_run);
                assert_eq!(options.now, Some(ts("2024-01-01")));
                assert_eq!(load.file, PathBuf::from("uw.xml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_export_scope_selection() {
        let args = parse(&["aqms-ir", "export", "--history", "--network", "UW"]);
        let Command::Export(export) = args.command else {
            panic!("expected export");
        };
        let request = export.request();
        assert_eq!(request.scope, ExportScope::History);
        assert_eq!(request.network.as_deref(), Some("UW"));

        let args = parse(&["aqms-ir", "export", "--at", "2015-01-01T00:00:00Z"]);
        let Command::Export(export) = args.command else {
            panic!("expected export");
        };
        assert_eq!(export.request().scope, ExportScope::At(ts("2015-01-01")));
    }

    #[test]
    fn test_at_and_history_conflict() {
        let result = Args::try_parse_from(["aqms-ir", "export", "--at", "2015-01-01", "--history"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_time_rejected() {
        let result = Args::try_parse_from(["aqms-ir", "export", "--at", "yesterday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_defaults_to_deny() {
        let args = parse(&["aqms-ir", "delete", "UW", "RATT"]);
        let Command::Delete(delete) = args.command else {
            panic!("expected delete");
        };
        match delete.action() {
            DeleteAction::Retire(req) => {
                assert_eq!(req.station, StationKey::new("UW", "RATT"));
                assert_eq!(req.scope, CascadeScope::Deny);
                assert_eq!(req.at, None);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_delete_only_list() {
        let args = parse(&["aqms-ir", "delete", "UW", "RATT", "--only", "EHZ,01.HHN"]);
        let Command::Delete(delete) = args.command else {
            panic!("expected delete");
        };
        let DeleteAction::Retire(req) = delete.action() else {
            panic!("expected retirement");
        };
        assert_eq!(
            req.scope,
            CascadeScope::Only(vec!["EHZ".to_string(), "01.HHN".to_string()])
        );
    }

    #[test]
    fn test_cascade_and_only_conflict() {
        let result =
            Args::try_parse_from(["aqms-ir", "delete", "UW", "RATT", "--cascade", "--only", "EHZ"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_purge_channel_epoch() {
        let args = parse(&[
            "aqms-ir",
            "delete",
            "UW",
            "RATT",
            "--purge-epoch",
            "2010-01-01",
            "--channel",
            ".EHZ",
        ]);
        let Command::Delete(delete) = args.command else {
            panic!("expected delete");
        };
        assert_eq!(
            delete.action(),
            DeleteAction::Purge(PurgeTarget::Channel {
                key: StationKey::new("UW", "RATT").channel("", "EHZ"),
                start: ts("2010-01-01"),
            })
        );
    }

    #[test]
    fn test_channel_key_forms() {
        let station = StationKey::new("UW", "RATT");
        assert_eq!(channel_key(&station, "EHZ"), station.channel("", "EHZ"));
        assert_eq!(channel_key(&station, "--.EHZ"), station.channel("", "EHZ"));
        assert_eq!(channel_key(&station, "01.HHN"), station.channel("01", "HHN"));
    }

    #[test]
    fn test_channel_requires_purge_epoch() {
        let result =
            Args::try_parse_from(["aqms-ir", "delete", "UW", "RATT", "--channel", "EHZ"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_connection_overrides() {
        let args = parse(&[
            "aqms-ir",
            "--database-url",
            "memory://",
            "--auto-migrate",
            "yes",
            "export",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.database_url.as_deref(), Some("memory://"));
        assert_eq!(overrides.auto_migrate, Some(true));
    }
}
