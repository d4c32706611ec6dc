//! End-to-end command tests against the in-memory store.

use std::sync::Arc;

use clap::Parser;
use tempfile::TempDir;

use aqms_ir::cli::Args;
use aqms_ir::commands::{execute, exit_code};
use ingestion::Loader;
use storage::MemoryStore;
use test_utils::fixtures;

struct Harness {
    dir: TempDir,
    store: MemoryStore,
    loader: Loader,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        let loader = Loader::new(Arc::new(store.clone()));
        Self {
            dir: TempDir::new().unwrap(),
            store,
            loader,
        }
    }

    fn write(&self, name: &str, inventory: &aqms_common::Inventory) -> String {
        let path = self.dir.path().join(name);
        std::fs::write(&path, stationxml::write_inventory(inventory)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    async fn run(&self, argv: &[&str]) -> anyhow::Result<String> {
        let mut full = vec!["aqms-ir"];
        full.extend_from_slice(argv);
        let args = Args::try_parse_from(full).unwrap();

        let mut out = Vec::new();
        execute(&self.loader, &args.command, args.json, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }
}

// ============================================================================
// load
// ============================================================================

#[tokio::test]
async fn test_load_reports_counts() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_inventory());

    let report = h.run(&["load", &file, "--now", "2024-01-01"]).await.unwrap();
    assert!(report.contains("networks: 1 inserted, 0 closed, 0 extended, 0 unchanged"));
    assert!(report.contains("stages:   3 inserted"));
    assert!(report.contains("insert  channel  UW.RATT..EHZ"));
    assert_eq!(h.store.snapshot().await.channels.len(), 1);
}

#[tokio::test]
async fn test_load_dry_run_json() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_inventory());

    let report = h.run(&["load", &file, "--dry-run", "--json"]).await.unwrap();
    let summary: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(summary["dry_run"], true);
    assert_eq!(summary["channels"]["inserted"], 1);
    assert_eq!(h.store.snapshot().await.row_count(), 0);
}

#[tokio::test]
async fn test_load_missing_file() {
    let h = Harness::new();
    let err = h.run(&["load", &h.path("absent.xml")]).await.unwrap_err();
    assert_eq!(exit_code(&err), 1);
}

#[tokio::test]
async fn test_load_unmappable_document_exits_2() {
    let h = Harness::new();
    let mut inventory = fixtures::uw_ratt_inventory();
    inventory.networks[0].stations[0].latitude = 123.0;
    let file = h.write("bad.xml", &inventory);

    let err = h.run(&["load", &file]).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);
    assert_eq!(h.store.snapshot().await.row_count(), 0);
}

// ============================================================================
// export
// ============================================================================

#[tokio::test]
async fn test_export_to_file_round_trips() {
    let h = Harness::new();
    let inventory = fixtures::uw_ratt_inventory();
    let file = h.write("uw.xml", &inventory);
    h.run(&["load", &file]).await.unwrap();

    let output = h.path("out.xml");
    let report = h.run(&["export", "-o", &output]).await.unwrap();
    assert!(report.is_empty());

    let xml = std::fs::read_to_string(&output).unwrap();
    let exported = stationxml::read_inventory(&xml).unwrap();
    assert_eq!(exported.networks, inventory.networks);
}

#[tokio::test]
async fn test_export_to_stdout() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_inventory());
    h.run(&["load", &file]).await.unwrap();

    let xml = h.run(&["export", "--network", "UW"]).await.unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains(r#"<Station code="RATT""#));
}

#[tokio::test]
async fn test_reload_of_export_is_noop() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_inventory());
    h.run(&["load", &file]).await.unwrap();

    let output = h.path("out.xml");
    h.run(&["export", "--history", "-o", &output]).await.unwrap();

    let report = h.run(&["load", &output, "--json"]).await.unwrap();
    let summary: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert!(summary["ops"].as_array().unwrap().is_empty());
    assert_eq!(summary["channels"]["unchanged"], 1);
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_delete_denied_exits_4() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_three_component());
    h.run(&["load", &file]).await.unwrap();

    let err = h.run(&["delete", "UW", "RATT"]).await.unwrap_err();
    assert_eq!(exit_code(&err), 4);
    assert!(err.to_string().contains("UW.RATT..EHE"));
}

#[tokio::test]
async fn test_delete_cascade() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_three_component());
    h.run(&["load", &file]).await.unwrap();

    let report = h
        .run(&["delete", "UW", "RATT", "--cascade", "--at", "2024-01-01"])
        .await
        .unwrap();
    assert!(report.lines().next().unwrap().starts_with("close   station  UW.RATT"));

    let tables = h.store.snapshot().await;
    assert!(tables.channels.iter().all(|c| !c.epoch.is_open()));
}

#[tokio::test]
async fn test_purge_channel_epoch() {
    let h = Harness::new();
    let file = h.write("uw.xml", &fixtures::uw_ratt_three_component());
    h.run(&["load", &file]).await.unwrap();

    let report = h
        .run(&[
            "delete",
            "UW",
            "RATT",
            "--purge-epoch",
            "2010-01-01",
            "--channel",
            "EHN",
            "--json",
        ])
        .await
        .unwrap();
    let ops: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(ops[0]["action"], "delete");
    assert_eq!(ops[0]["kind"], "channel");
    assert_eq!(h.store.snapshot().await.channels.len(), 2);
}
