//! Command dispatch.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use ingestion::{AppliedOp, IngestionError, LoadSummary, Loader, OpAction};
use storage::StoreError;

use crate::cli::{Command, DeleteAction, DeleteArgs, ExportArgs, LoadArgs};

/// Run one command, writing its report to `out`.
pub async fn execute(loader: &Loader, command: &Command, json: bool, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Load(args) => load(loader, args, json, out).await,
        Command::Export(args) => export(loader, args, out).await,
        Command::Delete(args) => delete(loader, args, json, out).await,
    }
}

async fn load(loader: &Loader, args: &LoadArgs, json: bool, out: &mut dyn Write) -> Result<()> {
    let summary = loader.load_file(&args.file, &args.options()).await?;
    if json {
        print_json(out, &summary)?;
    } else {
        write_summary(out, &summary)?;
    }
    Ok(())
}

async fn export(loader: &Loader, args: &ExportArgs, out: &mut dyn Write) -> Result<()> {
    let xml = loader.export_xml(&args.request()).await?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &xml)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = xml.len(), "Wrote StationXML document");
        }
        None => out.write_all(xml.as_bytes())?,
    }
    Ok(())
}

async fn delete(loader: &Loader, args: &DeleteArgs, json: bool, out: &mut dyn Write) -> Result<()> {
    let ops = match args.action() {
        DeleteAction::Retire(request) => loader.delete(&request).await?,
        DeleteAction::Purge(target) => loader.purge(&target).await?,
    };
    if json {
        print_json(out, &ops)?;
    } else {
        for op in &ops {
            writeln!(out, "{}", op_line(op))?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Human-readable load report.
pub fn write_summary(out: &mut dyn Write, summary: &LoadSummary) -> Result<()> {
    if summary.dry_run {
        writeln!(out, "Dry run: nothing was written")?;
    }
    writeln!(out, "networks: {}", summary.networks)?;
    writeln!(out, "stations: {}", summary.stations)?;
    writeln!(out, "channels: {}", summary.channels)?;
    writeln!(out, "stages:   {}", summary.stages)?;
    for op in &summary.ops {
        writeln!(out, "  {}", op_line(op))?;
    }
    Ok(())
}

fn op_line(op: &AppliedOp) -> String {
    let action = match op.action {
        OpAction::Insert => "insert",
        OpAction::Close => "close",
        OpAction::Extend => "extend",
        OpAction::Delete => "delete",
    };
    format!("{:<7} {:<8} {} {}", action, op.kind.as_str(), op.key, op.epoch)
}

/// Process exit code for an error returned by [`execute`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<IngestionError>() {
            return e.exit_code();
        }
        if let Some(StoreError::ConcurrentModification) = cause.downcast_ref::<StoreError>() {
            return 5;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqms_common::StationKey;
    use ingestion::{ConflictError, DependencyError, MappingError};

    #[test]
    fn test_exit_codes() {
        let mapping: anyhow::Error =
            IngestionError::from(MappingError::new("UW.RATT", "latitude", 91.0, "out of range")).into();
        assert_eq!(exit_code(&mapping), 2);

        let conflict: anyhow::Error = IngestionError::from(ConflictError {
            kind: aqms_common::EntityKind::Station,
            key: "UW.RATT".into(),
            detail: "inside".into(),
            incoming: "2015-01-01".into(),
            stored: vec![],
        })
        .into();
        assert_eq!(exit_code(&conflict), 3);

        let dependency: anyhow::Error = IngestionError::from(DependencyError {
            station: StationKey::new("UW", "RATT"),
            children: vec![],
            reason: "denied".into(),
        })
        .into();
        assert_eq!(exit_code(&dependency), 4);

        let race: anyhow::Error = StoreError::ConcurrentModification.into();
        assert_eq!(exit_code(&race), 5);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&other), 1);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err: anyhow::Error =
            IngestionError::from(MappingError::new("UW", "code", "uw!", "invalid")).into();
        let err = err.context("Load failed");
        assert_eq!(exit_code(&err), 2);
    }
}
