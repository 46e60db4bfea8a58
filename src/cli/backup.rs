//! Backup listing and restore. Both work on the data directory directly, so a
//! store whose live snapshot is corrupt can still be recovered.

use anyhow::{Context, Result};

use mnemo::config::MnemoConfig;
use mnemo::snapshot::SnapshotDir;

fn snapshot_dir(config: &MnemoConfig) -> SnapshotDir {
    SnapshotDir::new(config.resolved_data_dir(), config.storage.max_backups)
}

pub fn backups(config: &MnemoConfig) -> Result<()> {
    let list = snapshot_dir(config).list_backups()?;
    if list.is_empty() {
        println!("No backups found.");
        return Ok(());
    }
    println!("{:<64} {}", "Backup", "Memories");
    println!("{}", "-".repeat(76));
    for b in &list {
        let records = b
            .records
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unreadable".into());
        println!("{:<64} {}", b.name, records);
    }
    Ok(())
}

/// Restore the named backup, or the newest one.
pub fn restore(config: &MnemoConfig, name: Option<&str>) -> Result<()> {
    let (info, index) = snapshot_dir(config)
        .restore_backup(name)
        .context("restore failed")?;
    println!("Restored {} memories from {}", index.len(), info.name);
    Ok(())
}
