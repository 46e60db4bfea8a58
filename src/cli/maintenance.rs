//! CLI maintenance commands: `prune` and `consolidate`.

use anyhow::Result;

use mnemo::config::MnemoConfig;

/// Remove stale, low-importance, rarely recalled memories.
pub async fn prune(config: &MnemoConfig, dry_run: bool) -> Result<()> {
    let store = super::open_store(config, false)?;
    let report = store.prune(dry_run).await?;

    if report.candidates.is_empty() {
        println!("No stale memories found.");
        return Ok(());
    }

    if dry_run {
        println!(
            "Found {} candidate(s) for pruning (dry run, nothing deleted):\n",
            report.candidates.len()
        );
        println!(
            "{:<7} {:<8} {:<8} {:<12} {}",
            "ID", "Level", "Hits", "Created", "Preview"
        );
        println!("{}", "-".repeat(90));
        for c in &report.candidates {
            println!(
                "{:<7} {:<8} {:<8} {:<12} {}",
                c.id,
                c.importance.as_str(),
                c.access_count,
                c.created_at.format("%Y-%m-%d"),
                c.text_preview
            );
        }
    } else {
        println!("Deleted {} stale memories.", report.removed);
    }

    store.close().await?;
    Ok(())
}

/// Merge stored near-duplicates at the configured threshold.
pub async fn consolidate(config: &MnemoConfig) -> Result<()> {
    let store = super::open_store(config, false)?;
    let report = store.consolidate().await?;

    if report.merges.is_empty() {
        println!("No near-duplicates found.");
    } else {
        for pair in &report.merges {
            println!(
                "  #{} absorbed #{} (similarity {:.4})",
                pair.kept, pair.absorbed, pair.score
            );
        }
        println!(
            "Merged {} memories, {} remaining.",
            report.merges.len(),
            report.remaining
        );
    }

    store.close().await?;
    Ok(())
}
