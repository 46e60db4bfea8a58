use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::Importance;

/// Display store statistics in the terminal.
pub async fn stats(config: &MnemoConfig) -> Result<()> {
    let store = super::open_store(config, false)?;
    let stats = store.stats().await;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Memories:            {} / {}", stats.count, stats.capacity);
    match stats.dimension {
        Some(dim) => println!("  Embedding dimension: {dim}"),
        None => println!("  Embedding dimension: (not set)"),
    }
    println!("  Avg access count:    {:.2}", stats.average_access_count);
    println!();

    println!("By Importance:");
    for level in Importance::ALL {
        let count = stats.by_importance.get(level.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {}", level, count);
    }
    println!();

    if let Some(oldest) = stats.oldest_created_at {
        println!("Oldest memory:         {}", oldest.to_rfc3339());
    }
    if let Some(newest) = stats.newest_created_at {
        println!("Newest memory:         {}", newest.to_rfc3339());
    }
    println!("Data directory:        {}", config.resolved_data_dir().display());

    Ok(())
}
