use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::memory::maintenance::truncate;

/// Run a recall from the terminal, by count or by threshold, optionally
/// restricted to tags.
pub async fn recall(
    config: &MnemoConfig,
    query: &str,
    k: Option<usize>,
    threshold: Option<f32>,
    tags: &[String],
) -> Result<()> {
    let store = super::open_store(config, true)?;
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();

    let results = match threshold {
        Some(threshold) => store.recall_above_tagged(query, threshold, &tags).await?,
        None => {
            let k = k.unwrap_or(store.default_k());
            store.recall_tagged(query, k, &tags).await?
        }
    };

    if results.is_empty() {
        println!("No results found.");
    } else {
        println!("Found {} result(s)\n", results.len());
        for (i, m) in results.iter().enumerate() {
            println!("{}. #{} [{}] (score: {:.4})", i + 1, m.id, m.importance, m.score);
            println!("   {}", m.text);
            if !m.tags.is_empty() {
                let tags: Vec<&str> = m.tags.iter().map(String::as_str).collect();
                println!("   tags: {}", tags.join(", "));
            }
            println!();
        }
    }

    store.close().await?;
    Ok(())
}

/// Print the context block for a query, as an agent would receive it.
pub async fn context(config: &MnemoConfig, query: &str, max_chars: usize) -> Result<()> {
    let store = super::open_store(config, true)?;
    let block = store.context(query, max_chars).await?;
    if block.is_empty() {
        println!("No relevant memories.");
    } else {
        println!("{block}");
    }
    store.close().await?;
    Ok(())
}

/// List the most recently created memories.
pub async fn list(config: &MnemoConfig, limit: usize) -> Result<()> {
    let store = super::open_store(config, false)?;
    let records = store.list_recent(limit).await;

    if records.is_empty() {
        println!("No memories stored.");
        return Ok(());
    }
    for record in &records {
        println!(
            "#{:<5} {:<7} {}  {}",
            record.id,
            record.importance.as_str(),
            record.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&record.text, 70)
        );
    }
    Ok(())
}
