use anyhow::Result;

use mnemo::config::MnemoConfig;
use mnemo::Importance;

/// Store one memory and report whether it merged or evicted anything.
pub async fn remember(
    config: &MnemoConfig,
    text: &str,
    importance: Importance,
    tags: &[String],
) -> Result<()> {
    let store = super::open_store(config, true)?;
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();

    let outcome = store.remember(text, importance, &tags).await?;
    if outcome.merged {
        println!("Merged into existing memory #{}", outcome.id);
    } else {
        println!("Stored memory #{}", outcome.id);
    }
    if !outcome.evicted.is_empty() {
        let ids: Vec<String> = outcome.evicted.iter().map(|id| format!("#{id}")).collect();
        println!("Evicted to stay within capacity: {}", ids.join(", "));
    }

    store.close().await?;
    Ok(())
}

pub async fn forget(config: &MnemoConfig, id: u64) -> Result<()> {
    let store = super::open_store(config, false)?;
    if store.forget(id).await? {
        println!("Forgot memory #{id}");
    } else {
        println!("No memory with id #{id}");
    }
    store.close().await?;
    Ok(())
}

/// Print one memory with all of its metadata.
pub async fn show(config: &MnemoConfig, id: u64) -> Result<()> {
    let store = super::open_store(config, false)?;
    let record = store.get(id).await?;

    println!("Memory #{}", record.id);
    println!("{}", "=".repeat(40));
    println!("  Text:          {}", record.text);
    println!("  Importance:    {}", record.importance);
    println!("  Access count:  {}", record.access_count);
    println!("  Created:       {}", record.created_at.to_rfc3339());
    println!("  Last accessed: {}", record.last_accessed_at.to_rfc3339());
    if !record.tags.is_empty() {
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        println!("  Tags:          {}", tags.join(", "));
    }
    Ok(())
}
