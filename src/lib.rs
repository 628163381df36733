pub mod analyzer;
pub mod chart;
pub mod dialogue;
pub mod models;
pub mod normalizer;
pub mod report;
pub mod scoring;
pub mod scraper;
pub mod trend;

use anyhow::{anyhow, Result};
use models::{Config, CutoffRecord};
use std::path::Path;
use std::time::Duration;

/// Load the canonical dataset, rebuilding the cache from the sheet sources
/// when it is stale, missing, or `force_refresh` is set.
pub async fn prepare_dataset(config: &Config, force_refresh: bool) -> Result<Vec<CutoffRecord>> {
    let cache_path = Path::new(&config.cache_file);
    let ttl = Duration::from_secs(config.cache_ttl_secs);

    if !force_refresh && normalizer::cache_is_fresh(cache_path, ttl) {
        println!("📋 Using cached data: {}", config.cache_file);
        return normalizer::load_cache(cache_path);
    }

    let sheets = scraper::load_sources(config).await?;
    if sheets.is_empty() {
        if cache_path.exists() {
            println!("⚠️  No sheets with a school year (YYYY-YYYY) could be read; using stale cache {}", config.cache_file);
            return normalizer::load_cache(cache_path);
        }
        return Err(anyhow!("No sheets with a school year (YYYY-YYYY) in their title could be read"));
    }

    let outcome = normalizer::normalize(&sheets, &config.columns, &config.source_class_marker);
    println!(
        "🔄 Normalized {} cutoff records from {} sheets ({} skipped, {} rows dropped, {} duplicates removed)",
        outcome.records.len(),
        sheets.len() - outcome.skipped_sheets,
        outcome.skipped_sheets,
        outcome.dropped_rows,
        outcome.duplicates_removed
    );
    if outcome.records.is_empty() && cache_path.exists() {
        println!("⚠️  No cutoff records could be normalized; using stale cache {}", config.cache_file);
        return normalizer::load_cache(cache_path);
    }

    normalizer::save_cache(&outcome.records, cache_path)?;
    println!("💾 Saved processed data to: {}", config.cache_file);
    Ok(outcome.records)
}
