//! Debug script to run the extraction cascade against a live embed
//!
//! Run with: RUST_LOG=streamscout_core=debug cargo run --example debug_extract -p streamscout-core -- 574475
//!
//! Series episodes: `-- 1399 1 2`. With `--features chromium` live capture
//! runs in a headless browser.

use std::time::Duration;

use streamscout_core::{EmbedTarget, StrategyOutcome, StreamExtractor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let target = match args.as_slice() {
        [id] => EmbedTarget::movie(id.parse::<u64>()?),
        [id, season, episode] => EmbedTarget::episode(id.parse::<u64>()?, season.parse()?, episode.parse()?),
        _ => EmbedTarget::movie(574475),
    };

    let builder = StreamExtractor::builder();
    #[cfg(feature = "chromium")]
    let builder = {
        use std::sync::Arc;
        use streamscout_core::host::{ChromiumConfig, ChromiumHost};
        builder.frame_host(Arc::new(ChromiumHost::launch(ChromiumConfig::default()).await?))
    };
    let extractor = builder.build()?;

    println!("Embed URL: {}\n", extractor.embed_url(&target));

    let result = extractor.extract(&target, Duration::from_secs(30)).await?;

    println!("=== Strategies ===");
    for report in &result.report {
        let outcome = match &report.outcome {
            StrategyOutcome::Found(n) => format!("found {}", n),
            StrategyOutcome::Empty => "empty".to_string(),
            StrategyOutcome::TimedOut => "timed out".to_string(),
            StrategyOutcome::Failed(e) => format!("failed: {}", e),
            StrategyOutcome::Skipped(why) => format!("skipped ({})", why),
        };
        println!("{:<18} {:>6} ms  {}", report.strategy.as_str(), report.elapsed_ms, outcome);
    }

    if !result.success {
        println!("\n✗ No stream found, fall back to the iframe");
        return Ok(());
    }

    println!("\n=== Candidates ===");
    for (i, candidate) in result.candidates.iter().enumerate() {
        println!("{}. [{} {}] {}", i + 1, candidate.container_type, candidate.quality_label, candidate.url);
        println!("   via {}", candidate.source_provider);
        for (name, value) in &candidate.headers {
            println!("   {}: {}", name, value);
        }
    }

    Ok(())
}
